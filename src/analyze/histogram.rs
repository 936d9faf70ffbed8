//! Hot-to-cold analytics over the merged bucket map: capacity-proportional
//! histogram sections, the Zipfian theta estimate, and the top-files ranking

use crate::aggregate::GlobalState;
use crate::analyze::attribute::FileHits;
use crate::geometry::Geometry;
use std::collections::BTreeMap;
use std::sync::Arc;

const GIB: f64 = 1_073_741_824.0;

/// One histogram section: buckets accumulated hottest-first until the
/// section covers `percent` of device capacity
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRow {
    /// Capacity covered by all sections so far, in GiB
    pub cumulative_gib:      f64,
    /// This section's share of all bucket hits, in percent
    pub section_iops_pct:    f64,
    /// Share of all bucket hits covered so far, in percent
    pub cumulative_iops_pct: f64,
    /// This section's capacity as a share of hit-weighted bandwidth, in
    /// percent
    pub section_bw_pct:      f64,
}

/// Zipfian skew estimate derived from the descending bucket-population walk
#[derive(Debug, Clone, PartialEq)]
pub struct ThetaEstimate {
    pub min:    f64,
    pub max:    f64,
    pub avg:    f64,
    pub median: f64,
    pub approx: f64,
}

/// One entry of the top-files ranking
#[derive(Debug, Clone, PartialEq)]
pub struct TopFile {
    pub path: Arc<str>,
    pub hits: u64,
    /// Share of all bucket hits, in percent
    pub pct:  f64,
}

/// The derived artifacts consumed by the report
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub rows:  Vec<HistogramRow>,
    /// `None` when fewer than two distinct positive bucket populations
    /// exist; theta is undefined there and the report section is suppressed
    pub theta: Option<ThetaEstimate>,
}

/// Walks the bucket populations hottest-first, emitting one histogram row
/// per capacity section and feeding the theta recurrence along the way.
/// Untouched buckets contribute nothing.
#[must_use]
pub fn analyze(geometry: &Geometry, state: &GlobalState, percent: f64) -> Analysis {
    // counts[total] = number of buckets with exactly that combined hit
    // count. Most buckets are idle, so keying by population keeps this small.
    let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
    for &total in state.bucket_totals().values() {
        if total > 0 {
            *counts.entry(total).or_insert(0) += 1;
        }
    }

    let mut window = SectionWindow::new(geometry, state.bucket_hits_total);
    let mut theta = ThetaTracker::new();
    for (&total, &bucket_count) in counts.iter().rev() {
        theta.observe(total);
        for _ in 0..bucket_count {
            window.push_bucket(total, percent);
        }
    }
    window.flush();

    Analysis {
        rows:  window.rows,
        theta: theta.finish(),
    }
}

/// Ranks files by attributed hit count, descending, cutting the list at
/// `limit`. Files with zero credit never appear.
#[must_use]
pub fn top_files(file_hits: &FileHits, bucket_hits_total: u64, limit: u32) -> Vec<TopFile> {
    if bucket_hits_total == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&Arc<str>, u64)> = file_hits
        .iter()
        .filter(|(_, &hits)| hits > 0)
        .map(|(path, &hits)| (path, hits))
        .collect();
    // Ties break on path so the ranking is stable across runs
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(limit as usize)
        .map(|(path, hits)| TopFile {
            path: Arc::clone(path),
            hits,
            pct: hits as f64 / bucket_hits_total as f64 * 100.0,
        })
        .collect()
}

/// Sliding capacity section over the hottest-first bucket walk
struct SectionWindow<'a> {
    geometry:         &'a Geometry,
    hits_total:       u64,
    rows:             Vec<HistogramRow>,
    section_hits:     u64,
    section_buckets:  u64,
    cumulative_bytes: u64,
    cumulative_hits:  u64,
}

impl<'a> SectionWindow<'a> {
    fn new(geometry: &'a Geometry, hits_total: u64) -> Self {
        Self {
            geometry,
            hits_total,
            rows: Vec::new(),
            section_hits: 0,
            section_buckets: 0,
            cumulative_bytes: 0,
            cumulative_hits: 0,
        }
    }

    fn push_bucket(&mut self, total: u64, percent: f64) {
        self.section_hits += total;
        self.section_buckets += 1;
        let section_bytes = self.section_buckets * self.geometry.bucket_size;
        if section_bytes as f64 / self.geometry.total_bytes() as f64 >= percent {
            self.flush();
        }
    }

    /// Emits the open section as a row, if it holds anything
    fn flush(&mut self) {
        if self.section_buckets == 0 {
            return;
        }
        let section_bytes = self.section_buckets * self.geometry.bucket_size;
        self.cumulative_bytes += section_bytes;
        self.cumulative_hits += self.section_hits;

        // Rows only exist once a positive bucket population was seen, so
        // hits_total is nonzero here
        let hits_total = self.hits_total as f64;
        let bw_total = hits_total * self.geometry.bucket_size as f64;
        self.rows.push(HistogramRow {
            cumulative_gib:      self.cumulative_bytes as f64 / GIB,
            section_iops_pct:    self.section_hits as f64 / hits_total * 100.0,
            cumulative_iops_pct: self.cumulative_hits as f64 / hits_total * 100.0,
            section_bw_pct:      section_bytes as f64 / bw_total * 100.0,
        });

        self.section_hits = 0;
        self.section_buckets = 0;
    }
}

/// Running theta recurrence: the hottest population anchors the rank-1
/// frequency, and each subsequent distinct population at rank k contributes
/// `log_k(max) - log_k(total)`
struct ThetaTracker {
    max:       Option<u64>,
    rank:      u64,
    sum:       f64,
    min_theta: f64,
    max_theta: f64,
}

impl ThetaTracker {
    fn new() -> Self {
        Self {
            max:       None,
            rank:      1,
            sum:       0.0,
            min_theta: f64::INFINITY,
            max_theta: f64::NEG_INFINITY,
        }
    }

    fn observe(&mut self, total: u64) {
        match self.max {
            None => self.max = Some(total),
            Some(max) => {
                self.rank += 1;
                let cur = theta_log(self.rank, max) - theta_log(self.rank, total);
                self.min_theta = self.min_theta.min(cur);
                self.max_theta = self.max_theta.max(cur);
                self.sum += cur;
            },
        }
    }

    fn finish(self) -> Option<ThetaEstimate> {
        // A single population gives no rank spread to fit against
        if self.rank < 2 {
            return None;
        }
        let avg = self.sum / self.rank as f64;
        let median = (self.max_theta + self.min_theta) / 2.0;
        Some(ThetaEstimate {
            min: self.min_theta,
            max: self.max_theta,
            avg,
            median,
            approx: (avg + median) / 2.0,
        })
    }
}

/// `ln(value) / ln(base)` with the degenerate cases pinned to zero (rank 1
/// has no defined log base; empty populations never reach here but stay
/// guarded anyway)
fn theta_log(base: u64, value: u64) -> f64 {
    if base <= 1 || value == 0 {
        0.0
    } else {
        (value as f64).ln() / (base as f64).ln()
    }
}

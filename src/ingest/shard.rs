//! Thread-local accumulation state for a single trace shard. Workers mutate
//! this without any locking and hand the finished value to the aggregator.

use crate::geometry::Geometry;
use crate::ingest::record::{Op, Record};
use std::collections::BTreeMap;

/// Per-shard accumulator mirroring the global counters. One request can
/// straddle many buckets, so `bucket_hits_total` is generally larger than
/// `io_total`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShardState {
    /// Number of accepted I/O requests
    pub io_total:          u64,
    /// Number of accepted read requests
    pub read_total:        u64,
    /// Number of accepted write requests
    pub write_total:       u64,
    /// Total bucket increments across both directions
    pub bucket_hits_total: u64,
    /// Sum of sector counts across all accepted requests
    pub total_blocks:      u64,
    /// Largest per-bucket count seen in a single direction
    pub max_bucket_hits:   u64,
    /// Sparse bucket id -> read hit count
    pub reads:             BTreeMap<u64, u64>,
    /// Sparse bucket id -> write hit count
    pub writes:            BTreeMap<u64, u64>,
    /// Read I/O size histogram (sector count -> requests)
    pub r_totals:          BTreeMap<u32, u64>,
    /// Write I/O size histogram (sector count -> requests)
    pub w_totals:          BTreeMap<u32, u64>,
}

impl ShardState {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Folds one accepted record into the shard state: scalar counters, the
    /// direction's size histogram, and one hit per bucket the request
    /// touches. The span is computed in bytes from the request's start
    /// offset so that a partially covered trailing bucket still counts;
    /// ids past the device end clamp to the last bucket.
    pub fn observe(&mut self, geometry: &Geometry, record: Record) {
        self.total_blocks += u64::from(record.sector_count);
        self.io_total += 1;

        let (direction_total, buckets, size_totals) = match record.op {
            Op::Read => (&mut self.read_total, &mut self.reads, &mut self.r_totals),
            Op::Write => (&mut self.write_total, &mut self.writes, &mut self.w_totals),
        };
        *direction_total += 1;
        *size_totals.entry(record.sector_count).or_insert(0) += 1;

        let bytes = u64::from(record.sector_count) * geometry.sector_size;
        if bytes == 0 {
            return;
        }
        // Saturate on absurd LBAs; the per-step clamp pins them to the last
        // bucket anyway
        let start_byte = record.start_lba.saturating_mul(geometry.sector_size);
        let first = start_byte / geometry.bucket_size;
        let span = (start_byte.saturating_add(bytes) - 1) / geometry.bucket_size - first + 1;

        for i in 0..span {
            let bucket = (first + i).min(geometry.num_buckets - 1);
            let hits = buckets.entry(bucket).or_insert(0);
            *hits += 1;
            if *hits > self.max_bucket_hits {
                self.max_bucket_hits = *hits;
            }
            self.bucket_hits_total += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::record::parse_line;

    /// 2 GiB device: 512-byte sectors, 1 MiB buckets, 2048 buckets
    fn test_geometry() -> Geometry {
        Geometry::new(String::from("/dev/sdb"), 512, 2048 * 2048, 1_048_576)
    }

    fn observe_line(state: &mut ShardState, geometry: &Geometry, line: &str) {
        state.observe(geometry, parse_line(line).unwrap());
    }

    #[test]
    fn single_small_read() {
        let geometry = test_geometry();
        let mut state = ShardState::new();
        observe_line(&mut state, &geometry, "8,16 Q R 0 8");

        assert_eq!(state.io_total, 1);
        assert_eq!(state.read_total, 1);
        assert_eq!(state.write_total, 0);
        assert_eq!(state.bucket_hits_total, 1);
        assert_eq!(state.total_blocks, 8);
        assert_eq!(state.reads.get(&0), Some(&1));
        assert!(state.writes.is_empty());
        assert_eq!(state.r_totals.get(&8), Some(&1));
    }

    #[test]
    fn large_write_straddles_every_touched_bucket() {
        // 2 MiB starting 8 sectors before the end of bucket 0: the request
        // covers part of bucket 0, all of bucket 1, and the head of bucket 2
        let geometry = test_geometry();
        let mut state = ShardState::new();
        observe_line(&mut state, &geometry, "8,16 Q W 2040 4096");

        assert_eq!(state.writes.get(&0), Some(&1));
        assert_eq!(state.writes.get(&1), Some(&1));
        assert_eq!(state.writes.get(&2), Some(&1));
        assert_eq!(state.bucket_hits_total, 3);
        assert_eq!(state.w_totals.get(&4096), Some(&1));
    }

    #[test]
    fn aligned_requests_touch_exactly_the_ceil_span() {
        let geometry = test_geometry();
        for &(sectors, expected) in &[(8_u32, 1_u64), (2048, 1), (2049, 2), (4096, 2), (6144, 3)] {
            let mut state = ShardState::new();
            state.observe(&geometry, Record {
                op:           Op::Read,
                start_lba:    2048 * 4,
                sector_count: sectors,
            });
            assert_eq!(state.bucket_hits_total, expected, "sectors={}", sectors);
        }
    }

    #[test]
    fn overflowing_spans_clamp_to_the_last_bucket() {
        // 4-bucket device; a 5 MiB read starting inside the last bucket
        let geometry = Geometry::new(String::from("/dev/sdb"), 512, 2048 * 4, 1_048_576);
        assert_eq!(geometry.num_buckets, 4);
        let mut state = ShardState::new();
        state.observe(&geometry, Record {
            op:           Op::Read,
            start_lba:    2048 * 4 - 8,
            sector_count: 10_240,
        });

        // Span is 6 buckets (3..=8); every step past bucket 3 clamps onto it
        assert_eq!(state.reads.get(&3), Some(&6));
        assert_eq!(state.reads.len(), 1);
        assert_eq!(state.bucket_hits_total, 6);
        assert_eq!(state.max_bucket_hits, 6);
    }

    #[test]
    fn zero_length_requests_count_as_io_but_hit_nothing() {
        let geometry = test_geometry();
        let mut state = ShardState::new();
        state.observe(&geometry, Record {
            op:           Op::Write,
            start_lba:    0,
            sector_count: 0,
        });

        assert_eq!(state.io_total, 1);
        assert_eq!(state.write_total, 1);
        assert_eq!(state.bucket_hits_total, 0);
        assert!(state.writes.is_empty());
    }

    #[test]
    fn op_filtering_matches_the_alphabet() {
        let geometry = test_geometry();
        let mut state = ShardState::new();
        for line in &["X R 0 8", "Q A 0 8", "Q R 0 8", "Q RW 0 8", "Q WS 8 8"] {
            if let Some(record) = parse_line(line) {
                state.observe(&geometry, record);
            }
        }

        assert_eq!(state.io_total, 4);
        assert_eq!(state.read_total, 3);
        assert_eq!(state.write_total, 1);
    }
}

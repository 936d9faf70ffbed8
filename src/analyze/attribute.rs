//! File attribution: inverts the lazily-stored extent ranges into a
//! bucket -> files index, then credits each mapped bucket's combined hit
//! count to every file residing on it.
//!
//! The credit is a hit-share proxy, not a per-byte attribution: the trace
//! does not reveal which LBA inside an I/O belonged to which file, so a file
//! spanning N buckets each hit M_i times is credited the full sum of M_i,
//! and files co-residing on a bucket are each fully credited.

use crate::geometry::Geometry;
use crate::ingest::extent::ExtentMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Hit-share credit per file. Every ingested file is present, even with zero
/// credit.
pub type FileHits = HashMap<Arc<str>, u64>;

/// Builds the inverted index and computes per-file hit counts in one pass.
/// `bucket_totals` is the combined (read + write) count per touched bucket.
/// The index is local to this call and dropped on return; it can grow to
/// O(num_buckets x files-per-bucket) and is only needed here.
#[must_use]
pub fn attribute(
    geometry: &Geometry,
    extents: &ExtentMap,
    bucket_totals: &BTreeMap<u64, u64>,
) -> FileHits {
    let mut bucket_to_files: HashMap<u64, BTreeSet<Arc<str>>> = HashMap::new();
    let mut file_hits: FileHits = HashMap::with_capacity(extents.len());

    for (path, ranges) in extents.iter() {
        // One shared allocation per path, no matter how many buckets it spans
        let path: Arc<str> = Arc::from(path.as_str());
        file_hits.insert(Arc::clone(&path), 0);

        for range in ranges.split_whitespace() {
            let (start, end) = match parse_range(range) {
                Some(pair) => pair,
                None => continue,
            };
            let first = geometry.lba_to_bucket(start);
            let last = geometry.lba_to_bucket(end);
            for bucket in first..=last {
                // Set semantics: a file counts once per bucket regardless of
                // how many of its extents land there
                bucket_to_files
                    .entry(bucket)
                    .or_default()
                    .insert(Arc::clone(&path));
            }
        }
    }

    for (bucket, &hits) in bucket_totals {
        if hits == 0 {
            continue;
        }
        // Hits on buckets holding no known file stay in the bucket totals
        // but are attributed to nothing
        if let Some(files) = bucket_to_files.get(bucket) {
            for path in files {
                if let Some(credit) = file_hits.get_mut(path) {
                    *credit += hits;
                }
            }
        }
    }

    file_hits
}

/// Parses one inclusive `start:end` LBA range, dropping malformed or
/// inverted pairs
fn parse_range(range: &str) -> Option<(u64, u64)> {
    let mut parts = range.splitn(2, ':');
    let start: u64 = parts.next()?.parse().ok()?;
    let end: u64 = parts.next()?.parse().ok()?;
    if start > end {
        return None;
    }
    Some((start, end))
}

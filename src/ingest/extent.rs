//! Ingestion of filesystem extent shards: `<path> :: s1:e1 s2:e2 ...` lines
//! mapping a file to the inclusive LBA ranges it occupies.

use std::collections::hash_map::{self, HashMap};

/// File path -> raw LBA range-list string. Range lists can be large and are
/// only needed once during attribution, so they stay unparsed until then.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtentMap {
    files: HashMap<String, String>,
}

impl ExtentMap {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Ingests one extent shard line, returning whether it matched the
    /// `<path> :: <range_list>` shape. A path seen again replaces the earlier
    /// range list.
    pub fn ingest_line(&mut self, line: &str) -> bool {
        let (path, ranges) = match split_extent_line(line) {
            Some(pair) => pair,
            None => return false,
        };
        self.files.insert(path.to_owned(), ranges.to_owned());
        true
    }

    /// Absorbs another map (last writer wins per path, as with repeated
    /// lines in a single shard)
    pub fn merge(&mut self, other: Self) { self.files.extend(other.files); }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.files.is_empty() }

    #[must_use]
    pub fn len(&self) -> usize { self.files.len() }

    pub fn iter(&self) -> hash_map::Iter<'_, String, String> { self.files.iter() }
}

/// Splits an extent line on the `::` separator. The reference grammar allows
/// no whitespace inside paths, so a path token containing any is malformed.
fn split_extent_line(line: &str) -> Option<(&str, &str)> {
    let separator = line.find("::")?;
    let path = line[..separator].trim();
    let ranges = line[separator + 2..].trim();
    if path.is_empty() || path.contains(char::is_whitespace) {
        return None;
    }
    Some((path, ranges))
}

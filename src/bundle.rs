//! Input bundle handling: locating the device metadata file and the trace /
//! extent shards, either in an already-expanded directory or inside a `.tar`
//! bundle produced by the external tracer (unpacked into a scratch
//! directory). Shards compressed with gzip are decompressed transparently
//! while streaming.

use crate::geometry::GeometryError;
use crate::shell::Shell;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use strum_macros::Display;
use tempfile::TempDir;
use thiserror::Error;

/// Filename prefix of the device metadata (fdisk capture) file
const METADATA_PREFIX: &str = "fdisk.";
/// Filename prefix of block trace shards
const TRACE_PREFIX: &str = "blk.out.";
/// Filename prefix of filesystem extent shards
const EXTENT_PREFIX: &str = "filetrace.";

/// Error while locating or expanding the input bundle
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("input path {0:?} does not exist")]
    Missing(PathBuf),
    #[error("could not unpack bundle {path:?}: {source}")]
    Unpack {
        path:   PathBuf,
        source: io::Error,
    },
    #[error("could not scan input directory {path:?}: {source}")]
    Scan {
        path:   PathBuf,
        source: io::Error,
    },
}

/// The two kinds of independently-parseable input shards
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ShardKind {
    Trace,
    Extent,
}

/// A single shard file queued for a worker
#[derive(Debug, Clone)]
pub struct Shard {
    pub kind: ShardKind,
    pub path: PathBuf,
}

/// An expanded input bundle: one optional metadata file plus the shard list.
/// Keeps the unpack scratch directory (if any) alive for the duration of the
/// run.
pub struct Bundle {
    pub metadata_path: Option<PathBuf>,
    pub shards:        Vec<Shard>,
    _scratch:          Option<TempDir>,
}

impl Bundle {
    /// Opens the given input, unpacking it into a temporary directory first
    /// if it is a `.tar` bundle rather than a directory.
    pub fn open(input: &Path, shell: &Shell) -> Result<Self, BundleError> {
        if input.is_dir() {
            Self::scan(input.to_owned(), None)
        } else if input.is_file() {
            shell.status("Unpacking", format!("bundle {:?}", input));
            let scratch = unpack(input)?;
            Self::scan(scratch.path().to_owned(), Some(scratch))
        } else {
            Err(BundleError::Missing(input.to_owned()))
        }
    }

    /// Reads the device metadata capture, failing with a geometry error if
    /// the bundle carried none (a report without geometry is meaningless)
    pub fn read_metadata(&self) -> Result<String, GeometryError> {
        let path = self
            .metadata_path
            .as_ref()
            .ok_or(GeometryError::MissingMetadata)?;
        fs::read_to_string(path).map_err(|source| GeometryError::Unreadable {
            path: path.clone(),
            source,
        })
    }

    /// Classifies every directory entry by its filename prefix; entries that
    /// are neither metadata nor shards are ignored.
    fn scan(dir: PathBuf, scratch: Option<TempDir>) -> Result<Self, BundleError> {
        let entries = fs::read_dir(&dir).map_err(|source| BundleError::Scan {
            path:   dir.clone(),
            source,
        })?;

        let mut metadata_path: Option<PathBuf> = None;
        let mut shards: Vec<Shard> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| BundleError::Scan {
                path:   dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with(METADATA_PREFIX) {
                metadata_path.get_or_insert(path);
            } else if name.starts_with(TRACE_PREFIX) {
                shards.push(Shard {
                    kind: ShardKind::Trace,
                    path,
                });
            } else if name.starts_with(EXTENT_PREFIX) {
                shards.push(Shard {
                    kind: ShardKind::Extent,
                    path,
                });
            }
        }

        // Deterministic processing order regardless of directory iteration
        shards.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self {
            metadata_path,
            shards,
            _scratch: scratch,
        })
    }
}

/// Unpacks a `.tar` bundle into a fresh scratch directory
fn unpack(bundle: &Path) -> Result<TempDir, BundleError> {
    let wrap = |source: io::Error| BundleError::Unpack {
        path: bundle.to_owned(),
        source,
    };
    let scratch = TempDir::new().map_err(wrap)?;
    let file = File::open(bundle).map_err(wrap)?;
    tar::Archive::new(file).unpack(scratch.path()).map_err(wrap)?;
    Ok(scratch)
}

/// Opens a shard for line-oriented reading, decompressing on the fly when the
/// file carries a `.gz` suffix
pub fn open_shard(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.extension().map_or(false, |ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

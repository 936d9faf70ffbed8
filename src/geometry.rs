//! Device geometry: the scalars that fix the LBA-to-bucket mapping for an
//! entire run. Parsed once from the fdisk capture included in the trace
//! bundle, before any accumulation starts.

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    /// `Units = sectors of 1 * 512 = 512 bytes`
    static ref SECTOR_SIZE: Regex =
        Regex::new(r"Units = sectors of \d+ \* \d+ = (\d+) bytes").unwrap();
    /// `..., total 41943040 sectors`
    static ref TOTAL_LBAS: Regex = Regex::new(r"total (\d+) sectors").unwrap();
    /// `Disk /dev/sdb: 21.5 GB, 21474836480 bytes`
    static ref DEVICE: Regex = Regex::new(r"Disk (\S+): \S+ GB, \d+ bytes").unwrap();
}

const GIB: f64 = 1_073_741_824.0;

/// Fatal error while establishing device geometry. Without valid geometry no
/// bucket mapping is meaningful, so these abort the run before any parsing.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("could not read device metadata file {path:?}: {source}")]
    Unreadable {
        path:   PathBuf,
        source: std::io::Error,
    },
    #[error("no device metadata (fdisk capture) found in the input")]
    MissingMetadata,
    #[error("sector size not found in device metadata")]
    MissingSectorSize,
    #[error("total sector count not found in device metadata")]
    MissingTotalLbas,
    #[error("device name not found in device metadata")]
    MissingDevice,
}

/// Immutable bucket geometry for one profiled device. Buckets are fixed-size
/// byte windows over the LBA range, numbered `[0, num_buckets)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Device name as reported by the metadata capture (e.g. `/dev/sdb`)
    pub device:      String,
    /// Bytes per LBA unit
    pub sector_size: u64,
    /// Count of sectors on the device
    pub total_lbas:  u64,
    /// Bytes per aggregation bucket
    pub bucket_size: u64,
    /// Number of buckets covering the device
    pub num_buckets: u64,
}

impl Geometry {
    /// Creates a geometry from already-known scalars. `bucket_size` and
    /// `sector_size` must be nonzero.
    #[must_use]
    pub fn new(device: String, sector_size: u64, total_lbas: u64, bucket_size: u64) -> Self {
        let num_buckets = ((total_lbas * sector_size) / bucket_size).max(1);
        Self {
            device,
            sector_size,
            total_lbas,
            bucket_size,
            num_buckets,
        }
    }

    /// Extracts the three geometry scalars from an fdisk text capture.
    /// Any missing scalar is fatal: a report without correct geometry would
    /// attribute I/O to the wrong regions of the device.
    pub fn parse(metadata: &str, bucket_size: u64) -> Result<Self, GeometryError> {
        let sector_size = capture_u64(&SECTOR_SIZE, metadata).ok_or(GeometryError::MissingSectorSize)?;
        let total_lbas = capture_u64(&TOTAL_LBAS, metadata).ok_or(GeometryError::MissingTotalLbas)?;
        let device = DEVICE
            .captures(metadata)
            .map(|c| c[1].to_owned())
            .ok_or(GeometryError::MissingDevice)?;

        Ok(Self::new(device, sector_size, total_lbas, bucket_size))
    }

    /// Maps an LBA to the bucket containing it. Traces occasionally contain
    /// LBAs slightly past the reported device end (out-of-band requests), so
    /// overflowing ids clamp to the last bucket.
    #[inline]
    #[must_use]
    pub fn lba_to_bucket(&self, lba: u64) -> u64 {
        (lba.saturating_mul(self.sector_size) / self.bucket_size).min(self.num_buckets - 1)
    }

    /// Maps a bucket id back to the first LBA it covers
    #[inline]
    #[must_use]
    pub fn bucket_to_lba(&self, bucket: u64) -> u64 {
        (bucket * self.bucket_size) / self.sector_size
    }

    /// Total addressable bytes on the device
    #[must_use]
    pub fn total_bytes(&self) -> u64 { self.total_lbas * self.sector_size }

    /// Device capacity in GiB
    #[must_use]
    pub fn capacity_gib(&self) -> f64 { self.total_bytes() as f64 / GIB }
}

fn capture_u64(pattern: &Regex, text: &str) -> Option<u64> {
    pattern.captures(text).and_then(|c| c[1].parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FDISK_CAPTURE: &str = "\
Disk /dev/sdb: 21.5 GB, 21474836480 bytes
64 heads, 32 sectors/track, 20480 cylinders, total 41943040 sectors
Units = sectors of 1 * 512 = 512 bytes
Sector size (logical/physical): 512 bytes / 512 bytes
I/O size (minimum/optimal): 512 bytes / 512 bytes
";

    #[test]
    fn parses_fdisk_capture() {
        let geometry = Geometry::parse(FDISK_CAPTURE, 1_048_576).unwrap();
        assert_eq!(geometry.device, "/dev/sdb");
        assert_eq!(geometry.sector_size, 512);
        assert_eq!(geometry.total_lbas, 41_943_040);
        assert_eq!(geometry.num_buckets, 20_480);
    }

    #[test]
    fn missing_scalars_are_fatal() {
        let err = Geometry::parse("Disk /dev/sdb: 21.5 GB, 21474836480 bytes", 1_048_576)
            .unwrap_err();
        assert!(matches!(err, GeometryError::MissingSectorSize));

        let err = Geometry::parse(
            "Units = sectors of 1 * 512 = 512 bytes\ntotal 100 sectors",
            1_048_576,
        )
        .unwrap_err();
        assert!(matches!(err, GeometryError::MissingDevice));
    }

    #[test]
    fn bucket_roundtrip_is_identity() {
        // 2 GiB device, 512-byte sectors, 1 MiB buckets -> 2048 buckets
        let geometry = Geometry::new(String::from("/dev/sdb"), 512, 2048 * 2048, 1_048_576);
        assert_eq!(geometry.num_buckets, 2048);
        for bucket in 0..geometry.num_buckets {
            assert_eq!(geometry.lba_to_bucket(geometry.bucket_to_lba(bucket)), bucket);
        }
    }

    #[test]
    fn out_of_range_lbas_clamp_to_last_bucket() {
        let geometry = Geometry::new(String::from("/dev/sdb"), 512, 2048 * 4, 1_048_576);
        assert_eq!(geometry.num_buckets, 4);
        assert_eq!(geometry.lba_to_bucket(2048 * 4 - 1), 3);
        assert_eq!(geometry.lba_to_bucket(2048 * 4), 3);
        assert_eq!(geometry.lba_to_bucket(2048 * 64), 3);
    }
}

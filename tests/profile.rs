//! End-to-end profiling runs over a synthetic trace bundle, exercising the
//! whole pipeline: enumeration, ingestion (serial and pooled), aggregation,
//! attribution, analytics, and report rendering.

use ioscope::aggregate::GlobalState;
use ioscope::analyze::{attribute, histogram};
use ioscope::bundle::Bundle;
use ioscope::geometry::Geometry;
use ioscope::ingest::{self, IngestSummary};
use ioscope::report;
use ioscope::shell::Shell;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;

/// 2 GiB device, 512-byte sectors (4194304 LBAs, 2048 one-MiB buckets)
const FDISK_CAPTURE: &str = "\
Disk /dev/sdb: 2.1 GB, 2147483648 bytes
64 heads, 32 sectors/track, 2048 cylinders, total 4194304 sectors
Units = sectors of 1 * 512 = 512 bytes
";

const TRACE_SHARD_0: &str = "\
8,16 Q R 0 8
8,16 Q W 2040 4096
8,16 m N cfq1234 irrelevant bookkeeping line
8,16 Q A 0 8
";

const TRACE_SHARD_1: &str = "\
8,16 Q RW 4096 16
8,16 Q WS 8192 8
";

const EXTENT_SHARD: &str = "\
/data/hot.db :: 0:4095
/data/cold.db :: 8192:12287
";

fn sink_shell() -> Arc<Shell> {
    Arc::new(Shell::from_write(
        Box::new(io::sink()),
        Box::new(io::sink()),
    ))
}

fn write_gzipped(path: &Path, content: &str) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::fast());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn write_bundle_dir(dir: &Path) {
    fs::write(dir.join("fdisk.sdb"), FDISK_CAPTURE).unwrap();
    fs::write(dir.join("blk.out.sdb.0.blkparse"), TRACE_SHARD_0).unwrap();
    write_gzipped(&dir.join("blk.out.sdb.1.blkparse.gz"), TRACE_SHARD_1);
    fs::write(dir.join("filetrace.sdb.0.txt"), EXTENT_SHARD).unwrap();
}

fn run_bundle(input: &Path, single_threaded: bool) -> (Arc<Geometry>, IngestSummary) {
    let shell = sink_shell();
    let bundle = Bundle::open(input, &shell).unwrap();
    let metadata = bundle.read_metadata().unwrap();
    let geometry = Arc::new(Geometry::parse(&metadata, 1_048_576).unwrap());
    let summary = ingest::run(&geometry, bundle.shards, 8, single_threaded, &shell);
    (geometry, summary)
}

fn assert_expected_state(state: &GlobalState) {
    assert_eq!(state.io_total, 4);
    assert_eq!(state.read_total, 2);
    assert_eq!(state.write_total, 2);
    assert_eq!(state.total_blocks, 8 + 4096 + 16 + 8);
    // R 0 8 -> bucket 0; W 2040 4096 -> buckets 0-2; RW 4096 16 -> bucket 2
    // (byte 2 MiB exactly); WS 8192 8 -> bucket 4
    assert_eq!(state.bucket_hits_total, 6);
    assert_eq!(state.reads.get(&0), Some(&1));
    assert_eq!(state.reads.get(&1), None);
    assert_eq!(state.reads.get(&2), Some(&1));
    assert_eq!(state.writes.get(&0), Some(&1));
    assert_eq!(state.writes.get(&1), Some(&1));
    assert_eq!(state.writes.get(&2), Some(&1));
    assert_eq!(state.writes.get(&4), Some(&1));
    assert_eq!(state.r_totals.get(&8), Some(&1));
    assert_eq!(state.r_totals.get(&16), Some(&1));
    assert_eq!(state.w_totals.get(&4096), Some(&1));
    assert_eq!(state.w_totals.get(&8), Some(&1));
    assert_eq!(state.io_total, state.read_total + state.write_total);
}

#[test]
fn profiles_an_expanded_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle_dir(dir.path());

    let (geometry, summary) = run_bundle(dir.path(), false);
    assert_eq!(geometry.num_buckets, 2048);
    assert_eq!(summary.ingested, 3);
    assert_eq!(summary.skipped, 0);
    assert_expected_state(&summary.state);
    assert_eq!(summary.extents.len(), 2);
}

#[test]
fn serial_and_pooled_ingestion_agree() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle_dir(dir.path());

    let (_, serial) = run_bundle(dir.path(), true);
    let (_, pooled) = run_bundle(dir.path(), false);
    assert_eq!(serial.state, pooled.state);
    assert_eq!(serial.extents, pooled.extents);
}

#[test]
fn profiles_a_tar_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let content = dir.path().join("content");
    fs::create_dir(&content).unwrap();
    write_bundle_dir(&content);

    let tar_path = dir.path().join("sdb.tar");
    let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
    for entry in fs::read_dir(&content).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap().to_owned();
        builder.append_path_with_name(&path, &name).unwrap();
    }
    builder.finish().unwrap();

    let (_, summary) = run_bundle(&tar_path, false);
    assert_expected_state(&summary.state);
    assert_eq!(summary.extents.len(), 2);
}

#[test]
fn corrupt_shards_are_skipped_and_the_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle_dir(dir.path());
    // Claims to be gzip but is not
    fs::write(dir.path().join("blk.out.sdb.2.blkparse.gz"), b"not gzip").unwrap();

    let (_, summary) = run_bundle(dir.path(), false);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.ingested, 3);
    assert_expected_state(&summary.state);
}

#[test]
fn attribution_and_report_cover_the_ingested_files() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle_dir(dir.path());

    let (geometry, summary) = run_bundle(dir.path(), false);
    let hits = attribute::attribute(&geometry, &summary.extents, &summary.state.bucket_totals());
    let top = histogram::top_files(&hits, summary.state.bucket_hits_total, 10);

    // /data/hot.db covers buckets 0-1 (2 hits + 1 hit); /data/cold.db covers
    // buckets 4-5 (1 hit)
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].path.as_ref(), "/data/hot.db");
    assert_eq!(top[0].hits, 3);
    assert_eq!(top[1].path.as_ref(), "/data/cold.db");
    assert_eq!(top[1].hits, 1);

    let analysis = histogram::analyze(&geometry, &summary.state, 0.02);
    let mut buffer: Vec<u8> = Vec::new();
    report::write(&mut buffer, &geometry, &summary.state, &analysis, Some(&top)).unwrap();
    let rendered = String::from_utf8(buffer).unwrap();

    assert!(rendered.contains("Device: /dev/sdb"));
    assert!(rendered.contains("lbas: 4194304 sec_size: 512 total: 2.00 GiB"));
    assert!(rendered.contains("Histogram IOPS:"));
    assert!(rendered.contains("Top files by IOPS:"));
    assert!(rendered.contains("(3) /data/hot.db"));
}

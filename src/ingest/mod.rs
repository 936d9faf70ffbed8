pub mod extent;
pub mod record;
pub mod shard;

use crate::aggregate::GlobalState;
use crate::bundle::{self, Shard, ShardKind};
use crate::geometry::Geometry;
use crate::ingest::extent::ExtentMap;
use crate::ingest::shard::ShardState;
use crate::shell::Shell;
use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use anyhow::Context;

/// Result of ingesting every shard in the bundle
pub struct IngestSummary {
    pub state:    GlobalState,
    pub extents:  ExtentMap,
    /// Shards successfully drained into the global state
    pub ingested: usize,
    /// Shards skipped because of read/decode failures
    pub skipped:  usize,
}

/// One finished shard, sent from a worker to the aggregation loop. Workers
/// accumulate into thread-local state only; the whole summary changes
/// ownership here, so no global locking is needed during record processing.
enum Outcome {
    Trace(ShardState),
    Extent(ExtentMap),
    Failed {
        shard: Shard,
        error: anyhow::Error,
    },
}

/// Processes every shard to completion and merges the results into a single
/// global state. Each worker owns one shard end-to-end: it parses the whole
/// file into thread-local state, then sends the finished summary over the
/// channel. The channel drain doubles as the aggregation point, and joining
/// the pool is the barrier that analytics waits on.
///
/// A shard that fails to read is skipped with a warning; the remaining
/// shards still produce a meaningful (partial) profile.
#[must_use]
pub fn run(
    geometry: &Arc<Geometry>,
    shards: Vec<Shard>,
    pool_cap: u64,
    single_threaded: bool,
    shell: &Arc<Shell>,
) -> IngestSummary {
    let start = Instant::now();
    let trace_count = shards.iter().filter(|s| s.kind == ShardKind::Trace).count();
    let extent_count = shards.len() - trace_count;
    shell.status(
        "Ingesting",
        format!(
            "{} trace shard(s) and {} extent shard(s) from {}",
            trace_count, extent_count, geometry.device
        ),
    );

    let mut summary = IngestSummary {
        state:    GlobalState::new(),
        extents:  ExtentMap::new(),
        ingested: 0,
        skipped:  0,
    };

    if single_threaded {
        for shard in shards {
            let outcome = process_shard(geometry, shard);
            absorb(&mut summary, outcome, shell);
        }
    } else {
        let worker_count = (pool_cap as usize).min(shards.len()).max(1);
        let queue = Arc::new(Mutex::new(shards));
        let (tx, rx): (Sender<Outcome>, Receiver<Outcome>) = mpsc::channel();

        let mut workers: Vec<thread::JoinHandle<()>> = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let tx = tx.clone();
            let queue = Arc::clone(&queue);
            let geometry = Arc::clone(geometry);
            let handle = thread::Builder::new()
                .name(format!("ingest-{}", id))
                .spawn(move || {
                    loop {
                        let shard = {
                            let mut queue = queue.lock().unwrap();
                            queue.pop()
                        };
                        let shard = match shard {
                            Some(shard) => shard,
                            None => break,
                        };
                        let outcome = process_shard(&geometry, shard);
                        if tx.send(outcome).is_err() {
                            // Aggregator went away; nothing left to do
                            break;
                        }
                    }
                })
                .expect("Error: could not spawn ingest worker thread");
            workers.push(handle);
        }

        // Drop the original sender so the drain loop ends when the last
        // worker finishes
        drop(tx);
        for outcome in rx {
            absorb(&mut summary, outcome, shell);
        }
        for worker in workers {
            worker
                .join()
                .expect("Error: ingest worker thread resulted in panic");
        }
    }

    shell.status(
        "Ingested",
        format!(
            "{} shard(s) in {}",
            summary.ingested,
            humantime::Duration::from(start.elapsed())
        ),
    );
    summary
}

/// Merges one worker outcome into the run summary, downgrading shard
/// failures to warnings
fn absorb(summary: &mut IngestSummary, outcome: Outcome, shell: &Shell) {
    match outcome {
        Outcome::Trace(state) => {
            summary.state.merge(state);
            summary.ingested += 1;
        },
        Outcome::Extent(extents) => {
            summary.extents.merge(extents);
            summary.ingested += 1;
        },
        Outcome::Failed { shard, error } => {
            shell.warn(format!(
                "skipping {} shard {:?}: {:#}",
                shard.kind, shard.path, error
            ));
            summary.skipped += 1;
        },
    }
}

/// Runs a single shard to completion against fresh thread-local state
fn process_shard(geometry: &Geometry, shard: Shard) -> Outcome {
    let result = match shard.kind {
        ShardKind::Trace => process_trace(geometry, &shard.path).map(Outcome::Trace),
        ShardKind::Extent => process_extent(&shard.path).map(Outcome::Extent),
    };
    result.unwrap_or_else(|error| Outcome::Failed { shard, error })
}

fn process_trace(geometry: &Geometry, path: &Path) -> anyhow::Result<ShardState> {
    let reader =
        bundle::open_shard(path).with_context(|| format!("could not open trace shard {:?}", path))?;

    let mut state = ShardState::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("could not read trace shard {:?}", path))?;
        // Lines that aren't queued I/O requests fall through silently
        if let Some(record) = record::parse_line(&line) {
            state.observe(geometry, record);
        }
    }
    Ok(state)
}

fn process_extent(path: &Path) -> anyhow::Result<ExtentMap> {
    let reader = bundle::open_shard(path)
        .with_context(|| format!("could not open extent shard {:?}", path))?;

    let mut extents = ExtentMap::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("could not read extent shard {:?}", path))?;
        extents.ingest_line(&line);
    }
    Ok(extents)
}

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use anyhow::ensure;
use ioscope::analyze::{attribute, histogram};
use ioscope::bundle::Bundle;
use ioscope::cli::{self, Command, ReportOptions};
use ioscope::geometry::Geometry;
use ioscope::ingest;
use ioscope::report;
use ioscope::shell::Shell;

/// Parses CLI args and runs the correct procedure depending on the subcommand
fn main() {
    // Setup human-readable panic handler
    human_panic::setup_panic!(human_panic::Metadata {
        name:     env!("CARGO_PKG_NAME").into(),
        version:  env!("CARGO_PKG_VERSION").into(),
        authors:  env!("CARGO_PKG_AUTHORS").into(),
        homepage: "https://github.com/elba-docker/ioscope/issues/new".into(),
    });

    // Parse command line arguments
    let opts = cli::load();
    // Wrap the shell in an Arc so that it can be sent across threads
    let shell = Arc::new(Shell::new(&opts.shell_options));

    match opts.command {
        Command::Report(options) => {
            if let Err(err) = run(&options, &shell) {
                shell.error(format!("{:#}", err));
                std::process::exit(1);
            }
        },
    }
}

/// Drives a full profiling run: geometry, ingestion, attribution, analytics,
/// and finally the report on stdout
fn run(options: &ReportOptions, shell: &Arc<Shell>) -> anyhow::Result<()> {
    let start = Instant::now();

    let bundle = Bundle::open(&options.input, shell)?;
    let metadata = bundle.read_metadata()?;
    let geometry = Arc::new(Geometry::parse(&metadata, options.bucket_size)?);
    shell.verbose(|sh| {
        sh.info(format!(
            "dev={} lbas={} sec_size={} buckets={} bucket_size={}",
            geometry.device,
            geometry.total_lbas,
            geometry.sector_size,
            geometry.num_buckets,
            geometry.bucket_size
        ));
    });
    ensure!(
        !bundle.shards.is_empty(),
        "no trace or extent shards found in {:?}",
        options.input
    );

    let summary = ingest::run(
        &geometry,
        bundle.shards,
        options.pool_cap(),
        options.single_threaded,
        shell,
    );
    ensure!(
        summary.ingested > 0,
        "all {} shard(s) failed to ingest; no profile to report",
        summary.skipped
    );

    // Attribution runs only when extent shards were present; a profile
    // without them is still meaningful
    let top_files = match summary.extents.is_empty() {
        true => None,
        false => {
            shell.status("Attributing", format!("{} file(s)", summary.extents.len()));
            let hits = attribute::attribute(
                &geometry,
                &summary.extents,
                &summary.state.bucket_totals(),
            );
            Some(histogram::top_files(
                &hits,
                summary.state.bucket_hits_total,
                options.top_count_limit,
            ))
        },
    };

    shell.status("Analyzing", format!("{} bucket(s)", geometry.num_buckets));
    let analysis = histogram::analyze(&geometry, &summary.state, options.percent);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::write(
        &mut out,
        &geometry,
        &summary.state,
        &analysis,
        top_files.as_deref(),
    )?;
    out.flush()?;

    shell.status(
        "Finished",
        format!(
            "profiling {} in {}",
            geometry.device,
            humantime::Duration::from(start.elapsed())
        ),
    );
    Ok(())
}

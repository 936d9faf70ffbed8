//! Plain-text report rendering. The report body is the program's output
//! contract and goes to raw stdout; everything diagnostic goes through the
//! shell instead.

use crate::aggregate::GlobalState;
use crate::analyze::{Analysis, TopFile};
use crate::geometry::Geometry;
use std::io::{self, Write};

const RULE: &str = "--------------------------------------------";

/// Writes the full report: geometry summary, both histograms, the theta
/// estimate, and (when extent shards were ingested) the top-files section.
/// `top_files` is `None` when no extent data was present, which omits the
/// section entirely.
pub fn write<W: Write>(
    out: &mut W,
    geometry: &Geometry,
    state: &GlobalState,
    analysis: &Analysis,
    top_files: Option<&[TopFile]>,
) -> io::Result<()> {
    writeln!(out, "Device: {}", geometry.device)?;
    writeln!(
        out,
        "lbas: {} sec_size: {} total: {:.2} GiB",
        geometry.total_lbas,
        geometry.sector_size,
        geometry.capacity_gib()
    )?;
    writeln!(
        out,
        "buckets: {} bucket_size: {} max_bucket_hits: {}",
        geometry.num_buckets, geometry.bucket_size, state.max_bucket_hits
    )?;

    writeln!(out, "{}", RULE)?;
    writeln!(out, "Histogram IOPS:")?;
    for row in &analysis.rows {
        writeln!(
            out,
            "{:.1} GB {:.1}% ({:.1}% cumulative)",
            row.cumulative_gib, row.section_iops_pct, row.cumulative_iops_pct
        )?;
    }

    writeln!(out, "{}", RULE)?;
    writeln!(out, "Histogram Bandwidth:")?;
    for row in &analysis.rows {
        writeln!(out, "{:.1} GB {:.1}%", row.cumulative_gib, row.section_bw_pct)?;
    }

    writeln!(out, "{}", RULE)?;
    match &analysis.theta {
        Some(theta) => writeln!(
            out,
            "Approximate Zipfian Theta Range: {:.4}-{:.4} (est. {:.4}).",
            theta.min, theta.max, theta.approx
        )?,
        None => writeln!(
            out,
            "Zipfian theta not estimated: too few distinct bucket populations."
        )?,
    }

    if let Some(top_files) = top_files {
        writeln!(out, "{}", RULE)?;
        writeln!(out, "Top files by IOPS:")?;
        writeln!(out, "Total I/O's: {}", state.bucket_hits_total)?;
        if state.bucket_hits_total == 0 {
            writeln!(out, "No Bucket Hits")?;
        } else {
            for file in top_files {
                writeln!(out, "{:.2}% ({}) {}", file.pct, file.hits, file.path)?;
            }
        }
    }
    writeln!(out, "{}", RULE)?;

    Ok(())
}

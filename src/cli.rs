use crate::shell;
use crate::util;
use std::path::PathBuf;

use byte_unit::Byte;
use clap::{AppSettings, Parser};
use thiserror::Error;

/// Worker pool cap is this multiple of the core count unless overridden
const THREAD_MAX_CORE_MULTIPLE: u64 = 4;

/// CLI version loaded from Cargo, or "unknown" if not built with cargo
pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// Parse failure for a custom CLI value, wrapping the offending string
#[derive(Debug, Error)]
#[error("invalid {field} given: '{given}'")]
pub struct ParseFailure {
    field: String,
    given: String,
}

impl ParseFailure {
    #[must_use]
    pub fn new(field: String, given: String) -> Self { Self { field, given } }
}

/// Auto-parsed CLI options, generated via clap
#[derive(Parser)]
#[clap(
    version = VERSION.unwrap_or("unknown"),
    author = "Joseph Azevedo, Bhanu Garg",
    about = "Profiles block-device I/O traces into spatial and statistical reports",
    setting = AppSettings::ColoredHelp
)]
pub struct Opts {
    #[clap(subcommand)]
    pub command: Command,

    // Shell output-related options
    #[clap(flatten)]
    pub shell_options: shell::Options,
}

/// Possible subcommands
#[derive(Parser)]
pub enum Command {
    /// Post-processes a trace bundle into a plain-text profile on stdout
    #[clap(setting = AppSettings::ColoredHelp)]
    Report(ReportOptions),
}

/// Options for the `report` subcommand
#[derive(Parser, Clone)]
pub struct ReportOptions {
    /// Input to profile: either a .tar bundle produced by the tracer or a
    /// directory of already-expanded shards
    #[clap(parse(from_os_str))]
    pub input: PathBuf,

    /// Size of each LBA aggregation bucket, as a byte amount ("1 MiB")
    #[clap(
        short = 'b',
        long = "bucket-size",
        default_value = "1 MiB",
        parse(try_from_str = parse_byte_amount)
    )]
    pub bucket_size: u64,

    /// Fraction of device capacity that closes one histogram section
    #[clap(long = "percent", default_value = "0.02")]
    pub percent: f64,

    /// Number of entries in the top-files list
    #[clap(short = 'n', long = "top-files", default_value = "10")]
    pub top_count_limit: u32,

    /// Cap on the number of worker threads (default: 4x core count)
    #[clap(short = 't', long = "threads")]
    pub thread_max: Option<u32>,

    /// Process shards serially on the main thread (for debugging)
    #[clap(long = "single-threaded")]
    pub single_threaded: bool,
}

impl ReportOptions {
    /// Resolves the worker pool cap, folding in the core-count default
    #[must_use]
    pub fn pool_cap(&self) -> u64 {
        match self.thread_max {
            Some(cap) => u64::from(cap.max(1)),
            None => (util::num_cores() * THREAD_MAX_CORE_MULTIPLE).max(1),
        }
    }
}

/// Parses a human byte amount such as "1 MiB" or "4096" into its byte count
fn parse_byte_amount(s: &str) -> Result<u64, ParseFailure> {
    Byte::from_str(s)
        .map(|b| b.get_bytes() as u64)
        .ok()
        .filter(|&b| b > 0)
        .ok_or_else(|| ParseFailure::new(String::from("byte amount"), s.to_owned()))
}

/// Parses and resolves defaults for all CLI arguments. Additionally, handles
/// displaying help/version text if specified.
#[must_use]
pub fn load() -> Opts { Opts::parse() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_byte_amounts() {
        assert_eq!(parse_byte_amount("4096").unwrap(), 4096);
        assert_eq!(parse_byte_amount("1 MiB").unwrap(), 1_048_576);
        assert_eq!(parse_byte_amount("2 KiB").unwrap(), 2048);
    }

    #[test]
    fn rejects_garbage_byte_amounts() {
        assert!(parse_byte_amount("one megabyte").is_err());
        assert!(parse_byte_amount("").is_err());
    }
}

//! System command implementation.
//!
//! Prints boot time, CPU counts, CPU statistics and memory.

use herakles_procfs::system::{self, SystemSummary};
use herakles_procfs::Config;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::{format_timestamp, render};

#[derive(Debug, Serialize)]
struct SystemReport {
    #[serde(flatten)]
    summary: SystemSummary,
    booted: String,
}

/// Prints system-wide facts for the configured roots.
pub fn command_system(format: OutputFormat, config: &Config) -> anyhow::Result<()> {
    let summary = system::summary(config)?;
    let report = SystemReport {
        booted: format_timestamp(summary.boot_time),
        summary,
    };
    print!("{}", render(&report, format)?);
    Ok(())
}

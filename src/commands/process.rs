//! Process command implementation.
//!
//! Prints one process snapshot.

use anyhow::Context;
use herakles_procfs::{Config, ProcessHandle, ProcessInfo, Procfs};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::{format_timestamp, render};

/// [`ProcessInfo`] plus its start time rendered for humans.
#[derive(Debug, Serialize)]
pub struct ProcessReport {
    #[serde(flatten)]
    pub info: ProcessInfo,
    pub started: String,
}

impl From<ProcessInfo> for ProcessReport {
    fn from(info: ProcessInfo) -> Self {
        let started = format_timestamp(info.create_time);
        ProcessReport { info, started }
    }
}

/// Prints the attributes of `pid`.
pub fn command_process(pid: u32, format: OutputFormat, config: &Config) -> anyhow::Result<()> {
    let handle = ProcessHandle::with_source(pid, Procfs::from_config(config));
    let info = handle
        .info()
        .with_context(|| format!("failed to read process {}", pid))?;
    print!("{}", render(&ProcessReport::from(info), format)?);
    Ok(())
}

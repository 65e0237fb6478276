//! Ps command implementation.
//!
//! Snapshots every process in parallel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use herakles_procfs::{system, Config, ProcessHandle, Procfs, ProcfsError};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cli::OutputFormat;
use crate::commands::process::ProcessReport;
use crate::commands::render;

#[derive(Debug, Serialize)]
struct PsReport {
    count: usize,
    vanished: usize,
    processes: Vec<ProcessReport>,
}

/// Prints a snapshot of every process, optionally filtered by name.
pub fn command_ps(
    name_filter: Option<&str>,
    parallelism: usize,
    format: OutputFormat,
    config: &Config,
) -> anyhow::Result<()> {
    if parallelism > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build_global()
            .unwrap_or_else(|e| error!("Failed to set rayon thread pool: {}", e));
        debug!("Rayon thread pool configured with {} threads", parallelism);
    }

    let start = Instant::now();
    let pids = system::pids_in(&config.procfs_path)?;
    debug!("Collected {} pids from {}", pids.len(), config.procfs_path.display());

    let vanished = AtomicUsize::new(0);
    let mut processes: Vec<ProcessReport> = pids
        .par_iter()
        .filter_map(|&pid| {
            let handle = ProcessHandle::with_source(pid, Procfs::from_config(config));
            match handle.info() {
                Ok(info) => Some(info),
                Err(ProcfsError::NoSuchProcess { .. }) => {
                    debug!("Skipping process {}: exited during scan", pid);
                    vanished.fetch_add(1, Ordering::Relaxed);
                    None
                }
                Err(e @ (ProcfsError::AccessDenied { .. } | ProcfsError::ZombieProcess { .. })) => {
                    debug!("Skipping process {}: {}", pid, e);
                    None
                }
                Err(e) => {
                    warn!("Failed to read process {}: {}", pid, e);
                    None
                }
            }
        })
        .filter(|info| name_filter.map_or(true, |f| info.name.contains(f)))
        .map(ProcessReport::from)
        .collect();
    processes.sort_by_key(|p| p.info.pid);

    info!(
        "Scanned {} processes in {:.1} ms",
        processes.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let report = PsReport {
        count: processes.len(),
        vanished: vanished.into_inner(),
        processes,
    };
    print!("{}", render(&report, format)?);
    Ok(())
}

//! Herakles procfs library
//!
//! Per-process and system-wide facts for Linux, read from the kernel's
//! pseudo-filesystems.
//!
//! # Features
//!
//! - **Process facade**: [`ProcessHandle`] resolves name, status, CPU times,
//!   memory, command line, links, ids and priority on demand
//! - **Batched reads**: inside a [`ProcessHandle::oneshot`] scope the stat
//!   and status files are read at most once
//! - **Lifecycle-aware errors**: OS failures surface as
//!   [`ProcfsError::NoSuchProcess`], [`ProcfsError::ZombieProcess`] or
//!   [`ProcfsError::AccessDenied`]; anything else passes through unchanged
//! - **System facts**: boot time, CPU counts, CPU statistics, memory and
//!   pid enumeration in [`system`]
//!
//! # Usage
//!
//! ```no_run
//! use herakles_procfs::{system, ProcessHandle, ProcfsError};
//!
//! for pid in system::pids()? {
//!     let p = ProcessHandle::new(pid);
//!     let _batch = p.oneshot();
//!     match (p.name(), p.cpu_times()) {
//!         (Ok(name), Ok(cpu)) => println!("{pid} {name} {:.2}s", cpu.total()),
//!         (Err(ProcfsError::NoSuchProcess { .. }), _) => continue,
//!         (Err(e), _) | (_, Err(e)) => return Err(e),
//!     }
//! }
//! # Ok::<(), ProcfsError>(())
//! ```
//!
//! The kernel filesystem roots come from [`config::global`], which reads
//! `HERAKLES_PROCFS_PATH` / `HERAKLES_SYSFS_PATH` unless a configuration
//! was installed with [`config::init`].

pub mod config;
pub mod error;
pub mod process;
pub mod sysconf;
pub mod system;

// Re-export main types for convenience
pub use config::Config;
pub use error::{ProcfsError, Result};
pub use process::{
    BatchCache, CpuTimes, MemoryInfo, ProcSource, ProcStatus, ProcessHandle, ProcessInfo, Procfs,
};
pub use system::{boot_time, cpu_count_logical, cpu_count_physical, cpu_stats, pid_exists, pids};

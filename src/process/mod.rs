//! Per-process data: kernel file access, record parsers, the batch cache
//! and the [`ProcessHandle`] facade built on them.
//!
//! This module provides:
//! - `source`: raw reads of `/proc/<pid>/*` files and links
//! - `stat`, `memory`, `status`, `cmdline`: record parsers
//! - `cpu`: tick to second conversion
//! - `cache`: batch-scoped memoization
//! - `handle`: the process facade

pub mod cache;
pub mod cmdline;
pub mod cpu;
pub mod handle;
pub mod memory;
pub mod source;
pub mod stat;
pub mod status;

// Re-export commonly used types
pub use cache::{BatchCache, CacheKey};
pub use cmdline::parse_cmdline;
pub use cpu::CpuTimes;
pub use handle::{Oneshot, ProcessHandle, ProcessInfo};
pub use memory::{parse_statm, MemoryInfo};
pub use source::{clean_link_target, resolve_link, ProcSource, Procfs};
pub use stat::{parse_stat, StatRecord};
pub use status::{CtxSwitches, Ids, ProcStatus};

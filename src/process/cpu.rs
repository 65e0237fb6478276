//! CPU time conversion for process metrics.
//!
//! The stat record reports CPU usage in clock ticks; this module turns the
//! four tick counters into seconds.

use crate::process::stat::StatRecord;
use crate::sysconf::CLK_TCK;
use serde::Serialize;

/// CPU time consumed by a process and its waited-for children, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    pub children_user: f64,
    pub children_system: f64,
}

impl CpuTimes {
    /// Converts the tick counters of `rec` using `clk_tck` ticks per second.
    pub fn from_ticks(rec: &StatRecord, clk_tck: f64) -> Self {
        CpuTimes {
            user: rec.utime as f64 / clk_tck,
            system: rec.stime as f64 / clk_tck,
            children_user: rec.children_utime as f64 / clk_tck,
            children_system: rec.children_stime as f64 / clk_tck,
        }
    }

    /// User plus system time of the process itself.
    pub fn total(&self) -> f64 {
        self.user + self.system
    }
}

impl From<&StatRecord> for CpuTimes {
    fn from(rec: &StatRecord) -> Self {
        CpuTimes::from_ticks(rec, *CLK_TCK)
    }
}

//! Process state codes and `/proc/<pid>/status` field extraction.

use crate::error::{ProcfsError, Result};
use serde::Serialize;
use std::fmt;

/// Process state, from the single-letter code in the stat record.
///
/// Letters follow `fs/proc/array.c` and the `TASK_*` constants in
/// `include/linux/sched.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcStatus {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    TracingStop,
    Zombie,
    Dead,
    WakeKill,
    Waking,
    Idle,
    Parked,
    /// Letter not present in the table.
    #[serde(rename = "?")]
    Unknown,
}

impl ProcStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            b'R' => ProcStatus::Running,
            b'S' => ProcStatus::Sleeping,
            b'D' => ProcStatus::DiskSleep,
            b'T' => ProcStatus::Stopped,
            b't' => ProcStatus::TracingStop,
            b'Z' => ProcStatus::Zombie,
            b'X' | b'x' => ProcStatus::Dead,
            b'K' => ProcStatus::WakeKill,
            b'W' => ProcStatus::Waking,
            b'I' => ProcStatus::Idle,
            b'P' => ProcStatus::Parked,
            _ => ProcStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcStatus::Running => "running",
            ProcStatus::Sleeping => "sleeping",
            ProcStatus::DiskSleep => "disk-sleep",
            ProcStatus::Stopped => "stopped",
            ProcStatus::TracingStop => "tracing-stop",
            ProcStatus::Zombie => "zombie",
            ProcStatus::Dead => "dead",
            ProcStatus::WakeKill => "wake-kill",
            ProcStatus::Waking => "waking",
            ProcStatus::Idle => "idle",
            ProcStatus::Parked => "parked",
            ProcStatus::Unknown => "?",
        }
    }
}

impl fmt::Display for ProcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Real, effective and saved ids from a `Uid:` or `Gid:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ids {
    pub real: u32,
    pub effective: u32,
    pub saved: u32,
}

/// Voluntary and involuntary context switch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CtxSwitches {
    pub voluntary: u64,
    pub involuntary: u64,
}

/// Value part of the first `Key:\tvalue` line matching `key`.
pub fn status_field<'a>(data: &'a [u8], key: &str) -> Option<&'a str> {
    data.split(|&b| b == b'\n').find_map(|line| {
        let rest = line.strip_prefix(key.as_bytes())?.strip_prefix(b":")?;
        std::str::from_utf8(rest).ok().map(str::trim)
    })
}

fn required<'a>(data: &'a [u8], key: &str) -> Result<&'a str> {
    status_field(data, key)
        .ok_or_else(|| ProcfsError::parse("status record", format!("'{key}' line not found")))
}

fn first_num<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ProcfsError::parse("status record", format!("bad '{key}' value {value:?}")))
}

/// Thread group id.
pub fn parse_tgid(data: &[u8]) -> Result<u32> {
    first_num(required(data, "Tgid")?, "Tgid")
}

/// Number of threads.
pub fn parse_num_threads(data: &[u8]) -> Result<u32> {
    first_num(required(data, "Threads")?, "Threads")
}

fn parse_ids(data: &[u8], key: &str) -> Result<Ids> {
    let value = required(data, key)?;
    let ids: Vec<u32> = value
        .split_whitespace()
        .take(3)
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| ProcfsError::parse("status record", format!("bad '{key}' value: {e}")))?;
    match ids[..] {
        [real, effective, saved] => Ok(Ids {
            real,
            effective,
            saved,
        }),
        _ => Err(ProcfsError::parse(
            "status record",
            format!("'{key}' line has fewer than 3 ids"),
        )),
    }
}

pub fn parse_uids(data: &[u8]) -> Result<Ids> {
    parse_ids(data, "Uid")
}

pub fn parse_gids(data: &[u8]) -> Result<Ids> {
    parse_ids(data, "Gid")
}

pub fn parse_ctx_switches(data: &[u8]) -> Result<CtxSwitches> {
    Ok(CtxSwitches {
        voluntary: first_num(
            required(data, "voluntary_ctxt_switches")?,
            "voluntary_ctxt_switches",
        )?,
        involuntary: first_num(
            required(data, "nonvoluntary_ctxt_switches")?,
            "nonvoluntary_ctxt_switches",
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &[u8] = b"Name:\tbash\n\
Umask:\t0022\n\
State:\tS (sleeping)\n\
Tgid:\t4242\n\
Ngid:\t0\n\
Pid:\t4243\n\
PPid:\t1\n\
Uid:\t1000\t1001\t1002\t1003\n\
Gid:\t100\t101\t102\t103\n\
Threads:\t7\n\
voluntary_ctxt_switches:\t150\n\
nonvoluntary_ctxt_switches:\t545\n";

    #[test]
    fn test_status_table() {
        assert_eq!(ProcStatus::from_code(b'R'), ProcStatus::Running);
        assert_eq!(ProcStatus::from_code(b'x'), ProcStatus::Dead);
        assert_eq!(ProcStatus::from_code(b'X'), ProcStatus::Dead);
        assert_eq!(ProcStatus::from_code(b'P').to_string(), "parked");
        assert_eq!(ProcStatus::from_code(b'D').as_str(), "disk-sleep");
    }

    #[test]
    fn test_unknown_status_code() {
        assert_eq!(ProcStatus::from_code(b'?'), ProcStatus::Unknown);
        assert_eq!(ProcStatus::from_code(b'Q').as_str(), "?");
    }

    #[test]
    fn test_tgid_does_not_match_ngid_or_pid() {
        assert_eq!(parse_tgid(STATUS).unwrap(), 4242);
    }

    #[test]
    fn test_missing_tgid() {
        assert!(parse_tgid(b"Name:\tx\nPid:\t1\n").is_err());
    }

    #[test]
    fn test_ids() {
        let uids = parse_uids(STATUS).unwrap();
        assert_eq!((uids.real, uids.effective, uids.saved), (1000, 1001, 1002));
        let gids = parse_gids(STATUS).unwrap();
        assert_eq!((gids.real, gids.effective, gids.saved), (100, 101, 102));
    }

    #[test]
    fn test_threads_and_ctx_switches() {
        assert_eq!(parse_num_threads(STATUS).unwrap(), 7);
        let ctx = parse_ctx_switches(STATUS).unwrap();
        assert_eq!(ctx.voluntary, 150);
        assert_eq!(ctx.involuntary, 545);
    }

    #[test]
    fn test_status_serializes_like_display() {
        let json = serde_json::to_string(&ProcStatus::DiskSleep).unwrap();
        assert_eq!(json, "\"disk-sleep\"");
        let json = serde_json::to_string(&ProcStatus::Unknown).unwrap();
        assert_eq!(json, "\"?\"");
    }
}

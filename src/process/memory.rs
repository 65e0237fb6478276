//! Memory parsing for `/proc/<pid>/statm`.
//!
//! ```text
//!  ============================================================
//! | FIELD  | DESCRIPTION                         | AKA  | TOP  |
//!  ============================================================
//! | rss    | resident set size                   |      | RES  |
//! | vms    | total program size                  | size | VIRT |
//! | shared | shared pages (from shared mappings) |      | SHR  |
//! | text   | text ('code')                       | trs  | CODE |
//! | lib    | library (unused since Linux 2.6)    | lrs  |      |
//! | data   | data + stack                        | drs  | DATA |
//! | dirty  | dirty pages (unused since Linux 2.6)| dt   |      |
//!  ============================================================
//! ```

use crate::error::{ProcfsError, Result};
use serde::Serialize;

/// Number of leading statm fields consumed; any trailing ones are ignored.
const STATM_FIELDS: usize = 7;

/// Memory usage of one process, all values in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub rss: u64,
    pub vms: u64,
    pub shared: u64,
    pub text: u64,
    pub lib: u64,
    pub data: u64,
    pub dirty: u64,
}

/// Parses statm bytes (page counts in the order size, resident, shared,
/// text, lib, data, dt) and scales them by `page_size`.
pub fn parse_statm(data: &[u8], page_size: u64) -> Result<MemoryInfo> {
    let line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    let text = std::str::from_utf8(line)
        .map_err(|e| ProcfsError::parse("statm record", e.to_string()))?;

    let mut pages = [0u64; STATM_FIELDS];
    let mut count = 0;
    for (slot, raw) in pages.iter_mut().zip(text.split_whitespace()) {
        *slot = raw
            .parse::<u64>()
            .map_err(|e| ProcfsError::parse("statm record", format!("{raw:?}: {e}")))?;
        count += 1;
    }
    if count < STATM_FIELDS {
        return Err(ProcfsError::parse(
            "statm record",
            format!("expected {STATM_FIELDS} fields, got {count}"),
        ));
    }

    let [vms, rss, shared, text, lib, data, dirty] = pages.map(|p| p * page_size);
    Ok(MemoryInfo {
        rss,
        vms,
        shared,
        text,
        lib,
        data,
        dirty,
    })
}

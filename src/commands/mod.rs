//! CLI command implementations for herakles-procfs.
//!
//! This module provides implementations for all CLI subcommands:
//! - `process`: Attributes of one process
//! - `ps`: Snapshot of every process
//! - `system`: System-wide facts
//! - `config`: Effective configuration output
//! - `check`: procfs access validation

pub mod check;
pub mod config;
pub mod process;
pub mod ps;
pub mod system;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use process::command_process;
pub use ps::command_ps;
pub use system::command_system;

use crate::cli::OutputFormat;
use serde::Serialize;

/// Serialises `value` in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        // Value keeps plain keys ahead of tables, which the TOML encoder requires.
        OutputFormat::Toml => toml::to_string_pretty(&toml::Value::try_from(value)?)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

/// Formats seconds since the epoch as an RFC 3339 timestamp in local time.
pub fn format_timestamp(secs: f64) -> String {
    use chrono::{Local, TimeZone};
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9) as u32;
    match Local.timestamp_opt(whole, nanos).single() {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        None => format!("@{}", secs),
    }
}

//! CLI arguments and subcommands for herakles-procfs.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Output format for reports and configuration
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-procfs",
    about = "Inspect Linux processes and system facts through procfs",
    long_about = "Inspect Linux processes and system facts through procfs.\n\n\
                  Reads per-process attributes (name, status, CPU times, memory, links, ids) \
                  and system facts (boot time, CPU counts, CPU statistics, memory) straight \
                  from the kernel pseudo-filesystems.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-procfs — More info: https://www.herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// procfs mount point (overrides config and HERAKLES_PROCFS_PATH)
    #[arg(long)]
    pub procfs_path: Option<PathBuf>,

    /// sysfs mount point (overrides config and HERAKLES_SYSFS_PATH)
    #[arg(long)]
    pub sysfs_path: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "yaml", global = true)]
    pub format: OutputFormat,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show attributes of one process
    Process {
        /// Process id
        pid: u32,
    },

    /// Snapshot every process
    Ps {
        /// Only include processes whose name contains this string
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Parallel processing threads (0 = auto)
        #[arg(long, default_value_t = 0)]
        parallelism: usize,
    },

    /// Show system-wide facts
    System,

    /// Print the effective configuration
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Validate procfs access and configuration
    Check,
}

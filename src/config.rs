//! Configuration management for herakles-procfs.
//!
//! The only configuration this crate consumes is where the kernel
//! pseudo-filesystems are mounted. Values are resolved with the precedence
//! CLI > environment > config file > defaults. Config files may be YAML,
//! JSON or TOML.

use crate::error::{ProcfsError, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Default configuration constants
pub const DEFAULT_PROCFS_PATH: &str = "/proc";
pub const DEFAULT_SYSFS_PATH: &str = "/sys";

/// Environment variable overriding the procfs root.
pub const ENV_PROCFS_PATH: &str = "HERAKLES_PROCFS_PATH";
/// Environment variable overriding the sysfs root.
pub const ENV_SYSFS_PATH: &str = "HERAKLES_SYSFS_PATH";

static GLOBAL: OnceCell<Config> = OnceCell::new();

/// Kernel filesystem roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Mount point of procfs, prefixed to every per-process and system path.
    #[serde(default = "default_procfs_path", alias = "procfs-path")]
    pub procfs_path: PathBuf,

    /// Mount point of sysfs, used for CPU topology.
    #[serde(default = "default_sysfs_path", alias = "sysfs-path")]
    pub sysfs_path: PathBuf,
}

fn default_procfs_path() -> PathBuf {
    PathBuf::from(DEFAULT_PROCFS_PATH)
}

fn default_sysfs_path() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_PATH)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            procfs_path: default_procfs_path(),
            sysfs_path: default_sysfs_path(),
        }
    }
}

impl Config {
    /// Defaults overlaid with `HERAKLES_PROCFS_PATH` / `HERAKLES_SYSFS_PATH`.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Overlays environment overrides onto `self`.
    pub fn apply_env(&mut self) {
        if let Some(p) = env::var_os(ENV_PROCFS_PATH).filter(|v| !v.is_empty()) {
            debug!("procfs root overridden from environment: {:?}", p);
            self.procfs_path = PathBuf::from(p);
        }
        if let Some(p) = env::var_os(ENV_SYSFS_PATH).filter(|v| !v.is_empty()) {
            debug!("sysfs root overridden from environment: {:?}", p);
            self.sysfs_path = PathBuf::from(p);
        }
    }

    /// Both roots must be existing directories.
    pub fn validate(&self) -> Result<()> {
        for (label, path) in [("procfs_path", &self.procfs_path), ("sysfs_path", &self.sysfs_path)] {
            if path.as_os_str().is_empty() {
                return Err(ProcfsError::Config(format!("{label} is empty")));
            }
            if !path.is_dir() {
                return Err(ProcfsError::Config(format!(
                    "{label} is not a directory: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Loads a config file, or the first default location that exists.
///
/// Returns defaults when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/herakles/procfs.yaml",
                "/etc/herakles/procfs.yml",
                "/etc/herakles/procfs.json",
                "./herakles-procfs.yaml",
                "./herakles-procfs.yml",
                "./herakles-procfs.json",
            ];

            match defaults.iter().map(PathBuf::from).find(|p| p.exists()) {
                Some(p) => p,
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    parse_config(&content, path.extension().and_then(|s| s.to_str()))
        .map(|config| {
            info!("Loaded configuration from: {}", path.display());
            config
        })
}

/// Parses config text; the extension selects the format, YAML otherwise.
pub fn parse_config(content: &str, extension: Option<&str>) -> Result<Config> {
    match extension {
        Some("json") => serde_json::from_str(content).map_err(|e| ProcfsError::Config(e.to_string())),
        Some("toml") => toml::from_str(content).map_err(|e| ProcfsError::Config(e.to_string())),
        _ => serde_yaml::from_str(content).map_err(|e| ProcfsError::Config(e.to_string())),
    }
}

/// Installs the process-wide configuration. Only the first call wins;
/// later calls return the rejected value.
pub fn init(config: Config) -> std::result::Result<(), Config> {
    GLOBAL.set(config)
}

/// The process-wide configuration, resolved from the environment on first
/// use when [`init`] was never called.
pub fn global() -> &'static Config {
    GLOBAL.get_or_init(Config::from_env)
}

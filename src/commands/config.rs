//! Config command implementation.
//!
//! Prints or writes the effective configuration.

use std::fs;
use std::path::PathBuf;

use herakles_procfs::Config;

use crate::cli::OutputFormat;
use crate::commands::render;

/// Writes the effective configuration to `output`, or stdout for `-`/none.
pub fn command_config(
    output: Option<PathBuf>,
    format: OutputFormat,
    config: &Config,
) -> anyhow::Result<()> {
    let mut content = render(config, format)?;
    if matches!(format, OutputFormat::Yaml) {
        content = add_config_comments(content);
    }

    match output {
        Some(path) if path.to_string_lossy() != "-" => {
            fs::write(&path, content)?;
            println!("✅ Configuration written to: {}", path.display());
        }
        _ => print!("{}", content),
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles procfs Configuration
# ==============================
#
# procfs_path: "/proc"   # procfs mount point (env: HERAKLES_PROCFS_PATH)
# sysfs_path: "/sys"     # sysfs mount point (env: HERAKLES_SYSFS_PATH)
#
"#;
    format!("{}{}", comments, yaml)
}

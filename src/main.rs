//! herakles-procfs - version 0.1.0
//!
//! Diagnostic tool printing process and system facts read from procfs.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;

use clap::Parser;
use herakles_procfs::config::{self, load_config, Config};
use tracing::{debug, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_process, command_ps, command_system};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Resolves the effective configuration (CLI > env > config file > defaults).
fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    config.apply_env();

    if let Some(path) = &args.procfs_path {
        config.procfs_path = path.clone();
    }
    if let Some(path) = &args.sysfs_path {
        config.sysfs_path = path.clone();
    }

    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args);

    let config = resolve_config(&args)?;
    if config::init(config.clone()).is_err() {
        debug!("Global configuration already installed");
    }

    debug!(
        "herakles-procfs {} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    );

    match args.command {
        Commands::Process { pid } => command_process(pid, args.format, &config),
        Commands::Ps { name, parallelism } => {
            command_ps(name.as_deref(), parallelism, args.format, &config)
        }
        Commands::System => command_system(args.format, &config),
        Commands::Config { output } => command_config(output, args.format, &config),
        Commands::Check => {
            if !command_check(&config)? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

//! Check command implementation.
//!
//! Validates configuration and procfs access.

use herakles_procfs::system;
use herakles_procfs::{Config, ProcessHandle, Procfs};

/// Runs every check and returns whether all of them passed.
pub fn command_check(config: &Config) -> anyhow::Result<bool> {
    println!("🔍 Herakles procfs - System Check");
    println!("=================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match config.validate() {
        Ok(()) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n📁 Checking {}...", config.procfs_path.display());
    match system::pids_in(&config.procfs_path) {
        Ok(pids) if !pids.is_empty() => println!("   ✅ Can list {} processes", pids.len()),
        Ok(_) => {
            println!("   ❌ No process entries found");
            all_ok = false;
        }
        Err(e) => {
            println!("   ❌ Cannot list processes: {}", e);
            all_ok = false;
        }
    }

    let procfs = Procfs::from_config(config);
    match system::boot_time_with(&procfs) {
        Ok(bt) => println!("   ✅ Boot time readable ({})", bt),
        Err(e) => {
            println!("   ❌ Boot time unavailable: {}", e);
            all_ok = false;
        }
    }

    println!("\n🧪 Checking own process...");
    let me = ProcessHandle::with_source(std::process::id(), procfs);
    match me.info() {
        Ok(info) => println!(
            "   ✅ {} (PID: {}) status={} rss={} MB",
            info.name,
            info.pid,
            info.status,
            info.memory_info.map_or(0, |m| m.rss / 1024 / 1024)
        ),
        Err(e) => {
            println!("   ❌ Cannot read own process: {}", e);
            all_ok = false;
        }
    }

    println!("\n🖥️  CPU topology...");
    match system::cpu_count_physical_in(&config.procfs_path, &config.sysfs_path) {
        Some(n) => println!("   ✅ {} physical cores", n),
        None => println!("   ⚠️  Physical core count unknown"),
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed");
    } else {
        println!("   ❌ Some checks failed - please review output above");
    }
    Ok(all_ok)
}

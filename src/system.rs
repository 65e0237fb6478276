//! System-wide facts read from procfs and sysfs.
//!
//! Boot time, CPU counts, CPU statistics, memory, and process-id
//! enumeration. Every function has a form taking explicit roots (or a
//! [`ProcSource`]) and a convenience form that uses [`config::global`].

use crate::config::{self, Config};
use crate::error::{ProcfsError, Result};
use crate::process::source::{ProcSource, Procfs};
use crate::process::status::parse_tgid;
use crate::sysconf::{online_cpus, CLK_TCK};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

static PER_CPU_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cpu\d").expect("valid regex"));
static CPU_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cpu[0-9]").expect("valid regex"));

// ---------------------------------------------------------------------------
// Boot time
// ---------------------------------------------------------------------------

/// Lazily computed boot time.
///
/// The kernel's boot time cannot change while this process is alive, so
/// the first value read is kept for good. Computing it is idempotent:
/// threads racing on an empty cache may each read the file, but exactly
/// one value is stored and every caller observes the same one.
#[derive(Debug, Default)]
pub struct BootTimeCache {
    value: OnceCell<f64>,
}

impl BootTimeCache {
    pub const fn new() -> Self {
        BootTimeCache {
            value: OnceCell::new(),
        }
    }

    /// Cached value, if already computed.
    pub fn get(&self) -> Option<f64> {
        self.value.get().copied()
    }

    /// Cached value, computing it from `source` on first use.
    pub fn get_or_compute<S: ProcSource + ?Sized>(&self, source: &S) -> Result<f64> {
        self.value
            .get_or_try_init(|| {
                let bt = read_boot_time(source)?;
                debug!("boot time computed: {}", bt);
                Ok(bt)
            })
            .copied()
    }
}

static BOOT_TIME: BootTimeCache = BootTimeCache::new();

/// The process-wide boot time cache behind [`boot_time`].
pub fn boot_time_cache() -> &'static BootTimeCache {
    &BOOT_TIME
}

/// Reads the `btime` line of `<root>/stat`, uncached.
pub fn read_boot_time<S: ProcSource + ?Sized>(source: &S) -> Result<f64> {
    let data = source.read_system_file("stat")?;
    for line in data.split(|&b| b == b'\n') {
        if line.starts_with(b"btime") {
            return String::from_utf8_lossy(line)
                .split_whitespace()
                .nth(1)
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| ProcfsError::parse("btime line", String::from_utf8_lossy(line)));
        }
    }
    Err(ProcfsError::data_not_found(
        "line 'btime'",
        source.root().join("stat"),
    ))
}

/// System boot time in seconds since the epoch, cached process-wide.
pub fn boot_time_with<S: ProcSource + ?Sized>(source: &S) -> Result<f64> {
    BOOT_TIME.get_or_compute(source)
}

/// System boot time in seconds since the epoch, cached process-wide.
pub fn boot_time() -> Result<f64> {
    boot_time_with(&Procfs::default())
}

// ---------------------------------------------------------------------------
// CPU counts
// ---------------------------------------------------------------------------

/// Number of logical CPUs, `None` when no source can tell.
pub fn cpu_count_logical() -> Option<usize> {
    online_cpus().or_else(|| {
        debug!("sysconf(_SC_NPROCESSORS_ONLN) failed, falling back to procfs");
        cpu_count_logical_in(&config::global().procfs_path)
    })
}

/// Logical CPU count from procfs only: `processor` lines of `cpuinfo`,
/// then `cpuN` lines of `stat` for architectures whose cpuinfo has no
/// processor lines.
pub fn cpu_count_logical_in(procfs: &Path) -> Option<usize> {
    let mut num = match fs::read(procfs.join("cpuinfo")) {
        Ok(data) => data
            .split(|&b| b == b'\n')
            .filter(|line| line.to_ascii_lowercase().starts_with(b"processor"))
            .count(),
        Err(e) => {
            debug!("Failed to read {}/cpuinfo: {}", procfs.display(), e);
            0
        }
    };

    if num == 0 {
        num = match fs::read_to_string(procfs.join("stat")) {
            Ok(content) => content
                .lines()
                .filter(|line| {
                    let first = line.split(' ').next().unwrap_or_default();
                    PER_CPU_LINE.is_match(first)
                })
                .count(),
            Err(e) => {
                debug!("Failed to read {}/stat: {}", procfs.display(), e);
                0
            }
        };
    }

    (num > 0).then_some(num)
}

/// Number of physical cores, `None` when unknown.
pub fn cpu_count_physical() -> Option<usize> {
    let cfg = config::global();
    cpu_count_physical_in(&cfg.procfs_path, &cfg.sysfs_path)
}

/// Physical core count: distinct `topology/core_id` values under sysfs,
/// falling back to per-package `cpu cores` in `cpuinfo`.
pub fn cpu_count_physical_in(procfs: &Path, sysfs: &Path) -> Option<usize> {
    let from_topology = count_core_ids(sysfs);
    if from_topology > 0 {
        return Some(from_topology);
    }

    debug!("no core_id entries under {}, parsing cpuinfo", sysfs.display());
    let from_cpuinfo = match fs::read(procfs.join("cpuinfo")) {
        Ok(data) => sum_cores_per_package(&data),
        Err(e) => {
            debug!("Failed to read {}/cpuinfo: {}", procfs.display(), e);
            0
        }
    };
    (from_cpuinfo > 0).then_some(from_cpuinfo)
}

fn count_core_ids(sysfs: &Path) -> usize {
    let cpu_root = sysfs.join("devices/system/cpu");
    let entries = match fs::read_dir(&cpu_root) {
        Ok(e) => e,
        Err(e) => {
            debug!("Failed to list {}: {}", cpu_root.display(), e);
            return 0;
        }
    };

    let mut core_ids = HashSet::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_str().is_some_and(|n| CPU_DIR.is_match(n)) {
            continue;
        }
        let path = entry.path().join("topology/core_id");
        match fs::read_to_string(&path) {
            Ok(s) => match s.trim().parse::<i64>() {
                Ok(id) => {
                    core_ids.insert(id);
                }
                Err(e) => warn!("Invalid core_id in {}: {}", path.display(), e),
            },
            Err(e) => debug!("Failed to read {}: {}", path.display(), e),
        }
    }
    core_ids.len()
}

/// Sums `cpu cores` per distinct `physical id` across blank-line separated
/// cpuinfo sections. A package repeated with different core counts keeps
/// the last one seen. A final section still counts when no blank line
/// follows it.
fn sum_cores_per_package(data: &[u8]) -> usize {
    let mut mapping: HashMap<u64, usize> = HashMap::new();
    let mut physical_id: Option<u64> = None;
    let mut cpu_cores: Option<usize> = None;

    let mut commit = |pid: &mut Option<u64>, cores: &mut Option<usize>| {
        if let (Some(p), Some(c)) = (*pid, *cores) {
            mapping.insert(p, c);
        }
        *pid = None;
        *cores = None;
    };

    for raw in data.split(|&b| b == b'\n') {
        let line = String::from_utf8_lossy(raw).trim().to_ascii_lowercase();
        if line.is_empty() {
            commit(&mut physical_id, &mut cpu_cores);
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => physical_id = value.trim().parse().ok(),
            "cpu cores" => cpu_cores = value.trim().parse().ok(),
            _ => {}
        }
    }
    commit(&mut physical_id, &mut cpu_cores);

    mapping.values().sum()
}

// ---------------------------------------------------------------------------
// CPU statistics and times
// ---------------------------------------------------------------------------

/// System-wide scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuStats {
    pub ctx_switches: u64,
    pub interrupts: u64,
    pub soft_interrupts: u64,
    /// Not exposed by procfs; always 0.
    pub syscalls: u64,
}

/// Context switches, interrupts and soft interrupts from `<root>/stat`.
pub fn cpu_stats_in(procfs: &Path) -> Result<CpuStats> {
    let path = procfs.join("stat");
    let content = fs::read_to_string(&path)?;

    let mut ctx_switches: Option<u64> = None;
    let mut interrupts: Option<u64> = None;
    let mut soft_interrupts: Option<u64> = None;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let slot = match parts.next() {
            Some("ctxt") => &mut ctx_switches,
            Some("intr") => &mut interrupts,
            Some("softirq") => &mut soft_interrupts,
            _ => continue,
        };
        *slot = parts.next().and_then(|v| v.parse().ok());

        if ctx_switches.is_some() && interrupts.is_some() && soft_interrupts.is_some() {
            break;
        }
    }

    let missing = |what: &str| ProcfsError::data_not_found(what, &path);
    Ok(CpuStats {
        ctx_switches: ctx_switches.ok_or_else(|| missing("line 'ctxt'"))?,
        interrupts: interrupts.ok_or_else(|| missing("line 'intr'"))?,
        soft_interrupts: soft_interrupts.ok_or_else(|| missing("line 'softirq'"))?,
        syscalls: 0,
    })
}

pub fn cpu_stats() -> Result<CpuStats> {
    cpu_stats_in(&config::global().procfs_path)
}

/// System CPU times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SystemCpuTimes {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    pub guest: f64,
    pub guest_nice: f64,
}

impl SystemCpuTimes {
    /// Parses the tick columns following the `cpu`/`cpuN` label. Columns
    /// older kernels do not report are left at zero.
    fn from_ticks(columns: &[&str], clk_tck: f64) -> Result<Self> {
        let mut secs = [0f64; 10];
        for (slot, raw) in secs.iter_mut().zip(columns) {
            let ticks: u64 = raw
                .parse()
                .map_err(|_| ProcfsError::parse("cpu line", format!("bad tick value {raw:?}")))?;
            *slot = ticks as f64 / clk_tck;
        }
        let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] = secs;
        Ok(SystemCpuTimes {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        })
    }
}

fn read_cpu_lines(procfs: &Path) -> Result<Vec<(String, SystemCpuTimes)>> {
    let content = fs::read_to_string(procfs.join("stat"))?;
    let mut out = Vec::new();
    for line in content.lines().filter(|l| l.starts_with("cpu")) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            continue;
        }
        out.push((
            parts[0].to_string(),
            SystemCpuTimes::from_ticks(&parts[1..], *CLK_TCK)?,
        ));
    }
    Ok(out)
}

/// Aggregate CPU times from the `cpu` line of `<root>/stat`.
pub fn cpu_times_in(procfs: &Path) -> Result<SystemCpuTimes> {
    read_cpu_lines(procfs)?
        .into_iter()
        .find(|(name, _)| name == "cpu")
        .map(|(_, t)| t)
        .ok_or_else(|| ProcfsError::data_not_found("line 'cpu'", procfs.join("stat")))
}

/// Per-CPU times from the `cpuN` lines of `<root>/stat`, in file order.
pub fn per_cpu_times_in(procfs: &Path) -> Result<Vec<SystemCpuTimes>> {
    Ok(read_cpu_lines(procfs)?
        .into_iter()
        .filter(|(name, _)| PER_CPU_LINE.is_match(name))
        .map(|(_, t)| t)
        .collect())
}

pub fn cpu_times() -> Result<SystemCpuTimes> {
    cpu_times_in(&config::global().procfs_path)
}

pub fn per_cpu_times() -> Result<Vec<SystemCpuTimes>> {
    per_cpu_times_in(&config::global().procfs_path)
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// System memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
    pub used: u64,
    pub free: u64,
    pub buffers: u64,
    pub cached: u64,
}

/// Reads `<root>/meminfo`. `MemAvailable` is estimated from free, buffers
/// and cached memory on kernels older than 3.14.
pub fn virtual_memory_in(procfs: &Path) -> Result<VirtualMemory> {
    let path = procfs.join("meminfo");
    let content = fs::read_to_string(&path)?;

    let mut fields: HashMap<&str, u64> = HashMap::new();
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if let Ok(kb) = value.parse::<u64>() {
                fields.insert(key.trim_end_matches(':'), kb * 1024);
            }
        }
    }

    let total = *fields
        .get("MemTotal")
        .ok_or_else(|| ProcfsError::data_not_found("line 'MemTotal'", &path))?;
    let free = *fields
        .get("MemFree")
        .ok_or_else(|| ProcfsError::data_not_found("line 'MemFree'", &path))?;
    let buffers = fields.get("Buffers").copied().unwrap_or(0);
    let cached = fields.get("Cached").copied().unwrap_or(0);
    let available = fields
        .get("MemAvailable")
        .copied()
        .unwrap_or(free + buffers + cached)
        .min(total);

    let used = total.saturating_sub(free + buffers + cached);
    let percent = if total > 0 {
        ((total - available) as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(VirtualMemory {
        total,
        available,
        percent,
        used,
        free,
        buffers,
        cached,
    })
}

pub fn virtual_memory() -> Result<VirtualMemory> {
    virtual_memory_in(&config::global().procfs_path)
}

// ---------------------------------------------------------------------------
// Process ids
// ---------------------------------------------------------------------------

/// Numeric entries of the procfs root, ascending.
pub fn pids_in(procfs: &Path) -> Result<Vec<u32>> {
    let mut pids: Vec<u32> = fs::read_dir(procfs)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            let name = name.to_str()?;
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            name.parse().ok()
        })
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

pub fn pids() -> Result<Vec<u32>> {
    pids_in(&config::global().procfs_path)
}

/// `kill(pid, 0)` liveness check. EPERM means the process exists but
/// belongs to someone else.
pub fn posix_pid_exists(pid: u32) -> bool {
    if pid == 0 {
        // pid 0 addresses the caller's process group for kill(2); by
        // convention it is reported as existing.
        return true;
    }
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            warn!("kill({}, 0) failed unexpectedly: {}", pid, e);
            false
        }
    }
}

/// Whether `pid` is a live process (not a thread) according to `source`.
///
/// Linux accepts thread ids wherever it accepts pids, and `<root>/<tid>`
/// resolves even though the root listing only shows thread group leaders.
/// The `Tgid` of the status file tells the two apart; when it cannot be
/// read, membership in the root listing decides.
pub fn pid_exists_with<S: ProcSource + ?Sized>(source: &S, pid: u32) -> bool {
    if !posix_pid_exists(pid) {
        return false;
    }

    let tgid = source
        .read_pid_file(pid, "status")
        .map_err(ProcfsError::from)
        .and_then(|data| parse_tgid(&data));
    match tgid {
        Ok(tgid) => tgid == pid,
        Err(e) => {
            debug!("Tgid check for pid {} failed ({}), scanning pids", pid, e);
            pids_in(source.root())
                .map(|all| all.binary_search(&pid).is_ok())
                .unwrap_or(false)
        }
    }
}

pub fn pid_exists_in(procfs: &Path, pid: u32) -> bool {
    pid_exists_with(&Procfs::new(procfs), pid)
}

pub fn pid_exists(pid: u32) -> bool {
    pid_exists_in(&config::global().procfs_path, pid)
}

/// Everything above in one serialisable value.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSummary {
    pub boot_time: f64,
    pub cpu_count_logical: Option<usize>,
    pub cpu_count_physical: Option<usize>,
    pub cpu_stats: CpuStats,
    pub cpu_times: SystemCpuTimes,
    pub virtual_memory: VirtualMemory,
    pub process_count: usize,
}

/// Collects a [`SystemSummary`] for the roots in `cfg`.
pub fn summary(cfg: &Config) -> Result<SystemSummary> {
    let procfs = Procfs::from_config(cfg);
    let cpu_count_logical = online_cpus().or_else(|| cpu_count_logical_in(&cfg.procfs_path));
    Ok(SystemSummary {
        boot_time: boot_time_with(&procfs)?,
        cpu_count_logical,
        cpu_count_physical: cpu_count_physical_in(&cfg.procfs_path, &cfg.sysfs_path),
        cpu_stats: cpu_stats_in(&cfg.procfs_path)?,
        cpu_times: cpu_times_in(&cfg.procfs_path)?,
        virtual_memory: virtual_memory_in(&cfg.procfs_path)?,
        process_count: pids_in(&cfg.procfs_path)?.len(),
    })
}

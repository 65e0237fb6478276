//! Process facade.
//!
//! A [`ProcessHandle`] owns a pid and resolves attributes on demand from
//! the kernel files under `<root>/<pid>`. Nothing is read at construction
//! and no file stays open between calls. Every accessor funnels OS failures
//! through one translation point, and the stat/status reads go through the
//! handle's [`BatchCache`].
//!
//! ```no_run
//! use herakles_procfs::ProcessHandle;
//!
//! let p = ProcessHandle::new(1);
//! let _batch = p.oneshot();
//! println!("{} {:?}", p.name()?, p.cpu_times()?);
//! # Ok::<(), herakles_procfs::ProcfsError>(())
//! ```

use crate::error::{classify_errno, ErrnoClass, ErrorContext, ProcfsError, Result};
use crate::process::cache::BatchCache;
use crate::process::cmdline::parse_cmdline;
use crate::process::cpu::CpuTimes;
use crate::process::memory::{parse_statm, MemoryInfo};
use crate::process::source::{resolve_link, ProcSource, Procfs};
use crate::process::stat::{parse_stat, StatRecord};
use crate::process::status::{
    parse_ctx_switches, parse_gids, parse_num_threads, parse_uids, CtxSwitches, Ids, ProcStatus,
};
use crate::sysconf::{CLK_TCK, PAGE_SIZE};
use crate::system::{boot_time_cache, pid_exists_with, BootTimeCache};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Handle on one process id.
///
/// Not `Sync`: the name/ppid caches and the batch cache are mutated in
/// place. Give each thread its own handle.
#[derive(Debug)]
pub struct ProcessHandle<S: ProcSource = Procfs> {
    pid: u32,
    source: S,
    name: RefCell<Option<String>>,
    ppid: Cell<Option<u32>>,
    cache: BatchCache,
}

impl ProcessHandle<Procfs> {
    /// Handle reading from the configured procfs root. The pid is not
    /// checked for existence.
    pub fn new(pid: u32) -> Self {
        Self::with_source(pid, Procfs::default())
    }
}

impl<S: ProcSource> ProcessHandle<S> {
    pub fn with_source(pid: u32, source: S) -> Self {
        ProcessHandle {
            pid,
            source,
            name: RefCell::new(None),
            ppid: Cell::new(None),
            cache: BatchCache::new(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &BatchCache {
        &self.cache
    }

    // -- error translation --------------------------------------------------

    fn context(&self) -> ErrorContext {
        ErrorContext {
            pid: self.pid,
            name: self.name.borrow().clone(),
            ppid: self.ppid.get(),
        }
    }

    /// Runs `op`, mapping raw OS failures to semantic errors. The context
    /// is taken after `op` so that a name learned during it is reported.
    fn wrap<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        match op() {
            Err(ProcfsError::Io(err)) => Err(self
                .context()
                .translate(err, || self.source.pid_dir_exists(self.pid))),
            other => other,
        }
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.source.read_pid_file(self.pid, name)?)
    }

    fn stat_record(&self) -> Result<StatRecord> {
        let rec = self.wrap(|| {
            self.cache
                .stat_record(|| parse_stat(&self.read_file("stat")?))
        })?;
        *self.name.borrow_mut() = Some(rec.name_lossy());
        self.ppid.set(Some(rec.ppid));
        Ok(rec)
    }

    fn status_bytes(&self) -> Result<Vec<u8>> {
        self.wrap(|| self.cache.status_bytes(|| self.read_file("status")))
    }

    /// Reads the `exe`/`cwd` link. A link that cannot be found is empty
    /// while the process directory is still listed; otherwise the process
    /// is gone, or a zombie if it still answers the liveness check.
    fn read_link(&self, name: &str) -> Result<PathBuf> {
        match resolve_link(&self.source, self.pid, name) {
            Ok(path) => Ok(path),
            Err(err) => match classify_errno(&err) {
                ErrnoClass::NotFound | ErrnoClass::NoSuchProcess => self.missing_link(name, err),
                _ => Err(self
                    .context()
                    .translate(err, || self.source.pid_dir_exists(self.pid))),
            },
        }
    }

    fn missing_link(&self, name: &str, err: io::Error) -> Result<PathBuf> {
        if self.source.pid_dir_exists(self.pid) {
            debug!(pid = self.pid, "{} link unavailable ({}), returning empty path", name, err);
            return Ok(PathBuf::new());
        }
        if pid_exists_with(&self.source, self.pid) {
            Err(self.context().zombie())
        } else {
            Err(self.context().no_such_process())
        }
    }

    // -- batch scope --------------------------------------------------------

    /// Starts caching stat/status reads until [`oneshot_exit`](Self::oneshot_exit).
    pub fn oneshot_enter(&self) {
        self.cache.activate();
    }

    /// Stops caching and discards everything cached.
    pub fn oneshot_exit(&self) {
        self.cache.deactivate();
    }

    /// Scoped batch: caching is active until the returned guard drops.
    /// Nested guards leave the scope to the outermost one.
    pub fn oneshot(&self) -> Oneshot<'_, S> {
        let owner = !self.cache.is_active();
        self.cache.activate();
        Oneshot {
            handle: self,
            owner,
        }
    }

    // -- stat-backed accessors ----------------------------------------------

    pub fn name(&self) -> Result<String> {
        Ok(self.stat_record()?.name_lossy())
    }

    pub fn ppid(&self) -> Result<u32> {
        Ok(self.stat_record()?.ppid)
    }

    pub fn status(&self) -> Result<ProcStatus> {
        Ok(ProcStatus::from_code(self.stat_record()?.status))
    }

    /// Controlling terminal device number, `None` without a terminal.
    pub fn terminal_nr(&self) -> Result<Option<i64>> {
        let tty = self.stat_record()?.tty_nr;
        Ok((tty != 0).then_some(tty))
    }

    /// CPU the process last ran on.
    pub fn cpu_num(&self) -> Result<i32> {
        Ok(self.stat_record()?.cpu_num)
    }

    pub fn cpu_times(&self) -> Result<CpuTimes> {
        Ok(CpuTimes::from(&self.stat_record()?))
    }

    /// Start time in seconds since the epoch.
    pub fn create_time(&self) -> Result<f64> {
        self.create_time_with(boot_time_cache())
    }

    /// Like [`create_time`](Self::create_time), with boot time taken from
    /// `boot` instead of the process-wide cache.
    pub fn create_time_with(&self, boot: &BootTimeCache) -> Result<f64> {
        let ticks = self.stat_record()?.start_time;
        let boot = boot.get_or_compute(&self.source)?;
        Ok(ticks as f64 / *CLK_TCK + boot)
    }

    // -- status-backed accessors --------------------------------------------

    pub fn uids(&self) -> Result<Ids> {
        parse_uids(&self.status_bytes()?)
    }

    pub fn gids(&self) -> Result<Ids> {
        parse_gids(&self.status_bytes()?)
    }

    pub fn num_threads(&self) -> Result<u32> {
        parse_num_threads(&self.status_bytes()?)
    }

    pub fn num_ctx_switches(&self) -> Result<CtxSwitches> {
        parse_ctx_switches(&self.status_bytes()?)
    }

    // -- uncached accessors -------------------------------------------------

    pub fn exe(&self) -> Result<PathBuf> {
        self.read_link("exe")
    }

    pub fn cwd(&self) -> Result<PathBuf> {
        self.read_link("cwd")
    }

    pub fn cmdline(&self) -> Result<Vec<String>> {
        self.wrap(|| Ok(parse_cmdline(&self.read_file("cmdline")?)))
    }

    pub fn memory_info(&self) -> Result<MemoryInfo> {
        self.wrap(|| parse_statm(&self.read_file("statm")?, *PAGE_SIZE))
    }

    pub fn nice_get(&self) -> Result<i32> {
        self.wrap(|| Ok(self.source.get_priority(self.pid)?))
    }

    pub fn nice_set(&self, value: i32) -> Result<()> {
        self.wrap(|| Ok(self.source.set_priority(self.pid, value)?))
    }

    /// Fails with a semantic error unless the process directory is present.
    pub fn assert_alive(&self) -> Result<()> {
        self.wrap(|| Ok(self.source.stat_pid_dir(self.pid)?))
    }

    /// Snapshot of the commonly used attributes, read in one batch.
    ///
    /// Attributes that are denied or unavailable for a zombie are left
    /// empty; a process that vanishes fails the whole snapshot.
    pub fn info(&self) -> Result<ProcessInfo> {
        let _batch = self.oneshot();
        Ok(ProcessInfo {
            pid: self.pid,
            ppid: self.ppid()?,
            name: self.name()?,
            status: self.status()?,
            create_time: self.create_time()?,
            cpu_times: self.cpu_times()?,
            terminal_nr: self.terminal_nr()?,
            cpu_num: self.cpu_num()?,
            exe: optional(self.exe())?,
            cwd: optional(self.cwd())?,
            cmdline: optional(self.cmdline())?,
            memory_info: optional(self.memory_info())?,
            nice: optional(self.nice_get())?,
            num_threads: optional(self.num_threads())?,
            uids: optional(self.uids())?,
            gids: optional(self.gids())?,
            num_ctx_switches: optional(self.num_ctx_switches())?,
        })
    }
}

fn optional<T>(res: Result<T>) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(ProcfsError::AccessDenied { .. } | ProcfsError::ZombieProcess { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Batch scope guard returned by [`ProcessHandle::oneshot`].
#[must_use = "the batch scope ends when the guard is dropped"]
pub struct Oneshot<'a, S: ProcSource> {
    handle: &'a ProcessHandle<S>,
    owner: bool,
}

impl<S: ProcSource> Drop for Oneshot<'_, S> {
    fn drop(&mut self) {
        if self.owner {
            self.handle.oneshot_exit();
        }
    }
}

/// Serialisable attribute snapshot of one process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub status: ProcStatus,
    pub create_time: f64,
    pub cpu_times: CpuTimes,
    pub terminal_nr: Option<i64>,
    pub cpu_num: i32,
    pub exe: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub cmdline: Option<Vec<String>>,
    pub memory_info: Option<MemoryInfo>,
    pub nice: Option<i32>,
    pub num_threads: Option<u32>,
    pub uids: Option<Ids>,
    pub gids: Option<Ids>,
    pub num_ctx_switches: Option<CtxSwitches>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap as HashMap;
    use nix::errno::Errno;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// A pid above the kernel's hard `pid_max` limit; never alive.
    const DEAD_PID: u32 = 4_194_305;

    /// Procfs stub counting reads per file, optionally denying some files,
    /// hiding the pid directory, or faking the priority syscall.
    struct StubSource {
        root: PathBuf,
        reads: RefCell<HashMap<String, usize>>,
        denied: Vec<&'static str>,
        hide_dir: bool,
        priority: std::result::Result<i32, Errno>,
        set_result: std::result::Result<(), Errno>,
        priority_set: Cell<Option<(u32, i32)>>,
    }

    impl StubSource {
        fn new(root: &Path) -> Self {
            StubSource {
                root: root.to_path_buf(),
                reads: RefCell::new(HashMap::new()),
                denied: Vec::new(),
                hide_dir: false,
                priority: Ok(5),
                set_result: Ok(()),
                priority_set: Cell::new(None),
            }
        }

        fn reads(&self, name: &str) -> usize {
            self.reads.borrow().get(name).copied().unwrap_or(0)
        }

        fn deny(&self, name: &str) -> Option<io::Error> {
            self.denied
                .contains(&name)
                .then(|| io::Error::from_raw_os_error(Errno::EACCES as i32))
        }
    }

    impl ProcSource for StubSource {
        fn root(&self) -> &Path {
            &self.root
        }

        fn read_pid_file(&self, pid: u32, name: &str) -> io::Result<Vec<u8>> {
            *self.reads.borrow_mut().entry(name.to_string()).or_default() += 1;
            if let Some(err) = self.deny(name) {
                return Err(err);
            }
            fs::read(self.pid_dir(pid).join(name))
        }

        fn read_pid_link(&self, pid: u32, name: &str) -> io::Result<PathBuf> {
            if let Some(err) = self.deny(name) {
                return Err(err);
            }
            fs::read_link(self.pid_dir(pid).join(name))
        }

        fn pid_dir_exists(&self, pid: u32) -> bool {
            !self.hide_dir && fs::symlink_metadata(self.pid_dir(pid)).is_ok()
        }

        fn get_priority(&self, _pid: u32) -> io::Result<i32> {
            self.priority
                .map_err(|e| io::Error::from_raw_os_error(e as i32))
        }

        fn set_priority(&self, pid: u32, value: i32) -> io::Result<()> {
            self.set_result
                .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
            self.priority_set.set(Some((pid, value)));
            Ok(())
        }
    }

    fn stat_line(pid: u32, name: &str, ppid: u32) -> String {
        format!(
            "{pid} ({name}) S {ppid} {pid} {pid} 34816 {pid} 4194304 100 0 0 0 \
             1000 500 20 10 20 0 1 0 12345 12345678 1234 18446744073709551615 \
             4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0\n"
        )
    }

    /// Fake procfs root holding one fully populated process directory.
    fn fake_tree(pid: u32, name: &str) -> TempDir {
        let dir = tempdir().expect("Failed to create temp dir");
        let pid_dir = dir.path().join(pid.to_string());
        fs::create_dir(&pid_dir).unwrap();
        fs::write(pid_dir.join("stat"), stat_line(pid, name, 1)).unwrap();
        fs::write(
            pid_dir.join("status"),
            format!(
                "Name:\t{name}\nTgid:\t{pid}\nPid:\t{pid}\nUid:\t0\t0\t0\t0\nGid:\t0\t0\t0\t0\n\
                 Threads:\t4\nvoluntary_ctxt_switches:\t10\nnonvoluntary_ctxt_switches:\t2\n"
            ),
        )
        .unwrap();
        fs::write(pid_dir.join("statm"), "100 50 10 5 0 20 0\n").unwrap();
        fs::write(pid_dir.join("cmdline"), b"ls\0-la\0\0").unwrap();
        fs::write(dir.path().join("stat"), "cpu 1 2 3 4\nbtime 1000\n").unwrap();
        dir
    }

    #[test]
    fn test_batch_collapses_stat_reads() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        p.oneshot_enter();
        assert_eq!(p.name().unwrap(), "worker");
        let times = p.cpu_times().unwrap();
        assert_eq!(times.user, 1000.0 / *CLK_TCK);
        assert_eq!(p.status().unwrap(), ProcStatus::Sleeping);
        assert_eq!(p.ppid().unwrap(), 1);
        assert_eq!(p.source().reads("stat"), 1);

        p.oneshot_exit();
        p.name().unwrap();
        assert_eq!(p.source().reads("stat"), 2);
        p.name().unwrap();
        assert_eq!(p.source().reads("stat"), 3);
    }

    #[test]
    fn test_batch_collapses_status_reads() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        let _batch = p.oneshot();
        assert_eq!(p.uids().unwrap().real, 0);
        assert_eq!(p.gids().unwrap().effective, 0);
        assert_eq!(p.num_threads().unwrap(), 4);
        assert_eq!(p.num_ctx_switches().unwrap().involuntary, 2);
        assert_eq!(p.source().reads("status"), 1);
    }

    #[test]
    fn test_uncached_sources_are_read_every_time() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        let _batch = p.oneshot();
        p.memory_info().unwrap();
        p.memory_info().unwrap();
        assert_eq!(p.source().reads("statm"), 2);
    }

    #[test]
    fn test_nested_oneshot_guards() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        let outer = p.oneshot();
        p.name().unwrap();
        {
            let _inner = p.oneshot();
            p.name().unwrap();
        }
        assert!(p.cache().is_active());
        p.name().unwrap();
        assert_eq!(p.source().reads("stat"), 1);

        drop(outer);
        assert!(!p.cache().is_active());
        assert!(p.cache().is_empty());
    }

    #[test]
    fn test_accessors_on_fake_tree() {
        let tree = fake_tree(1234, "my (weird) proc");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        assert_eq!(p.pid(), 1234);
        assert_eq!(p.name().unwrap(), "my (weird) proc");
        assert_eq!(p.terminal_nr().unwrap(), Some(34816));
        assert_eq!(p.cpu_num().unwrap(), 3);
        assert_eq!(p.cmdline().unwrap(), vec!["ls", "-la"]);
        assert_eq!(p.nice_get().unwrap(), 5);

        let mem = p.memory_info().unwrap();
        assert_eq!(mem.rss, 50 * *PAGE_SIZE);
        assert_eq!(mem.vms, 100 * *PAGE_SIZE);
    }

    #[test]
    fn test_create_time_adds_boot_time() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        let boot = BootTimeCache::new();
        let created = p.create_time_with(&boot).unwrap();
        assert_eq!(boot.get(), Some(1000.0));
        assert!((created - (12345.0 / *CLK_TCK + 1000.0)).abs() < 1e-6);
    }

    #[test]
    fn test_create_time_uses_process_wide_boot_time() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        // Whichever root was read first decides the shared value.
        let created = p.create_time().unwrap();
        let boot = boot_time_cache().get().unwrap();
        assert!((created - (12345.0 / *CLK_TCK + boot)).abs() < 1e-6);
    }

    #[test]
    fn test_vanished_process_is_no_such_process() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(DEAD_PID, StubSource::new(tree.path()));

        assert!(matches!(
            p.name(),
            Err(ProcfsError::NoSuchProcess { pid: DEAD_PID, .. })
        ));
        assert!(matches!(
            p.assert_alive(),
            Err(ProcfsError::NoSuchProcess { .. })
        ));
        assert!(matches!(p.exe(), Err(ProcfsError::NoSuchProcess { .. })));
        assert!(matches!(p.cwd(), Err(ProcfsError::NoSuchProcess { .. })));
    }

    #[test]
    fn test_missing_file_in_live_directory_passes_through() {
        let tree = fake_tree(1234, "worker");
        fs::remove_file(tree.path().join("1234/statm")).unwrap();
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        let err = p.memory_info().unwrap_err();
        assert_eq!(err.errno(), Some(Errno::ENOENT));
    }

    #[test]
    fn test_missing_links_in_live_directory_are_empty() {
        let tree = fake_tree(1234, "kthreadd");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        assert_eq!(p.exe().unwrap(), PathBuf::new());
        assert_eq!(p.cwd().unwrap(), PathBuf::new());
    }

    #[test]
    fn test_links_resolve() {
        let tree = fake_tree(1234, "worker");
        std::os::unix::fs::symlink(tree.path(), tree.path().join("1234/cwd")).unwrap();
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        assert_eq!(p.cwd().unwrap(), tree.path());
    }

    #[test]
    fn test_zombie_when_directory_hidden_but_pid_alive() {
        let me = std::process::id();
        let tree = fake_tree(me, "ghost");
        let mut src = StubSource::new(tree.path());
        src.hide_dir = true;
        let p = ProcessHandle::with_source(me, src);

        p.name().unwrap();
        match p.exe() {
            Err(ProcfsError::ZombieProcess { pid, name, ppid }) => {
                assert_eq!(pid, me);
                assert_eq!(name.as_deref(), Some("ghost"));
                assert_eq!(ppid, Some(1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_permission_errors_carry_cached_name() {
        let tree = fake_tree(1234, "sshd");
        let mut src = StubSource::new(tree.path());
        src.denied = vec!["statm", "exe"];
        let p = ProcessHandle::with_source(1234, src);

        p.name().unwrap();
        match p.memory_info() {
            Err(ProcfsError::AccessDenied { pid, name }) => {
                assert_eq!(pid, 1234);
                assert_eq!(name.as_deref(), Some("sshd"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(p.exe(), Err(ProcfsError::AccessDenied { .. })));
    }

    #[test]
    fn test_nice_set_reaches_priority_setter() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(1234, StubSource::new(tree.path()));

        p.nice_set(10).unwrap();
        assert_eq!(p.source().priority_set.get(), Some((1234, 10)));
    }

    #[test]
    fn test_nice_set_errors_are_translated() {
        let tree = fake_tree(1234, "worker");

        for errno in [Errno::EPERM, Errno::EACCES] {
            let mut src = StubSource::new(tree.path());
            src.set_result = Err(errno);
            let p = ProcessHandle::with_source(1234, src);
            assert!(matches!(
                p.nice_set(-5),
                Err(ProcfsError::AccessDenied { pid: 1234, .. })
            ));
            assert_eq!(p.source().priority_set.get(), None);
        }

        let mut src = StubSource::new(tree.path());
        src.set_result = Err(Errno::ESRCH);
        let p = ProcessHandle::with_source(1234, src);
        assert!(matches!(
            p.nice_set(0),
            Err(ProcfsError::NoSuchProcess { pid: 1234, .. })
        ));
    }

    #[test]
    fn test_priority_errors_are_translated() {
        let tree = fake_tree(1234, "worker");

        let mut src = StubSource::new(tree.path());
        src.priority = Err(Errno::EPERM);
        let p = ProcessHandle::with_source(1234, src);
        assert!(matches!(p.nice_get(), Err(ProcfsError::AccessDenied { .. })));

        let mut src = StubSource::new(tree.path());
        src.priority = Err(Errno::ESRCH);
        let p = ProcessHandle::with_source(1234, src);
        assert!(matches!(p.nice_get(), Err(ProcfsError::NoSuchProcess { .. })));
    }

    #[test]
    fn test_info_skips_denied_attributes() {
        let tree = fake_tree(1234, "worker");
        let mut src = StubSource::new(tree.path());
        src.denied = vec!["exe", "cwd", "statm"];
        let p = ProcessHandle::with_source(1234, src);

        let info = p.info().unwrap();
        assert_eq!(info.name, "worker");
        assert_eq!(info.ppid, 1);
        assert!(info.exe.is_none());
        assert!(info.memory_info.is_none());
        assert_eq!(info.num_threads, Some(4));
        assert_eq!(p.source().reads("stat"), 1);
        assert_eq!(p.source().reads("status"), 1);
        assert!(!p.cache().is_active());
    }

    #[test]
    fn test_info_fails_for_vanished_process() {
        let tree = fake_tree(1234, "worker");
        let p = ProcessHandle::with_source(DEAD_PID, StubSource::new(tree.path()));
        assert!(matches!(p.info(), Err(ProcfsError::NoSuchProcess { .. })));
    }
}

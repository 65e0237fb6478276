//! Raw access to kernel pseudo-files.
//!
//! [`ProcSource`] is the seam between the process facade and the kernel:
//! every read of `/proc/<pid>/...` and of system-wide procfs files goes
//! through it. [`Procfs`] is the live implementation; tests substitute
//! stubs to count or fake reads.

use crate::config::Config;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

/// Suffix the kernel appends to links whose target was unlinked.
const DELETED_SUFFIX: &[u8] = b" (deleted)";

/// Abstraction over procfs data sources.
///
/// Every method opens, reads fully and closes within the call; nothing is
/// retried and OS failures propagate unmodified.
pub trait ProcSource {
    /// Mount point used as prefix for every path.
    fn root(&self) -> &Path;

    /// `<root>/<pid>`.
    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root().join(pid.to_string())
    }

    /// Full raw content of `<root>/<pid>/<name>`.
    fn read_pid_file(&self, pid: u32, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.pid_dir(pid).join(name))
    }

    /// Unprocessed target of the `<root>/<pid>/<name>` symlink.
    fn read_pid_link(&self, pid: u32, name: &str) -> io::Result<PathBuf> {
        fs::read_link(self.pid_dir(pid).join(name))
    }

    /// Whether `<root>/<pid>` exists, without following symlinks.
    fn pid_dir_exists(&self, pid: u32) -> bool {
        fs::symlink_metadata(self.pid_dir(pid)).is_ok()
    }

    /// `stat(2)` on the process directory.
    fn stat_pid_dir(&self, pid: u32) -> io::Result<()> {
        fs::metadata(self.pid_dir(pid)).map(|_| ())
    }

    /// Full raw content of a system-wide file such as `<root>/stat`.
    fn read_system_file(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root().join(name))
    }

    /// Scheduling priority (nice value) of `pid`.
    fn get_priority(&self, pid: u32) -> io::Result<i32> {
        posix_getpriority(pid)
    }

    /// Sets the scheduling priority (nice value) of `pid`.
    fn set_priority(&self, pid: u32, value: i32) -> io::Result<()> {
        posix_setpriority(pid, value)
    }
}

/// Live procfs backend.
#[derive(Debug, Clone)]
pub struct Procfs {
    root: PathBuf,
}

impl Procfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Procfs { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Procfs::new(config.procfs_path.clone())
    }
}

impl Default for Procfs {
    /// Uses the process-wide configured procfs root.
    fn default() -> Self {
        Procfs::from_config(crate::config::global())
    }
}

impl ProcSource for Procfs {
    fn root(&self) -> &Path {
        &self.root
    }
}

/// Existence check that follows symlinks and treats any error as absence.
pub fn path_exists_strict(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Cleans a raw link target read from procfs.
///
/// Everything after the first NUL byte is garbage and dropped. A trailing
/// `" (deleted)"` is stripped when the path without it still exists, since
/// the kernel sometimes marks live targets as deleted.
pub fn clean_link_target(raw: PathBuf) -> PathBuf {
    let mut bytes = raw.into_os_string().into_vec();
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }

    if bytes.ends_with(DELETED_SUFFIX) {
        let stripped_len = bytes.len() - DELETED_SUFFIX.len();
        let stripped = Path::new(std::ffi::OsStr::from_bytes(&bytes[..stripped_len]));
        if path_exists_strict(stripped) {
            bytes.truncate(stripped_len);
        }
    }

    PathBuf::from(OsString::from_vec(bytes))
}

/// Reads and cleans `<root>/<pid>/<name>`.
pub fn resolve_link<S: ProcSource + ?Sized>(source: &S, pid: u32, name: &str) -> io::Result<PathBuf> {
    source.read_pid_link(pid, name).map(clean_link_target)
}

fn posix_getpriority(pid: u32) -> io::Result<i32> {
    // -1 is a legitimate priority, so errno has to be cleared and checked.
    nix::errno::Errno::clear();
    // SAFETY: getpriority only reads scheduler state for the given id.
    let prio = unsafe { libc::getpriority(libc::PRIO_PROCESS, pid as libc::id_t) };
    if prio == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error().unwrap_or(0) != 0 {
            return Err(err);
        }
    }
    Ok(prio)
}

fn posix_setpriority(pid: u32, value: i32) -> io::Result<()> {
    // SAFETY: setpriority takes plain integers and reports failure via errno.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, value) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

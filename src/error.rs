//! Error types for procfs-backed process and system queries.
//!
//! Process-scoped operations fail with a small, closed set of semantic
//! errors ([`ProcfsError::NoSuchProcess`], [`ProcfsError::ZombieProcess`],
//! [`ProcfsError::AccessDenied`]). Anything the translation layer cannot
//! positively classify is passed through untouched as [`ProcfsError::Io`].

use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::trace;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProcfsError>;

/// Main error type for procfs operations.
#[derive(Error, Debug)]
pub enum ProcfsError {
    /// The pid no longer resolves to a live process.
    ///
    /// Raised when a read fails and the process directory is confirmed
    /// gone, or when the pid turns out to be a thread id.
    #[error("process no longer exists (pid={pid}{})", fmt_name(.name))]
    NoSuchProcess { pid: u32, name: Option<String> },

    /// The process has exited but has not been reaped by its parent.
    #[error("process still exists but it's a zombie (pid={pid}{}{})", fmt_name(.name), fmt_ppid(.ppid))]
    ZombieProcess {
        pid: u32,
        name: Option<String>,
        ppid: Option<u32>,
    },

    /// Permission failure reading the process's kernel files.
    #[error("access denied (pid={pid}{})", fmt_name(.name))]
    AccessDenied { pid: u32, name: Option<String> },

    /// Unclassified OS failure, re-raised unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A marker line that must be present in a system file is missing.
    #[error("{what} not found in {}", .path.display())]
    DataNotFound { what: String, path: PathBuf },

    /// A kernel record did not match its expected layout.
    #[error("malformed {what}: {detail}")]
    Parse { what: String, detail: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn fmt_name(name: &Option<String>) -> String {
    match name {
        Some(n) => format!(", name='{n}'"),
        None => String::new(),
    }
}

fn fmt_ppid(ppid: &Option<u32>) -> String {
    match ppid {
        Some(p) => format!(", ppid={p}"),
        None => String::new(),
    }
}

impl ProcfsError {
    pub(crate) fn parse(what: &str, detail: impl Into<String>) -> Self {
        ProcfsError::Parse {
            what: what.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn data_not_found(what: &str, path: impl Into<PathBuf>) -> Self {
        ProcfsError::DataNotFound {
            what: what.to_string(),
            path: path.into(),
        }
    }

    /// The raw errno behind an unclassified OS failure, if any.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            ProcfsError::Io(e) => e.raw_os_error().map(Errno::from_raw),
            _ => None,
        }
    }

    /// True for the three process-lifecycle variants.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            ProcfsError::NoSuchProcess { .. }
                | ProcfsError::ZombieProcess { .. }
                | ProcfsError::AccessDenied { .. }
        )
    }
}

/// Classification of a raw OS failure, before any existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrnoClass {
    PermissionDenied,
    NoSuchProcess,
    NotFound,
    Other,
}

/// Sorts an I/O error into one of the classes the translator acts on.
pub fn classify_errno(err: &io::Error) -> ErrnoClass {
    match err.raw_os_error().map(Errno::from_raw) {
        Some(Errno::EPERM) | Some(Errno::EACCES) => ErrnoClass::PermissionDenied,
        Some(Errno::ESRCH) => ErrnoClass::NoSuchProcess,
        Some(Errno::ENOENT) => ErrnoClass::NotFound,
        _ => ErrnoClass::Other,
    }
}

/// Identity of the process an operation ran against, used to build
/// semantic errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub pid: u32,
    pub name: Option<String>,
    pub ppid: Option<u32>,
}

impl ErrorContext {
    pub fn no_such_process(&self) -> ProcfsError {
        ProcfsError::NoSuchProcess {
            pid: self.pid,
            name: self.name.clone(),
        }
    }

    pub fn zombie(&self) -> ProcfsError {
        ProcfsError::ZombieProcess {
            pid: self.pid,
            name: self.name.clone(),
            ppid: self.ppid,
        }
    }

    pub fn access_denied(&self) -> ProcfsError {
        ProcfsError::AccessDenied {
            pid: self.pid,
            name: self.name.clone(),
        }
    }

    /// Maps an OS error raised while operating on this process.
    ///
    /// `dir_exists` is consulted only for ENOENT: a missing file under a
    /// still-present process directory is not evidence that the process
    /// is gone, so that case is re-raised unmodified.
    pub fn translate<F>(&self, err: io::Error, dir_exists: F) -> ProcfsError
    where
        F: FnOnce() -> bool,
    {
        let class = classify_errno(&err);
        trace!(pid = self.pid, ?class, "translating os error: {}", err);
        match class {
            ErrnoClass::PermissionDenied => self.access_denied(),
            ErrnoClass::NoSuchProcess => self.no_such_process(),
            ErrnoClass::NotFound if !dir_exists() => self.no_such_process(),
            _ => ProcfsError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ErrorContext {
        ErrorContext {
            pid: 42,
            name: Some("sshd".into()),
            ppid: Some(1),
        }
    }

    fn os(errno: Errno) -> io::Error {
        io::Error::from_raw_os_error(errno as i32)
    }

    #[test]
    fn test_permission_errors_become_access_denied() {
        for errno in [Errno::EPERM, Errno::EACCES] {
            let err = ctx().translate(os(errno), || true);
            match err {
                ProcfsError::AccessDenied { pid, name } => {
                    assert_eq!(pid, 42);
                    assert_eq!(name.as_deref(), Some("sshd"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_esrch_is_no_such_process_without_existence_check() {
        let err = ctx().translate(os(Errno::ESRCH), || panic!("must not be consulted"));
        assert!(matches!(err, ProcfsError::NoSuchProcess { pid: 42, .. }));
    }

    #[test]
    fn test_enoent_depends_on_process_directory() {
        let gone = ctx().translate(os(Errno::ENOENT), || false);
        assert!(matches!(gone, ProcfsError::NoSuchProcess { .. }));

        let still_there = ctx().translate(os(Errno::ENOENT), || true);
        assert_eq!(still_there.errno(), Some(Errno::ENOENT));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = ctx().translate(os(Errno::EINVAL), || false);
        assert_eq!(err.errno(), Some(Errno::EINVAL));
        assert!(!err.is_lifecycle());
    }

    #[test]
    fn test_display_carries_identity() {
        let msg = ctx().zombie().to_string();
        assert!(msg.contains("pid=42"));
        assert!(msg.contains("name='sshd'"));
        assert!(msg.contains("ppid=1"));
    }
}

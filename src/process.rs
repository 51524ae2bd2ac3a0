//! OS process table lookups
//!
//! Resolves the owning user of a GPU process from procfs and the system
//! user database (NSS, so LDAP and sssd accounts resolve too).

use crate::error::ProcessError;

use nix::unistd::{Uid, User};
use procfs::process::Process;
use std::path::PathBuf;

/// Source of process ownership information
pub trait ProcessTable {
    /// Username owning the process `pid`
    fn username(&self, pid: u32) -> Result<String, ProcessError>;
}

/// Process table backed by procfs and the system user database
#[derive(Debug, Clone)]
pub struct ProcFs {
    proc_root: PathBuf,
}

impl ProcFs {
    /// Use the live `/proc`
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Use an alternative procfs mount
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Uid owning the process entry
    pub fn uid(&self, pid: u32) -> Result<u32, ProcessError> {
        let root = self.proc_root.join(pid.to_string());
        Process::new_with_root(root)
            .and_then(|process| process.uid())
            .map_err(|source| ProcessError::Unreadable { pid, source })
    }

    /// Login name for a uid
    pub fn user_name(&self, uid: u32) -> Result<String, ProcessError> {
        User::from_uid(Uid::from_raw(uid))
            .map_err(ProcessError::UserDatabase)?
            .map(|user| user.name)
            .ok_or(ProcessError::UnknownUid(uid))
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for ProcFs {
    fn username(&self, pid: u32) -> Result<String, ProcessError> {
        let uid = self.uid(pid)?;
        self.user_name(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn current_user() -> Option<String> {
        User::from_uid(nix::unistd::getuid())
            .ok()
            .flatten()
            .map(|user| user.name)
    }

    #[test]
    fn test_uid_is_owner_of_process_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("321")).unwrap();

        let table = ProcFs::with_proc_root(dir.path());
        assert_eq!(table.uid(321).unwrap(), nix::unistd::getuid().as_raw());
    }

    #[test]
    fn test_username_goes_through_user_database() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("321")).unwrap();

        let table = ProcFs::with_proc_root(dir.path());
        assert_eq!(table.username(321).ok(), current_user());
    }

    #[test]
    fn test_exited_process() {
        let dir = tempfile::tempdir().unwrap();
        let table = ProcFs::with_proc_root(dir.path());
        assert!(matches!(
            table.username(99999),
            Err(ProcessError::Unreadable { pid: 99999, .. })
        ));
    }

    #[test]
    fn test_unknown_uid() {
        assert!(matches!(
            ProcFs::new().user_name(4_000_000_000),
            Err(ProcessError::UnknownUid(4_000_000_000))
        ));
    }

    #[test]
    fn test_root_resolves() {
        assert_eq!(ProcFs::new().user_name(0).unwrap(), "root");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_live_self_lookup() {
        let pid = std::process::id();
        let table = ProcFs::new();
        assert_eq!(table.uid(pid).unwrap(), nix::unistd::getuid().as_raw());
        assert_eq!(table.username(pid).ok(), current_user());
    }
}

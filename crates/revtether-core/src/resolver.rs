// ── Resolver file handling ──
//
// The tether DNS servers are staged next to the session state, the live
// resolver is backed up if it is a regular file, and the host mutator
// then copies the staged file over the live one. A symbolic link
// (systemd-resolved, resolvconf) is never backed up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SessionPaths;
use crate::error::CoreError;
use crate::model::ResolverBackup;

/// What cleanup did with the resolver backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum RestoreOutcome {
    /// No backup on disk; the live file was left alone.
    NothingToRestore,
    Restored,
    /// Copy back failed. The backup was deleted anyway.
    Failed(String),
    /// Backup intentionally kept for a later `restore-dns`.
    Kept,
    /// A backup from an earlier run was already on disk. Neither it nor
    /// the live file was touched.
    Leftover,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverFiles {
    live: PathBuf,
    staging: PathBuf,
    backup: PathBuf,
}

impl ResolverFiles {
    pub fn new(live: PathBuf, staging: PathBuf, backup: PathBuf) -> Self {
        Self {
            live,
            staging,
            backup,
        }
    }

    pub fn from_paths(paths: &SessionPaths) -> Self {
        Self::new(
            paths.resolver.clone(),
            paths.staging_resolver(),
            paths.resolver_backup(),
        )
    }

    pub fn live(&self) -> &Path {
        &self.live
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn has_backup(&self) -> bool {
        self.backup.is_file()
    }

    /// Stage `contents` and back up the live file if it is a regular
    /// file. Returns the backup only when this call wrote it.
    ///
    /// An existing backup is never overwritten: on a retry the live file
    /// already holds our own servers, and the first backup is the one
    /// worth keeping.
    pub fn prepare(&self, contents: &str) -> Result<Option<ResolverBackup>, CoreError> {
        ensure_parent(&self.staging)?;
        fs::write(&self.staging, contents)?;
        debug!(path = %self.staging.display(), "staged resolver");

        if self.has_backup() {
            debug!(path = %self.backup.display(), "resolver backup already present, left as is");
            return Ok(None);
        }
        if !is_regular_file(&self.live) {
            debug!(path = %self.live.display(), "resolver missing or a symlink, not backing up");
            return Ok(None);
        }

        ensure_parent(&self.backup)?;
        fs::copy(&self.live, &self.backup)?;
        info!(
            original = %self.live.display(),
            backup = %self.backup.display(),
            "backed up resolver"
        );
        Ok(Some(ResolverBackup {
            original: self.live.clone(),
            path: self.backup.clone(),
        }))
    }

    /// Put the backup back over the live file, then delete it whether or
    /// not the copy worked.
    pub fn restore(&self) -> RestoreOutcome {
        if !self.has_backup() {
            return RestoreOutcome::NothingToRestore;
        }

        let outcome = match fs::copy(&self.backup, &self.live) {
            Ok(_) => {
                info!(path = %self.live.display(), "resolver restored from backup");
                RestoreOutcome::Restored
            }
            Err(e) => {
                warn!(error = %e, "failed to restore resolver backup");
                RestoreOutcome::Failed(e.to_string())
            }
        };

        if let Err(e) = fs::remove_file(&self.backup) {
            warn!(error = %e, path = %self.backup.display(), "failed to delete resolver backup");
        }
        outcome
    }

    pub fn remove_staging(&self) {
        remove_if_present(&self.staging);
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file())
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Delete a file, treating "already gone" as success and logging the rest.
pub(crate) fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "failed to remove"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "nameserver 192.168.1.1\nsearch lan\n";
    const TETHER: &str = "nameserver 8.8.8.8\n";

    fn files(dir: &Path) -> ResolverFiles {
        ResolverFiles::new(
            dir.join("resolv.conf"),
            dir.join("state/resolv.conf.staging"),
            dir.join("state/resolv.conf.backup"),
        )
    }

    /// What the host mutator does after `prepare`.
    fn install(files: &ResolverFiles, contents: &str) -> Option<ResolverBackup> {
        let backup = files.prepare(contents).unwrap();
        fs::copy(files.staging(), files.live()).unwrap();
        backup
    }

    #[test]
    fn regular_file_is_backed_up_and_restored_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        fs::write(files.live(), ORIGINAL).unwrap();

        let backup = install(&files, TETHER);
        assert!(backup.is_some());
        assert_eq!(fs::read_to_string(files.live()).unwrap(), TETHER);
        assert_eq!(fs::read_to_string(files.backup()).unwrap(), ORIGINAL);

        assert_eq!(files.restore(), RestoreOutcome::Restored);
        assert_eq!(fs::read_to_string(files.live()).unwrap(), ORIGINAL);
        assert!(!files.backup().exists());
    }

    #[test]
    fn missing_resolver_gets_no_backup_and_no_restore() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());

        assert!(install(&files, TETHER).is_none());
        assert!(!files.backup().exists());
        assert_eq!(files.restore(), RestoreOutcome::NothingToRestore);
        assert_eq!(fs::read_to_string(files.live()).unwrap(), TETHER);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_resolver_is_never_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        let target = dir.path().join("stub-resolv.conf");
        fs::write(&target, ORIGINAL).unwrap();
        std::os::unix::fs::symlink(&target, files.live()).unwrap();

        assert!(install(&files, TETHER).is_none());
        assert!(!files.backup().exists());
        assert_eq!(files.restore(), RestoreOutcome::NothingToRestore);
    }

    #[test]
    fn second_prepare_keeps_first_backup() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        fs::write(files.live(), ORIGINAL).unwrap();

        assert!(install(&files, TETHER).is_some());
        assert!(install(&files, TETHER).is_none());
        assert_eq!(fs::read_to_string(files.backup()).unwrap(), ORIGINAL);

        files.restore();
        assert_eq!(fs::read_to_string(files.live()).unwrap(), ORIGINAL);
    }

    #[test]
    fn failed_restore_still_deletes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let files = ResolverFiles::new(
            dir.path().join("no/such/dir/resolv.conf"),
            dir.path().join("staging"),
            dir.path().join("backup"),
        );
        fs::write(files.backup(), ORIGINAL).unwrap();

        assert!(matches!(files.restore(), RestoreOutcome::Failed(_)));
        assert!(!files.backup().exists());
    }

    #[test]
    fn remove_staging_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        files.remove_staging();
        files.prepare(TETHER).unwrap();
        assert!(files.staging().exists());
        files.remove_staging();
        files.remove_staging();
        assert!(!files.staging().exists());
    }
}

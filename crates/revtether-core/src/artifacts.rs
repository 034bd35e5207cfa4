// ── Transient session files ──
//
// Interface snapshots are written next to the staging resolver so a
// failed run can be inspected while it is still in progress. Cleanup
// removes all of them.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::SessionPaths;
use crate::model::InterfaceSnapshot;
use crate::resolver::remove_if_present;

#[derive(Debug)]
pub struct SessionArtifacts {
    paths: SessionPaths,
    written: Vec<PathBuf>,
}

impl SessionArtifacts {
    pub fn new(paths: SessionPaths) -> Self {
        Self {
            paths,
            written: Vec::new(),
        }
    }

    /// Persist a snapshot as `interfaces.<label>`. Failure only costs us
    /// the debugging aid, so it is logged and swallowed.
    pub fn record_snapshot(&mut self, label: &str, snapshot: &InterfaceSnapshot) {
        let path = self.paths.snapshot(label);
        let result = fs::create_dir_all(self.paths.state_dir())
            .and_then(|()| fs::write(&path, snapshot.to_lines()));
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "recorded interface snapshot");
                self.written.push(path);
            }
            Err(e) => warn!(error = %e, path = %path.display(), "could not record snapshot"),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Remove snapshots and the staging resolver, then the state
    /// directory if nothing else (a kept backup) lives there.
    pub fn remove_all(&mut self) {
        for path in self.written.drain(..) {
            remove_if_present(&path);
        }
        remove_if_present(&self.paths.staging_resolver());

        let dir = self.paths.state_dir();
        let empty = fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none());
        if empty {
            if let Err(e) = fs::remove_dir(dir) {
                debug!(error = %e, "state directory left in place");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_written_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths {
            resolver: dir.path().join("resolv.conf"),
            state_dir: dir.path().join("state"),
        };
        let mut artifacts = SessionArtifacts::new(paths.clone());

        artifacts.record_snapshot("before", &InterfaceSnapshot::new(["eth0"]));
        artifacts.record_snapshot("after", &InterfaceSnapshot::new(["eth0", "usb0"]));
        assert_eq!(
            fs::read_to_string(paths.snapshot("after")).unwrap(),
            "eth0\nusb0\n"
        );
        fs::write(paths.staging_resolver(), "nameserver 8.8.8.8\n").unwrap();

        artifacts.remove_all();
        assert!(artifacts.written().is_empty());
        assert!(!paths.state_dir.exists());
    }

    #[test]
    fn kept_backup_keeps_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths {
            resolver: dir.path().join("resolv.conf"),
            state_dir: dir.path().join("state"),
        };
        let mut artifacts = SessionArtifacts::new(paths.clone());
        artifacts.record_snapshot("before", &InterfaceSnapshot::new(["eth0"]));
        fs::write(paths.resolver_backup(), "nameserver 1.1.1.1\n").unwrap();

        artifacts.remove_all();
        assert!(paths.resolver_backup().exists());
        assert!(!paths.snapshot("before").exists());
    }
}

// ── Tethering activation ──
//
// The phone gives no acknowledgement that RNDIS is up. Activation is
// therefore "send the commands, wait, and look for a new interface":
// snapshot before, fire the commands, settle, snapshot after, classify.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::host::{CommandExecutor, NetworkInspector};
use crate::model::{Device, InterfaceSnapshot, Selection, select_candidate};

/// Evidence collected by one activation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub before: InterfaceSnapshot,
    pub after: InterfaceSnapshot,
    pub selection: Selection,
}

pub struct TetheringActivator {
    executor: Arc<dyn CommandExecutor>,
    inspector: Arc<dyn NetworkInspector>,
    settle: Duration,
    commands: Vec<String>,
}

impl TetheringActivator {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        inspector: Arc<dyn NetworkInspector>,
        settle: Duration,
        commands: Vec<String>,
    ) -> Self {
        Self {
            executor,
            inspector,
            settle,
            commands,
        }
    }

    /// Snapshot, remote commands, settle delay, second snapshot,
    /// classification. The device must already be authorized; nothing on
    /// the host is changed.
    pub async fn activate(&self, device: &Device) -> Result<Activation, CoreError> {
        let before = self.snapshot().await?;
        self.enable_tethering(device).await?;
        self.settle().await;
        self.detect(before).await
    }

    async fn snapshot(&self) -> Result<InterfaceSnapshot, CoreError> {
        let snapshot = self.inspector.list_interfaces().await?;
        debug!(interfaces = ?snapshot.names().collect::<Vec<_>>(), "interface snapshot");
        Ok(snapshot)
    }

    /// Fire the tethering commands. Exit status only tells us the command
    /// was delivered; the mode switch often drops the adb connection, so
    /// a non-zero exit is logged, not fatal.
    async fn enable_tethering(&self, device: &Device) -> Result<(), CoreError> {
        for command in &self.commands {
            let output = self.executor.run_shell(&device.id, command).await?;
            if output.success() {
                debug!(device = %device.id, command, "delivered");
            } else {
                warn!(
                    device = %device.id,
                    command,
                    exit_code = output.exit_code,
                    "remote command exited non-zero"
                );
            }
        }
        info!(device = %device.id, "tethering commands sent");
        Ok(())
    }

    /// Blocking wait for USB re-enumeration.
    async fn settle(&self) {
        debug!(secs = self.settle.as_secs_f32(), "waiting for interface to settle");
        tokio::time::sleep(self.settle).await;
    }

    async fn detect(&self, before: InterfaceSnapshot) -> Result<Activation, CoreError> {
        let after = self.snapshot().await?;
        let selection = select_candidate(&before, &after);
        match &selection {
            Selection::Selected(candidate) => {
                info!(
                    interface = %candidate.name,
                    kind = %candidate.kind,
                    "tether interface detected"
                );
            }
            Selection::Ambiguous(candidates) => {
                warn!(count = candidates.len(), "several candidate interfaces");
            }
            Selection::NotDetected => warn!("no candidate interface"),
        }
        Ok(Activation {
            before,
            after,
            selection,
        })
    }
}

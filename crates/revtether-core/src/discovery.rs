// ── Device discovery and authorization ──
//
// Exactly one phone may be attached. Zero is retried once after a
// blocking wait; more than one is reported and never auto-resolved.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::host::CommandExecutor;
use crate::model::Device;

/// Marker echoed back by the authorization probe.
const ECHO_MARKER: &str = "revtether-ok";

const MODEL_PROPERTY: &str = "ro.product.model";
const VERSION_PROPERTY: &str = "ro.build.version.release";

pub struct DeviceSessionManager {
    executor: Arc<dyn CommandExecutor>,
    auth_grace: Duration,
    wait_timeout: Option<Duration>,
}

impl DeviceSessionManager {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        auth_grace: Duration,
        wait_timeout: Option<Duration>,
    ) -> Self {
        Self {
            executor,
            auth_grace,
            wait_timeout,
        }
    }

    /// All devices the bridge reports, authorized or not.
    pub async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        self.executor.list_devices().await
    }

    /// [`list_devices`](Self::list_devices) with model and version filled
    /// in for every authorized device.
    pub async fn list_described(&self) -> Result<Vec<Device>, CoreError> {
        let mut described = Vec::new();
        for device in self.executor.list_devices().await? {
            described.push(self.enrich(device).await);
        }
        Ok(described)
    }

    /// Exactly one device, enriched with model and version when the
    /// shell is usable.
    pub async fn discover_device(&self) -> Result<Device, CoreError> {
        let mut devices = self.executor.list_devices().await?;
        debug!(count = devices.len(), "listed devices");

        match devices.len() {
            0 => Err(CoreError::NoDevice),
            1 => {
                let device = devices.remove(0);
                Ok(self.enrich(device).await)
            }
            _ => Err(CoreError::AmbiguousDevice {
                ids: devices.into_iter().map(|d| d.id).collect(),
            }),
        }
    }

    /// [`discover_device`](Self::discover_device), with one blocking wait
    /// and retry when nothing is attached. A second miss is final.
    pub async fn discover_with_wait(&self) -> Result<Device, CoreError> {
        match self.discover_device().await {
            Err(CoreError::NoDevice) => {
                info!("no device attached, waiting for one");
                self.wait_for_device().await?;
                self.discover_device().await
            }
            other => other,
        }
    }

    /// Delegate to the bridge's native wait, bounded by the configured
    /// timeout. Timing out is not an error; the retry will report it.
    pub async fn wait_for_device(&self) -> Result<(), CoreError> {
        let wait = self.executor.wait_for_device();
        match self.wait_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, wait).await.is_err() {
                    warn!(timeout_secs = limit.as_secs(), "gave up waiting for a device");
                }
                Ok(())
            }
            None => wait.await,
        }
    }

    /// Echo through the remote shell. On failure, give the operator the
    /// grace period to accept the RSA prompt on the phone and try once
    /// more.
    pub async fn verify_authorization(&self, device: &Device) -> Result<bool, CoreError> {
        if self.echo(device).await? {
            return Ok(true);
        }

        warn!(
            device = %device.id,
            grace_secs = self.auth_grace.as_secs(),
            "shell not usable yet, check the phone for an authorization prompt"
        );
        tokio::time::sleep(self.auth_grace).await;

        let authorized = self.echo(device).await?;
        if !authorized {
            warn!(device = %device.id, "device still unauthorized");
        }
        Ok(authorized)
    }

    async fn echo(&self, device: &Device) -> Result<bool, CoreError> {
        let output = self
            .executor
            .run_shell(&device.id, &format!("echo {ECHO_MARKER}"))
            .await?;
        Ok(output.success() && output.stdout.trim() == ECHO_MARKER)
    }

    async fn enrich(&self, mut device: Device) -> Device {
        if !device.is_authorized() {
            return device;
        }
        device.model = self.property(&device.id, MODEL_PROPERTY).await;
        device.version = self.property(&device.id, VERSION_PROPERTY).await;
        device
    }

    async fn property(&self, device_id: &str, name: &str) -> Option<String> {
        match self.executor.get_property(device_id, name).await {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_owned()),
            Ok(_) => None,
            Err(e) => {
                debug!(property = name, error = %e, "property lookup failed");
                None
            }
        }
    }
}

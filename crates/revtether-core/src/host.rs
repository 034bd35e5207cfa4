// ── Host collaborator capabilities ──
//
// The session never spawns processes or writes system files itself.
// Everything outside the process goes through these traits: the debug
// bridge, interface enumeration, host network mutation (a host-global
// resource, mutated without locking), throughput measurement and the
// operator. `revtether-host` provides the real implementations.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{
    Device, InterfaceAddress, InterfaceCandidate, InterfaceSnapshot, InterfaceState, LinkState,
    PingReport, PingRequest, RouteEntry, Throughput,
};

/// Exit status and captured stdout of a remote shell command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The debug-bridge command channel to the phone.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError>;

    /// Run `command` in the device shell. A non-zero remote exit is a
    /// normal `ShellOutput`, not an error.
    async fn run_shell(&self, device_id: &str, command: &str) -> Result<ShellOutput, CoreError>;

    /// Block until a device shows up.
    async fn wait_for_device(&self) -> Result<(), CoreError>;

    async fn get_property(&self, device_id: &str, name: &str) -> Result<String, CoreError>;
}

/// Read-only view of host networking.
#[async_trait]
pub trait NetworkInspector: Send + Sync {
    /// All interfaces except loopback.
    async fn list_interfaces(&self) -> Result<InterfaceSnapshot, CoreError>;

    /// `None` when the interface does not exist.
    async fn interface_state(&self, name: &str) -> Result<Option<InterfaceState>, CoreError>;

    async fn default_routes(&self) -> Result<Vec<RouteEntry>, CoreError>;

    async fn ping(&self, request: &PingRequest) -> Result<PingReport, CoreError>;

    /// Current value of a kernel tunable, `None` if the key is absent.
    async fn read_tunable(&self, key: &str) -> Result<Option<String>, CoreError>;

    /// Power-control attribute of the USB device backing `interface`.
    async fn usb_power_control(&self, interface: &str) -> Result<Option<PathBuf>, CoreError>;
}

/// Host-global network state changes.
#[async_trait]
pub trait NetworkMutator: Send + Sync {
    async fn set_link(&self, name: &str, state: LinkState) -> Result<(), CoreError>;

    /// Remove every address. No addresses is not an error.
    async fn flush_addresses(&self, name: &str) -> Result<(), CoreError>;

    /// Every failure is reported; callers treat it as fatal.
    async fn add_address(&self, name: &str, address: &InterfaceAddress) -> Result<(), CoreError>;

    /// Remove the default route through `name`. No such route is not an error.
    async fn remove_default_route(&self, name: &str) -> Result<(), CoreError>;

    /// Install a default route. An identical existing route is not an error.
    async fn add_default_route(&self, gateway: Ipv4Addr, name: &str) -> Result<(), CoreError>;

    async fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), CoreError>;

    async fn write_tunable(&self, key: &str, value: &str) -> Result<(), CoreError>;

    async fn write_usb_power(&self, path: &Path, value: &str) -> Result<(), CoreError>;

    /// Overwrite the live resolver file with the staged copy.
    async fn replace_resolver(&self, staged: &Path, live: &Path) -> Result<(), CoreError>;
}

/// Timed download of a fixed-size object.
#[async_trait]
pub trait ThroughputProbe: Send + Sync {
    async fn measure(&self) -> Result<Throughput, CoreError>;
}

/// The operator in front of the terminal.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn confirm(&self, message: &str) -> Result<bool, CoreError>;

    /// Pick one of several plausible tether interfaces. `None` means the
    /// operator declined to choose.
    async fn choose_interface(
        &self,
        candidates: &[InterfaceCandidate],
    ) -> Result<Option<String>, CoreError>;
}

/// Bundle of collaborators handed to a session.
#[derive(Clone)]
pub struct Capabilities {
    pub executor: Arc<dyn CommandExecutor>,
    pub inspector: Arc<dyn NetworkInspector>,
    pub mutator: Arc<dyn NetworkMutator>,
    pub throughput: Option<Arc<dyn ThroughputProbe>>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("throughput", &self.throughput.is_some())
            .finish_non_exhaustive()
    }
}

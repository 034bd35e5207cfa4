#![allow(clippy::unwrap_used, dead_code)]
// Scripted stand-ins for adb, iproute2, ping and the operator.
//
// One `FakeHost` plays every collaborator so a test can script the
// phone and the host kernel together and then inspect what was done.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use revtether_core::{
    Approver, AuthorizationState, Capabilities, CommandExecutor, CoreError, Device,
    InterfaceAddress, InterfaceCandidate, InterfaceSnapshot, InterfaceState, LinkState,
    NetworkConfig, NetworkInspector, NetworkMutator, PingReport, PingRequest, RouteEntry,
    SessionConfig, SessionPaths, ShellOutput, Throughput, ThroughputProbe, TuningSettings,
};

pub const ORIGINAL_RESOLVER: &str = "nameserver 192.168.1.1\nsearch lan\n";
const ECHO_COMMAND: &str = "echo revtether-ok";
const RNDIS_COMMAND: &str = "setFunctions rndis";

// ── Scripted host state ─────────────────────────────────────────────

#[derive(Debug)]
pub struct HostState {
    pub devices: Vec<Device>,
    /// Replaces `devices` once `wait-for-device` returns.
    pub devices_after_wait: Option<Vec<Device>>,
    /// Echo probes that come back garbled before the shell works.
    pub echo_failures: usize,
    pub interfaces: BTreeSet<String>,
    /// Appear when the RNDIS switch command is sent.
    pub tether_interfaces: Vec<String>,
    /// Address additions that "succeed" without taking effect.
    pub dropped_addresses: usize,
    /// `ip route add` fails with this message.
    pub route_error: Option<String>,
    /// Resolver replacements that truncate the live file and then fail.
    pub resolver_failures: usize,
    /// Whether the probe target answers through a configured tether.
    pub online: bool,
    /// Largest packet the path carries without fragmentation.
    pub path_mtu: u32,
    pub addresses: BTreeMap<String, Vec<InterfaceAddress>>,
    pub links: BTreeMap<String, LinkState>,
    pub mtus: BTreeMap<String, u32>,
    pub routes: Vec<RouteEntry>,
    pub tunables: BTreeMap<String, String>,
    pub read_only_tunables: BTreeSet<String>,
    pub power_control: Option<PathBuf>,
    pub usb_power: BTreeMap<PathBuf, String>,

    pub shell_log: Vec<String>,
    pub mutations: Vec<String>,
    pub waits: usize,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            devices: vec![pixel()],
            devices_after_wait: None,
            echo_failures: 0,
            interfaces: ["eth0".to_owned()].into(),
            tether_interfaces: vec!["usb0".into()],
            dropped_addresses: 0,
            route_error: None,
            resolver_failures: 0,
            online: true,
            path_mtu: 1500,
            addresses: BTreeMap::new(),
            links: BTreeMap::new(),
            mtus: BTreeMap::new(),
            routes: vec![RouteEntry {
                destination: "default".into(),
                gateway: Some(Ipv4Addr::new(192, 168, 1, 1)),
                device: "eth0".into(),
                metric: Some(100),
            }],
            tunables: BTreeMap::new(),
            read_only_tunables: BTreeSet::new(),
            power_control: None,
            usb_power: BTreeMap::new(),
            shell_log: Vec::new(),
            mutations: Vec::new(),
            waits: 0,
        }
    }
}

pub fn pixel() -> Device {
    Device::new("R58M123ABC", AuthorizationState::Authorized)
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new(state: HostState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    pub fn capabilities(self: &Arc<Self>) -> Capabilities {
        Capabilities {
            executor: Arc::clone(self) as Arc<dyn CommandExecutor>,
            inspector: Arc::clone(self) as Arc<dyn NetworkInspector>,
            mutator: Arc::clone(self) as Arc<dyn NetworkMutator>,
            throughput: Some(Arc::new(FixedThroughput) as Arc<dyn ThroughputProbe>),
        }
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state().mutations.clone()
    }

    pub fn shell_commands(&self) -> Vec<String> {
        self.state().shell_log.clone()
    }

    fn record(&self, what: String) {
        self.state().mutations.push(what);
    }
}

#[async_trait]
impl CommandExecutor for FakeHost {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        Ok(self.state().devices.clone())
    }

    async fn run_shell(&self, _device_id: &str, command: &str) -> Result<ShellOutput, CoreError> {
        let mut state = self.state();
        state.shell_log.push(command.to_owned());

        if command == ECHO_COMMAND {
            if state.echo_failures > 0 {
                state.echo_failures -= 1;
                return Ok(ShellOutput {
                    exit_code: 1,
                    stdout: "error: device unauthorized.\n".into(),
                });
            }
            return Ok(ShellOutput {
                exit_code: 0,
                stdout: "revtether-ok\n".into(),
            });
        }

        if command.contains(RNDIS_COMMAND) {
            let appeared = state.tether_interfaces.clone();
            state.interfaces.extend(appeared);
        }
        Ok(ShellOutput::default())
    }

    async fn wait_for_device(&self) -> Result<(), CoreError> {
        let mut state = self.state();
        state.waits += 1;
        if let Some(devices) = state.devices_after_wait.take() {
            state.devices = devices;
        }
        Ok(())
    }

    async fn get_property(&self, _device_id: &str, name: &str) -> Result<String, CoreError> {
        Ok(match name {
            "ro.product.model" => "Pixel 7".into(),
            "ro.build.version.release" => "14".into(),
            _ => String::new(),
        })
    }
}

#[async_trait]
impl NetworkInspector for FakeHost {
    async fn list_interfaces(&self) -> Result<InterfaceSnapshot, CoreError> {
        Ok(self.state().interfaces.iter().cloned().collect())
    }

    async fn interface_state(&self, name: &str) -> Result<Option<InterfaceState>, CoreError> {
        let state = self.state();
        if !state.interfaces.contains(name) {
            return Ok(None);
        }
        Ok(Some(InterfaceState {
            name: name.into(),
            mtu: state.mtus.get(name).copied().unwrap_or(1500),
            link: state.links.get(name).copied().unwrap_or(LinkState::Down),
            addresses: state.addresses.get(name).cloned().unwrap_or_default(),
        }))
    }

    async fn default_routes(&self) -> Result<Vec<RouteEntry>, CoreError> {
        Ok(self.state().routes.clone())
    }

    async fn ping(&self, request: &PingRequest) -> Result<PingReport, CoreError> {
        let state = self.state();
        let tether = NetworkConfig::tether();
        let routed = state
            .routes
            .iter()
            .any(|r| r.is_default() && r.gateway == Some(tether.gateway));
        let gateway_up = state
            .addresses
            .values()
            .flatten()
            .any(|a| a.address == tether.address);

        let reachable = if request.target == tether.gateway {
            gateway_up
        } else {
            state.online && routed && gateway_up
        };
        if !reachable {
            return Ok(PingReport::unreachable());
        }

        if let Some(size) = request.payload_size {
            if request.dont_fragment && size + 28 > state.path_mtu {
                return Ok(PingReport {
                    success: false,
                    mean_latency: None,
                    fragmentation_failure: true,
                });
            }
        }
        Ok(PingReport::reachable(Duration::from_millis(24)))
    }

    async fn read_tunable(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.state().tunables.get(key).cloned())
    }

    async fn usb_power_control(&self, _interface: &str) -> Result<Option<PathBuf>, CoreError> {
        Ok(self.state().power_control.clone())
    }
}

#[async_trait]
impl NetworkMutator for FakeHost {
    async fn set_link(&self, name: &str, link: LinkState) -> Result<(), CoreError> {
        self.record(format!("link {name} {link}"));
        let mut state = self.state();
        if !state.interfaces.contains(name) {
            return Err(CoreError::host("ip link set", format!("Cannot find device \"{name}\"")));
        }
        state.links.insert(name.into(), link);
        Ok(())
    }

    async fn flush_addresses(&self, name: &str) -> Result<(), CoreError> {
        self.record(format!("flush {name}"));
        self.state().addresses.remove(name);
        Ok(())
    }

    async fn add_address(&self, name: &str, address: &InterfaceAddress) -> Result<(), CoreError> {
        self.record(format!("addr add {address} dev {name}"));
        let mut state = self.state();
        if state.dropped_addresses > 0 {
            state.dropped_addresses -= 1;
            return Ok(());
        }
        state
            .addresses
            .entry(name.into())
            .or_default()
            .push(address.clone());
        Ok(())
    }

    async fn remove_default_route(&self, name: &str) -> Result<(), CoreError> {
        self.record(format!("route del default dev {name}"));
        self.state().routes.retain(|r| !(r.is_default() && r.device == name));
        Ok(())
    }

    async fn add_default_route(&self, gateway: Ipv4Addr, name: &str) -> Result<(), CoreError> {
        self.record(format!("route add default via {gateway} dev {name}"));
        let mut state = self.state();
        if let Some(message) = state.route_error.clone() {
            return Err(CoreError::host("ip route add", message));
        }
        if !state.routes.iter().any(|r| r.is_default_via(gateway, name)) {
            state.routes.insert(
                0,
                RouteEntry {
                    destination: "default".into(),
                    gateway: Some(gateway),
                    device: name.into(),
                    metric: None,
                },
            );
        }
        Ok(())
    }

    async fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), CoreError> {
        self.record(format!("mtu {name} {mtu}"));
        self.state().mtus.insert(name.into(), mtu);
        Ok(())
    }

    async fn write_tunable(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.record(format!("sysctl {key}={value}"));
        let mut state = self.state();
        if state.read_only_tunables.contains(key) {
            return Err(CoreError::host("write tunable", "Permission denied"));
        }
        state.tunables.insert(key.into(), value.into());
        Ok(())
    }

    async fn write_usb_power(&self, path: &Path, value: &str) -> Result<(), CoreError> {
        self.record(format!("usb power {}={value}", path.display()));
        self.state().usb_power.insert(path.to_path_buf(), value.into());
        Ok(())
    }

    async fn replace_resolver(&self, staged: &Path, live: &Path) -> Result<(), CoreError> {
        self.record(format!("resolver {}", live.display()));
        let mut state = self.state();
        if state.resolver_failures > 0 {
            state.resolver_failures -= 1;
            std::fs::write(live, "").unwrap();
            return Err(CoreError::host("replace resolver", "No space left on device"));
        }
        std::fs::copy(staged, live)?;
        Ok(())
    }
}

// ── Throughput ──────────────────────────────────────────────────────

/// Takes five (virtual) seconds per measurement.
#[derive(Debug)]
pub struct FixedThroughput;

#[async_trait]
impl ThroughputProbe for FixedThroughput {
    async fn measure(&self) -> Result<Throughput, CoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Throughput {
            bytes: 10_000_000,
            elapsed: Duration::from_secs(2),
        })
    }
}

// ── Operator ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakeApprover {
    pub decline: bool,
    pub choice: Option<String>,
    pub prompts: Mutex<Vec<String>>,
    pub offered: Mutex<Vec<Vec<String>>>,
}

impl FakeApprover {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn declining() -> Arc<Self> {
        Arc::new(Self {
            decline: true,
            ..Self::default()
        })
    }

    pub fn choosing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            choice: Some(name.into()),
            ..Self::default()
        })
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Approver for FakeApprover {
    async fn confirm(&self, message: &str) -> Result<bool, CoreError> {
        self.prompts.lock().unwrap().push(message.into());
        Ok(!self.decline)
    }

    async fn choose_interface(
        &self,
        candidates: &[InterfaceCandidate],
    ) -> Result<Option<String>, CoreError> {
        self.offered
            .lock()
            .unwrap()
            .push(candidates.iter().map(|c| c.name.clone()).collect());
        Ok(self.choice.clone())
    }
}

// ── Session configuration ───────────────────────────────────────────

/// Config rooted in `dir` with a regular resolver file and tuning off.
pub fn session_config(dir: &Path) -> SessionConfig {
    let paths = SessionPaths {
        resolver: dir.join("resolv.conf"),
        state_dir: dir.join("state"),
    };
    std::fs::write(&paths.resolver, ORIGINAL_RESOLVER).unwrap();
    SessionConfig {
        paths,
        tuning: TuningSettings {
            enabled: false,
            ..TuningSettings::default()
        },
        ..SessionConfig::default()
    }
}

// ── Linux host ──
//
// Glues iproute2, ping and procfs/sysfs into the inspector and mutator
// capabilities the session consumes.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use revtether_core::{
    Capabilities, CoreError, InterfaceAddress, InterfaceSnapshot, InterfaceState, LinkState,
    NetworkInspector, NetworkMutator, PingReport, PingRequest, RouteEntry, ThroughputProbe,
};

use crate::adb::AdbExecutor;
use crate::error::HostError;
use crate::iproute::IpRoute;
use crate::ping::Ping;
use crate::process::ProcessRunner;
use crate::speedtest::HttpThroughputProbe;
use crate::sysfs::SysFs;

/// Extra head room a ping gets over its own `-W` deadline.
const PING_GRACE: Duration = Duration::from_secs(5);

/// Program names and limits for the real host.
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub adb_program: String,
    pub ip_program: String,
    pub ping_program: String,
    pub command_timeout: Duration,
    /// Only needed when throughput is measured.
    pub speedtest_url: Option<Url>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            adb_program: "adb".into(),
            ip_program: "ip".into(),
            ping_program: "ping".into(),
            command_timeout: Duration::from_secs(15),
            speedtest_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinuxHost {
    ip: IpRoute,
    ping: Ping,
    sys: SysFs,
}

impl LinuxHost {
    pub fn new(options: &HostOptions) -> Self {
        let runner = ProcessRunner::new(options.command_timeout);
        Self {
            ip: IpRoute::new(&options.ip_program, runner),
            ping: Ping::new(
                &options.ping_program,
                ProcessRunner::new(options.command_timeout + PING_GRACE),
            ),
            sys: SysFs::default(),
        }
    }
}

#[async_trait]
impl NetworkInspector for LinuxHost {
    async fn list_interfaces(&self) -> Result<InterfaceSnapshot, CoreError> {
        Ok(self.sys.list_interfaces().await?)
    }

    async fn interface_state(&self, name: &str) -> Result<Option<InterfaceState>, CoreError> {
        Ok(self.ip.interface_state(name).await?)
    }

    async fn default_routes(&self) -> Result<Vec<RouteEntry>, CoreError> {
        Ok(self.ip.default_routes().await?)
    }

    async fn ping(&self, request: &PingRequest) -> Result<PingReport, CoreError> {
        Ok(self.ping.ping(request).await?)
    }

    async fn read_tunable(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.sys.read_tunable(key).await?)
    }

    async fn usb_power_control(&self, interface: &str) -> Result<Option<PathBuf>, CoreError> {
        Ok(self.sys.usb_power_control(interface).await?)
    }
}

#[async_trait]
impl NetworkMutator for LinuxHost {
    async fn set_link(&self, name: &str, state: LinkState) -> Result<(), CoreError> {
        Ok(self.ip.set_link(name, state).await?)
    }

    async fn flush_addresses(&self, name: &str) -> Result<(), CoreError> {
        Ok(self.ip.flush_addresses(name).await?)
    }

    async fn add_address(&self, name: &str, address: &InterfaceAddress) -> Result<(), CoreError> {
        Ok(self.ip.add_address(name, address).await?)
    }

    async fn remove_default_route(&self, name: &str) -> Result<(), CoreError> {
        Ok(self.ip.remove_default_route(name).await?)
    }

    async fn add_default_route(&self, gateway: Ipv4Addr, name: &str) -> Result<(), CoreError> {
        Ok(self.ip.add_default_route(gateway, name).await?)
    }

    async fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), CoreError> {
        Ok(self.ip.set_mtu(name, mtu).await?)
    }

    async fn write_tunable(&self, key: &str, value: &str) -> Result<(), CoreError> {
        Ok(self.sys.write_tunable(key, value).await?)
    }

    async fn write_usb_power(&self, path: &Path, value: &str) -> Result<(), CoreError> {
        Ok(self.sys.write_power(path, value).await?)
    }

    async fn replace_resolver(&self, staged: &Path, live: &Path) -> Result<(), CoreError> {
        Ok(self.sys.replace_file(staged, live).await?)
    }
}

/// Real collaborators for a session on this machine.
pub fn capabilities(options: &HostOptions) -> Result<Capabilities, HostError> {
    let host = Arc::new(LinuxHost::new(options));
    let executor = AdbExecutor::new(
        &options.adb_program,
        ProcessRunner::new(options.command_timeout),
    );
    let throughput = match &options.speedtest_url {
        Some(url) => Some(Arc::new(HttpThroughputProbe::new(
            url.clone(),
            Duration::from_secs(60),
        )?) as Arc<dyn ThroughputProbe>),
        None => None,
    };

    Ok(Capabilities {
        executor: Arc::new(executor),
        inspector: Arc::clone(&host) as Arc<dyn NetworkInspector>,
        mutator: host,
        throughput,
    })
}

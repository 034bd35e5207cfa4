// ── Runtime session configuration ──
//
// These types describe *how* to run a session: timings, remote
// commands, tuning policy and file locations. They never touch disk.
// The CLI builds a `SessionConfig` from its config file and flags and
// hands it in.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::NetworkConfig;

/// Remote commands that put the phone into RNDIS tethering.
pub const DEFAULT_TETHER_COMMANDS: [&str; 3] = [
    "settings put global tether_dun_required 0",
    "svc usb setFunctions rndis",
    "settings put global tether_offload_disabled 0",
];

/// How the tuner picks an MTU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MtuPolicy {
    /// Sweep candidate sizes with don't-fragment pings.
    #[default]
    Probe,
    /// Apply the conservative constant directly.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TetherSettings {
    /// Wait after the RNDIS switch before looking for the interface.
    pub settle: Duration,
    /// Wait for the operator to accept the on-phone RSA prompt.
    pub auth_grace: Duration,
    /// Wait after bringing the link up.
    pub link_settle: Duration,
    /// Give up on `wait-for-device` after this long. `None` waits forever.
    pub wait_timeout: Option<Duration>,
    pub commands: Vec<String>,
}

impl Default for TetherSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(8),
            auth_grace: Duration::from_secs(5),
            link_settle: Duration::from_secs(2),
            wait_timeout: Some(Duration::from_secs(60)),
            commands: DEFAULT_TETHER_COMMANDS.iter().map(|c| (*c).to_owned()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningSettings {
    pub enabled: bool,
    pub mtu_policy: MtuPolicy,
    pub fixed_mtu: u32,
    /// Probe sizes, largest first.
    pub mtu_candidates: Vec<u32>,
    pub probe_target: Ipv4Addr,
    pub probe_count: u32,
    pub probe_timeout: Duration,
    pub usb_power: bool,
    pub measure_throughput: bool,
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mtu_policy: MtuPolicy::Probe,
            fixed_mtu: 1400,
            mtu_candidates: vec![1500, 1480, 1460, 1440, 1420, 1400, 1380, 1360],
            probe_target: Ipv4Addr::new(8, 8, 8, 8),
            probe_count: 3,
            probe_timeout: Duration::from_secs(2),
            usb_power: true,
            measure_throughput: false,
        }
    }
}

/// Fixed, non-namespaced file locations. One session at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// The live resolver file.
    pub resolver: PathBuf,
    /// Holds the staging resolver, the backup and the snapshot files.
    pub state_dir: PathBuf,
}

impl SessionPaths {
    pub fn staging_resolver(&self) -> PathBuf {
        self.state_dir.join("resolv.conf.staging")
    }

    pub fn resolver_backup(&self) -> PathBuf {
        self.state_dir.join("resolv.conf.backup")
    }

    pub fn snapshot(&self, label: &str) -> PathBuf {
        self.state_dir.join(format!("interfaces.{label}"))
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}

impl Default for SessionPaths {
    fn default() -> Self {
        Self {
            resolver: PathBuf::from("/etc/resolv.conf"),
            state_dir: PathBuf::from("/tmp/revtether"),
        }
    }
}

/// Everything a [`Session`](crate::Session) needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub network: NetworkConfig,
    pub tether: TetherSettings,
    pub tuning: TuningSettings,
    pub paths: SessionPaths,
    /// Answer to interface disambiguation given up front (`--interface`).
    pub preferred_interface: Option<String>,
    /// Leave the tether DNS in place after a successful run; the backup
    /// stays on disk for `restore-dns`.
    pub keep_dns_on_success: bool,
}

impl SessionConfig {
    /// Where the post-configuration reachability probe goes.
    pub fn reachability_probe(&self) -> (Ipv4Addr, Duration) {
        (self.tuning.probe_target, Duration::from_secs(3))
    }
}

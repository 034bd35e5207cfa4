use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;

// ── Addressing asserted by the host ─────────────────────────────────

/// Addressing for the tether link.
///
/// The phone's RNDIS gateway always sits at `192.168.42.1`; the host
/// claims a fixed address on that subnet instead of asking DHCP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    pub broadcast: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub dns_servers: Vec<Ipv4Addr>,
}

impl NetworkConfig {
    pub fn tether() -> Self {
        Self {
            address: Ipv4Addr::new(192, 168, 42, 100),
            prefix_len: 24,
            broadcast: Ipv4Addr::new(192, 168, 42, 255),
            gateway: Ipv4Addr::new(192, 168, 42, 1),
            dns_servers: vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)],
        }
    }

    /// `address/prefix` notation.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix_len)
    }

    pub fn interface_address(&self) -> InterfaceAddress {
        InterfaceAddress {
            address: self.address,
            prefix_len: self.prefix_len,
            broadcast: Some(self.broadcast),
        }
    }

    /// Body of the resolver file pointing at the configured servers.
    pub fn resolver_contents(&self) -> String {
        let mut out = String::from("# Generated by revtether\n");
        for server in &self.dns_servers {
            out.push_str("nameserver ");
            out.push_str(&server.to_string());
            out.push('\n');
        }
        out
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::tether()
    }
}

// ── Observed interface and route state ──────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkState {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<Ipv4Addr>,
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)?;
        if let Some(brd) = self.broadcast {
            write!(f, " brd {brd}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceState {
    pub name: String,
    pub mtu: u32,
    pub link: LinkState,
    pub addresses: Vec<InterfaceAddress>,
}

impl InterfaceState {
    pub fn has_address(&self, address: Ipv4Addr, prefix_len: u8) -> bool {
        self.addresses
            .iter()
            .any(|a| a.address == address && a.prefix_len == prefix_len)
    }

    pub fn address_list(&self) -> String {
        if self.addresses.is_empty() {
            return "(none)".into();
        }
        self.addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One row of the IPv4 route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// `default` or a CIDR.
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<u32>,
}

impl RouteEntry {
    pub fn is_default(&self) -> bool {
        self.destination == "default" || self.destination == "0.0.0.0/0"
    }

    pub fn is_default_via(&self, gateway: Ipv4Addr, device: &str) -> bool {
        self.is_default() && self.gateway == Some(gateway) && self.device == device
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.destination)?;
        if let Some(gw) = self.gateway {
            write!(f, " via {gw}")?;
        }
        write!(f, " dev {}", self.device)?;
        if let Some(metric) = self.metric {
            write!(f, " metric {metric}")?;
        }
        Ok(())
    }
}

// ── Reachability probes ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    pub target: Ipv4Addr,
    pub count: u32,
    pub timeout: Duration,
    /// ICMP payload size; `None` leaves the tool default.
    pub payload_size: Option<u32>,
    pub dont_fragment: bool,
}

impl PingRequest {
    /// A single default-sized probe.
    pub fn once(target: Ipv4Addr, timeout: Duration) -> Self {
        Self {
            target,
            count: 1,
            timeout,
            payload_size: None,
            dont_fragment: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "millis")]
    pub mean_latency: Option<Duration>,
    /// The probe was rejected locally or en route for exceeding the MTU.
    #[serde(default)]
    pub fragmentation_failure: bool,
}

impl PingReport {
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn reachable(mean_latency: Duration) -> Self {
        Self {
            success: true,
            mean_latency: Some(mean_latency),
            fragmentation_failure: false,
        }
    }
}

/// State dumped when the tether is configured but traffic does not flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InterfaceState>,
    pub routes: Vec<RouteEntry>,
    pub gateway: Ipv4Addr,
    pub gateway_reachable: bool,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => writeln!(
                f,
                "interface {}: {} mtu {} addresses {}",
                state.name,
                state.link,
                state.mtu,
                state.address_list()
            )?,
            None => writeln!(f, "interface {}: missing", self.interface)?,
        }
        if self.routes.is_empty() {
            writeln!(f, "default routes: (none)")?;
        } else {
            writeln!(f, "default routes:")?;
            for route in &self.routes {
                writeln!(f, "  {route}")?;
            }
        }
        write!(
            f,
            "gateway {}: {}",
            self.gateway,
            if self.gateway_reachable {
                "reachable"
            } else {
                "unreachable"
            }
        )
    }
}

// ── Throughput and resolver backup ──────────────────────────────────

/// One timed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    pub bytes: u64,
    #[serde(with = "millis_required")]
    pub elapsed: Duration,
}

impl Throughput {
    pub fn bits_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
        let bits = (self.bytes * 8) as f64;
        bits / secs
    }

    /// Percentage change from `before` to `self`.
    pub fn change_from(&self, before: &Self) -> Option<f64> {
        let base = before.bits_per_second();
        if base <= 0.0 {
            return None;
        }
        Some((self.bits_per_second() - base) / base * 100.0)
    }
}

/// Copy of the resolver file taken just before it was overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverBackup {
    pub original: PathBuf,
    pub path: PathBuf,
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_secs_f64() * 1000.0)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms: Option<f64> = Option::deserialize(d)?;
        Ok(ms.map(|ms| Duration::from_secs_f64(ms / 1000.0)))
    }
}

mod millis_required {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tether_defaults() {
        let cfg = NetworkConfig::tether();
        assert_eq!(cfg.cidr(), "192.168.42.100/24");
        assert_eq!(cfg.gateway, Ipv4Addr::new(192, 168, 42, 1));
        assert_eq!(
            cfg.resolver_contents(),
            "# Generated by revtether\nnameserver 8.8.8.8\nnameserver 8.8.4.4\n"
        );
    }

    #[test]
    fn default_route_matching() {
        let route = RouteEntry {
            destination: "default".into(),
            gateway: Some(Ipv4Addr::new(192, 168, 42, 1)),
            device: "usb0".into(),
            metric: None,
        };
        assert!(route.is_default_via(Ipv4Addr::new(192, 168, 42, 1), "usb0"));
        assert!(!route.is_default_via(Ipv4Addr::new(192, 168, 42, 1), "eth0"));
        assert!(!route.is_default_via(Ipv4Addr::new(10, 0, 0, 1), "usb0"));
        assert_eq!(route.to_string(), "default via 192.168.42.1 dev usb0");
    }

    #[test]
    fn throughput_change() {
        let before = Throughput {
            bytes: 1_000_000,
            elapsed: Duration::from_secs(2),
        };
        let after = Throughput {
            bytes: 1_000_000,
            elapsed: Duration::from_secs(1),
        };
        let change = after.change_from(&before).unwrap_or_default();
        assert!((change - 100.0).abs() < 1e-9);
    }
}

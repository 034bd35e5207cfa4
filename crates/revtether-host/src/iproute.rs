// ── iproute2 wrapper ──
//
// Reads go through `ip -j` so the output is JSON rather than the
// human table. Writes are plain `ip` invocations; the few "already
// done" answers the kernel gives are mapped to success here.

use std::net::Ipv4Addr;

use serde::Deserialize;
use tracing::debug;

use revtether_core::{InterfaceAddress, InterfaceState, LinkState, RouteEntry};

use crate::error::HostError;
use crate::process::ProcessRunner;

// ── JSON shapes ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IpLink {
    ifname: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    mtu: u32,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    family: String,
    #[serde(default)]
    local: Option<String>,
    #[serde(default)]
    prefixlen: Option<u8>,
    #[serde(default)]
    broadcast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpRouteJson {
    dst: String,
    #[serde(default)]
    gateway: Option<String>,
    #[serde(default)]
    dev: Option<String>,
    #[serde(default)]
    metric: Option<u32>,
}

/// Parse `ip -j addr show dev <name>` into the first interface it lists.
pub fn parse_addr_show(json: &str) -> Result<Option<InterfaceState>, HostError> {
    let links: Vec<IpLink> = serde_json::from_str(json).map_err(|e| HostError::Parse {
        what: "ip addr output",
        message: e.to_string(),
    })?;
    Ok(links.into_iter().next().map(|link| {
        let addresses = link
            .addr_info
            .iter()
            .filter(|info| info.family == "inet")
            .filter_map(|info| {
                Some(InterfaceAddress {
                    address: info.local.as_deref()?.parse().ok()?,
                    prefix_len: info.prefixlen?,
                    broadcast: info.broadcast.as_deref().and_then(|b| b.parse().ok()),
                })
            })
            .collect();
        InterfaceState {
            link: if link.flags.iter().any(|f| f == "UP") {
                LinkState::Up
            } else {
                LinkState::Down
            },
            name: link.ifname,
            mtu: link.mtu,
            addresses,
        }
    }))
}

/// Parse `ip -4 -j route show default`.
pub fn parse_routes(json: &str) -> Result<Vec<RouteEntry>, HostError> {
    // An empty table prints nothing at all on some iproute2 versions.
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let routes: Vec<IpRouteJson> = serde_json::from_str(json).map_err(|e| HostError::Parse {
        what: "ip route output",
        message: e.to_string(),
    })?;
    Ok(routes
        .into_iter()
        .filter_map(|route| {
            Some(RouteEntry {
                destination: route.dst,
                gateway: route.gateway.and_then(|g| g.parse::<Ipv4Addr>().ok()),
                device: route.dev?,
                metric: route.metric,
            })
        })
        .collect())
}

// ── IpRoute ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IpRoute {
    program: String,
    runner: ProcessRunner,
}

impl IpRoute {
    pub fn new(program: impl Into<String>, runner: ProcessRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    pub async fn interface_state(&self, name: &str) -> Result<Option<InterfaceState>, HostError> {
        let output = self
            .runner
            .run(&self.program, &["-j", "addr", "show", "dev", name])
            .await?;
        if !output.success() {
            // `Device "usb9" does not exist.`
            debug!(interface = name, stderr = %output.stderr.trim(), "interface lookup failed");
            return Ok(None);
        }
        parse_addr_show(&output.stdout)
    }

    pub async fn default_routes(&self) -> Result<Vec<RouteEntry>, HostError> {
        let output = self
            .runner
            .run_checked(&self.program, &["-4", "-j", "route", "show", "default"])
            .await?;
        parse_routes(&output.stdout)
    }

    pub async fn set_link(&self, name: &str, state: LinkState) -> Result<(), HostError> {
        let state = match state {
            LinkState::Up => "up",
            LinkState::Down => "down",
        };
        self.ip(&["link", "set", "dev", name, state]).await
    }

    pub async fn flush_addresses(&self, name: &str) -> Result<(), HostError> {
        self.ip(&["addr", "flush", "dev", name]).await
    }

    pub async fn add_address(
        &self,
        name: &str,
        address: &InterfaceAddress,
    ) -> Result<(), HostError> {
        let cidr = format!("{}/{}", address.address, address.prefix_len);
        match address.broadcast {
            Some(brd) => {
                let brd = brd.to_string();
                self.ip(&["addr", "add", &cidr, "broadcast", &brd, "dev", name])
                    .await
            }
            None => self.ip(&["addr", "add", &cidr, "dev", name]).await,
        }
    }

    /// Delete the default route through `name`. No such route is fine.
    pub async fn remove_default_route(&self, name: &str) -> Result<(), HostError> {
        match self.ip(&["route", "del", "default", "dev", name]).await {
            Err(e) if e.stderr_contains("No such process") => {
                debug!(interface = name, "no default route to remove");
                Ok(())
            }
            other => other,
        }
    }

    /// Add the default route. An identical existing route is fine.
    pub async fn add_default_route(&self, gateway: Ipv4Addr, name: &str) -> Result<(), HostError> {
        let gateway = gateway.to_string();
        match self
            .ip(&["route", "add", "default", "via", &gateway, "dev", name])
            .await
        {
            Err(e) if e.stderr_contains("File exists") => {
                debug!(interface = name, "default route already present");
                Ok(())
            }
            other => other,
        }
    }

    pub async fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), HostError> {
        let mtu = mtu.to_string();
        self.ip(&["link", "set", "dev", name, "mtu", &mtu]).await
    }

    async fn ip(&self, args: &[&str]) -> Result<(), HostError> {
        self.runner.run_checked(&self.program, args).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ADDR_SHOW: &str = r#"[{"ifindex":7,"ifname":"usb0","flags":["BROADCAST","MULTICAST","UP","LOWER_UP"],"mtu":1500,"qdisc":"fq_codel","operstate":"UP","group":"default","txqlen":1000,"link_type":"ether","address":"6a:1f:00:11:22:33","broadcast":"ff:ff:ff:ff:ff:ff","addr_info":[{"family":"inet","local":"192.168.42.100","prefixlen":24,"broadcast":"192.168.42.255","scope":"global","label":"usb0","valid_life_time":4294967295,"preferred_life_time":4294967295},{"family":"inet6","local":"fe80::681f:ff:fe11:2233","prefixlen":64,"scope":"link","valid_life_time":4294967295,"preferred_life_time":4294967295}]}]"#;

    const ROUTES: &str = r#"[{"dst":"default","gateway":"192.168.42.1","dev":"usb0","flags":[]},{"dst":"default","gateway":"192.168.1.1","dev":"wlan0","protocol":"dhcp","prefsrc":"192.168.1.23","metric":600,"flags":[]}]"#;

    #[test]
    fn parses_interface_state() {
        let state = parse_addr_show(ADDR_SHOW).unwrap().unwrap();
        assert_eq!(state.name, "usb0");
        assert_eq!(state.mtu, 1500);
        assert_eq!(state.link, LinkState::Up);
        assert_eq!(
            state.addresses,
            vec![InterfaceAddress {
                address: Ipv4Addr::new(192, 168, 42, 100),
                prefix_len: 24,
                broadcast: Some(Ipv4Addr::new(192, 168, 42, 255)),
            }]
        );
    }

    #[test]
    fn down_interface_without_addresses() {
        let json = r#"[{"ifindex":7,"ifname":"usb0","flags":["BROADCAST","MULTICAST"],"mtu":1500,"operstate":"DOWN","addr_info":[]}]"#;
        let state = parse_addr_show(json).unwrap().unwrap();
        assert_eq!(state.link, LinkState::Down);
        assert!(state.addresses.is_empty());
    }

    #[test]
    fn empty_array_is_no_interface() {
        assert_eq!(parse_addr_show("[]").unwrap(), None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_addr_show("Device \"usb9\" does not exist.").unwrap_err();
        assert!(matches!(err, HostError::Parse { .. }));
    }

    #[test]
    fn parses_default_routes() {
        let routes = parse_routes(ROUTES).unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes[0].is_default_via(Ipv4Addr::new(192, 168, 42, 1), "usb0"));
        assert_eq!(routes[1].metric, Some(600));
        assert_eq!(routes[1].to_string(), "default via 192.168.1.1 dev wlan0 metric 600");
    }

    #[test]
    fn empty_route_output() {
        assert!(parse_routes("").unwrap().is_empty());
        assert!(parse_routes("[]\n").unwrap().is_empty());
    }
}

// ── Network configuration with read-back verification ──
//
// Each step is checked before the next one runs. Address and route are
// only trusted once they show up when read back from the host, not
// when the mutator says it applied them.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::host::{NetworkInspector, NetworkMutator};
use crate::model::{Diagnostics, LinkState, NetworkConfig, PingRequest, ResolverBackup};
use crate::resolver::ResolverFiles;

/// Reachability verdict after configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    Reachable { latency: Option<Duration> },
    Unreachable(Box<Diagnostics>),
}

impl Connectivity {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }
}

/// Successful configuration. Connectivity may still be missing; that is
/// a diagnostic outcome, not a configuration failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigReport {
    pub interface: String,
    pub config: NetworkConfig,
    /// Backup written by this attempt, if any.
    pub resolver_backup: Option<ResolverBackup>,
    pub connectivity: Connectivity,
    probe_target: Ipv4Addr,
}

impl ConfigReport {
    /// Turn a missing-connectivity verdict into an error.
    pub fn require_connectivity(self) -> Result<Self, CoreError> {
        match self.connectivity {
            Connectivity::Unreachable(diagnostics) => Err(CoreError::Connectivity {
                target: self.probe_target,
                diagnostics,
            }),
            Connectivity::Reachable { .. } => Ok(self),
        }
    }
}

pub struct NetworkConfigurator {
    inspector: Arc<dyn NetworkInspector>,
    mutator: Arc<dyn NetworkMutator>,
    resolver: ResolverFiles,
    link_settle: Duration,
    probe_target: Ipv4Addr,
    probe_timeout: Duration,
}

impl NetworkConfigurator {
    pub fn new(
        inspector: Arc<dyn NetworkInspector>,
        mutator: Arc<dyn NetworkMutator>,
        resolver: ResolverFiles,
        link_settle: Duration,
        probe: (Ipv4Addr, Duration),
    ) -> Self {
        Self {
            inspector,
            mutator,
            resolver,
            link_settle,
            probe_target: probe.0,
            probe_timeout: probe.1,
        }
    }

    pub fn resolver(&self) -> &ResolverFiles {
        &self.resolver
    }

    /// Bring `name` up with the tether address, default route and DNS,
    /// verifying address and route by reading them back.
    pub async fn configure(
        &self,
        name: &str,
        config: &NetworkConfig,
    ) -> Result<ConfigReport, CoreError> {
        // 1. Interface must exist.
        if self.inspector.interface_state(name).await?.is_none() {
            return Err(CoreError::InterfaceNotFound { name: name.into() });
        }

        // 2. Administratively up.
        self.mutator.set_link(name, LinkState::Up).await?;
        tokio::time::sleep(self.link_settle).await;

        // 3. Flush whatever was there. Best effort.
        if let Err(e) = self.mutator.flush_addresses(name).await {
            debug!(interface = name, error = %e, "address flush failed, continuing");
        }

        // 4. Assign. Hard failure.
        self.mutator
            .add_address(name, &config.interface_address())
            .await
            .map_err(|e| CoreError::AddressAssignment {
                interface: name.into(),
                address: config.cidr(),
                message: e.to_string(),
            })?;

        // 5. Read the address back.
        self.verify_address(name, config).await?;
        info!(interface = name, address = %config.cidr(), "address assigned");

        // 6. Replace the default route through this interface.
        if let Err(e) = self.mutator.remove_default_route(name).await {
            debug!(interface = name, error = %e, "stale default route removal failed, continuing");
        }
        self.mutator
            .add_default_route(config.gateway, name)
            .await
            .map_err(|e| CoreError::RouteAssignment {
                interface: name.into(),
                gateway: config.gateway,
                message: e.to_string(),
            })?;

        // 7. Read the route table back.
        self.verify_route(name, config.gateway).await?;
        info!(interface = name, gateway = %config.gateway, "default route installed");

        // 8. DNS. A backup written here survives a failed replace so
        // cleanup can still put it back.
        let resolver_backup = self.resolver.prepare(&config.resolver_contents())?;
        self.mutator
            .replace_resolver(self.resolver.staging(), self.resolver.live())
            .await?;
        info!(path = %self.resolver.live().display(), "resolver replaced");

        // 9. Reachability, diagnostic only.
        let connectivity = self.check_connectivity(name, config.gateway).await;

        Ok(ConfigReport {
            interface: name.into(),
            config: config.clone(),
            resolver_backup,
            connectivity,
            probe_target: self.probe_target,
        })
    }

    /// Down, flush, up, settle. The alternative path tried once before a
    /// configuration failure becomes final.
    pub async fn cycle_interface(&self, name: &str) -> Result<(), CoreError> {
        info!(interface = name, "cycling interface before retry");
        self.mutator.set_link(name, LinkState::Down).await?;
        self.mutator.flush_addresses(name).await?;
        self.mutator.set_link(name, LinkState::Up).await?;
        tokio::time::sleep(self.link_settle).await;
        Ok(())
    }

    /// Address, route and gateway reachability dump for troubleshooting.
    pub async fn diagnostics(&self, name: &str, gateway: Ipv4Addr) -> Diagnostics {
        let state = self.inspector.interface_state(name).await.unwrap_or_else(|e| {
            warn!(error = %e, "could not read interface state");
            None
        });
        let routes = self.inspector.default_routes().await.unwrap_or_else(|e| {
            warn!(error = %e, "could not read route table");
            Vec::new()
        });
        let gateway_reachable = self
            .inspector
            .ping(&PingRequest::once(gateway, self.probe_timeout))
            .await
            .is_ok_and(|report| report.success);

        Diagnostics {
            interface: name.into(),
            state,
            routes,
            gateway,
            gateway_reachable,
        }
    }

    async fn verify_address(&self, name: &str, config: &NetworkConfig) -> Result<(), CoreError> {
        let state = self.inspector.interface_state(name).await?;
        match state {
            Some(state) if state.has_address(config.address, config.prefix_len) => Ok(()),
            Some(state) => Err(CoreError::Verification {
                what: format!("address on {name}"),
                expected: config.cidr(),
                found: state.address_list(),
            }),
            None => Err(CoreError::Verification {
                what: format!("address on {name}"),
                expected: config.cidr(),
                found: "interface vanished".into(),
            }),
        }
    }

    async fn verify_route(&self, name: &str, gateway: Ipv4Addr) -> Result<(), CoreError> {
        let routes = self.inspector.default_routes().await?;
        if routes.iter().any(|r| r.is_default_via(gateway, name)) {
            return Ok(());
        }
        let found = if routes.is_empty() {
            "no default route".to_owned()
        } else {
            routes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };
        Err(CoreError::Verification {
            what: "default route".into(),
            expected: format!("default via {gateway} dev {name}"),
            found,
        })
    }

    async fn check_connectivity(&self, name: &str, gateway: Ipv4Addr) -> Connectivity {
        let probe = self
            .inspector
            .ping(&PingRequest::once(self.probe_target, self.probe_timeout))
            .await;
        match probe {
            Ok(report) if report.success => {
                info!(target = %self.probe_target, "tether is passing traffic");
                return Connectivity::Reachable {
                    latency: report.mean_latency,
                };
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "reachability probe could not run"),
        }

        warn!(target = %self.probe_target, "configured but unreachable, collecting diagnostics");
        let diagnostics = self.diagnostics(name, gateway).await;
        Connectivity::Unreachable(Box::new(diagnostics))
    }
}

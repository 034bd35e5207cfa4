//! `revtether status`: interface, route and gateway state.

use std::fmt::Write as _;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use revtether_core::{
    CoreError, InterfaceState, NetworkInspector, PingRequest, ResolverFiles, RouteEntry,
};
use revtether_host::LinuxHost;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

const GATEWAY_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct StatusView {
    interfaces: Vec<InterfaceState>,
    default_routes: Vec<RouteEntry>,
    gateway: Ipv4Addr,
    gateway_reachable: bool,
    /// A leftover backup means an earlier run did not finish cleanly.
    #[serde(skip_serializing_if = "Option::is_none")]
    resolver_backup: Option<PathBuf>,
}

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "Interface")]
    name: String,
    #[tabled(rename = "Link")]
    link: String,
    #[tabled(rename = "MTU")]
    mtu: u32,
    #[tabled(rename = "Addresses")]
    addresses: String,
}

impl From<&InterfaceState> for InterfaceRow {
    fn from(s: &InterfaceState) -> Self {
        Self {
            name: s.name.clone(),
            link: s.link.to_string(),
            mtu: s.mtu,
            addresses: s.address_list(),
        }
    }
}

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = util::load(global)?;
    let session = loaded.session_config()?;
    let host = LinuxHost::new(&loaded.host_options(false)?);

    let names: Vec<String> = match args.interface {
        Some(name) => vec![name],
        None => host
            .list_interfaces()
            .await?
            .names()
            .map(ToOwned::to_owned)
            .collect(),
    };
    let explicit = names.len() == 1;

    let mut interfaces = Vec::with_capacity(names.len());
    for name in names {
        match host.interface_state(&name).await? {
            Some(state) => interfaces.push(state),
            None if explicit => return Err(CoreError::InterfaceNotFound { name }.into()),
            None => {}
        }
    }

    let gateway = session.network.gateway;
    let gateway_reachable = host
        .ping(&PingRequest::once(gateway, GATEWAY_PING_TIMEOUT))
        .await
        .is_ok_and(|report| report.success);

    let resolver = ResolverFiles::from_paths(&session.paths);
    let view = StatusView {
        interfaces,
        default_routes: host.default_routes().await?,
        gateway,
        gateway_reachable,
        resolver_backup: resolver.has_backup().then(|| resolver.backup().to_path_buf()),
    };

    let painter = Painter::new(global.color);
    let rendered = output::render_single(
        global.output,
        &view,
        |v| detail(v, painter),
        |v| {
            v.interfaces
                .iter()
                .map(|i| i.name.clone())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn detail(view: &StatusView, painter: Painter) -> String {
    let rows: Vec<InterfaceRow> = view.interfaces.iter().map(InterfaceRow::from).collect();
    let mut out = output::render_table(&rows);
    out.push('\n');

    if view.default_routes.is_empty() {
        let _ = writeln!(out, "default routes: {}", painter.warn("(none)"));
    } else {
        let _ = writeln!(out, "default routes:");
        for route in &view.default_routes {
            let _ = writeln!(out, "  {route}");
        }
    }

    let reach = if view.gateway_reachable {
        painter.good("reachable")
    } else {
        painter.bad("unreachable")
    };
    let _ = write!(out, "tether gateway {}: {reach}", view.gateway);

    if let Some(backup) = &view.resolver_backup {
        let _ = write!(
            out,
            "\n{}",
            painter.warn(&format!(
                "resolver backup left at {}; run `revtether restore-dns`",
                backup.display()
            ))
        );
    }
    out
}

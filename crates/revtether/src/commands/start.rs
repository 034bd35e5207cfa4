//! `revtether start`: run one full tethering session.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::warn;

use revtether_core::{
    NetworkConfig, RestoreOutcome, Session, SessionReport, SessionResult, SessionState,
    TuningReport,
};

use crate::cli::{GlobalOpts, OutputFormat, StartArgs};
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::prompt::TerminalApprover;

use super::util;

pub async fn handle(args: StartArgs, global: &GlobalOpts) -> Result<(), CliError> {
    util::require_interactive("start", global.yes)?;

    let loaded = util::load(global)?;
    let mut config = loaded.session_config()?;
    if args.interface.is_some() {
        config.preferred_interface = args.interface;
    }
    if args.no_tune {
        config.tuning.enabled = false;
    }
    if let Some(policy) = args.mtu_policy {
        config.tuning.mtu_policy = util::mtu_policy(policy);
    }
    if args.measure {
        config.tuning.measure_throughput = true;
    }
    if let Some(secs) = args.settle {
        config.tether.settle = Duration::from_secs(secs);
    }
    if args.keep_dns {
        config.keep_dns_on_success = true;
    }

    let measure = config.tuning.enabled && config.tuning.measure_throughput;
    let caps = util::capabilities(&loaded.host_options(measure)?)?;
    let network = config.network.clone();

    let progress = spinner(global);
    let approver = Arc::new(TerminalApprover::new(global.yes, progress.clone()));
    let session = Session::new(caps, approver, config);
    let follower = progress
        .clone()
        .map(|bar| tokio::spawn(follow(session.subscribe(), bar)));

    let mut report = session.run_until(shutdown_signal()).await;

    // The sender is gone once the session returns, so this ends promptly.
    if let Some(follower) = follower {
        let _ = follower.await;
    }
    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    let painter = Painter::new(global.color);
    let rendered = output::render_single(
        global.output,
        &report,
        |r| summary(r, &network, painter),
        |r| r.result.to_string(),
    )?;
    output::print_output(&rendered, global.quiet);

    match report.take_error() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

// ── Progress ────────────────────────────────────────────────────────

fn spinner(global: &GlobalOpts) -> Option<ProgressBar> {
    if global.quiet || global.output != OutputFormat::Table || !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    Some(bar)
}

async fn follow(mut states: watch::Receiver<SessionState>, bar: ProgressBar) {
    loop {
        let state = *states.borrow_and_update();
        bar.set_message(state.describe());
        if states.changed().await.is_err() {
            break;
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

// ── Report ──────────────────────────────────────────────────────────

fn summary(report: &SessionReport, network: &NetworkConfig, painter: Painter) -> String {
    let mut out = String::new();
    let via = match (&report.interface, &report.device) {
        (Some(interface), Some(device)) => format!(" through {} on {device}", interface.name),
        (None, Some(device)) => format!(" on {device}"),
        _ => String::new(),
    };

    match &report.result {
        SessionResult::Success => {
            let _ = writeln!(out, "{}{via}", painter.good("Tethered"));
        }
        SessionResult::NoConnectivity => {
            let _ = writeln!(out, "{}{via}", painter.warn("Configured without connectivity"));
        }
        SessionResult::Declined => {
            let _ = writeln!(out, "Cancelled; nothing was changed.");
        }
        other => {
            let _ = writeln!(out, "{}{via}", painter.bad(&format!("Failed: {other}")));
        }
    }

    if report.result.is_success() {
        let dns = network
            .dns_servers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "  address {}  gateway {}  dns {dns}",
            network.cidr(),
            network.gateway
        );
    }

    if let Some(tuning) = &report.tuning {
        tuning_lines(&mut out, tuning, painter);
    }

    match &report.resolver {
        RestoreOutcome::NothingToRestore => {}
        RestoreOutcome::Restored => {
            let _ = writeln!(out, "{}", painter.dim("  resolver restored"));
        }
        RestoreOutcome::Kept => {
            let _ = writeln!(out, "  tether DNS kept; run `revtether restore-dns` to undo");
        }
        RestoreOutcome::Leftover => {
            let _ = writeln!(
                out,
                "{}",
                painter.warn("  earlier resolver backup left in place; run `revtether restore-dns`")
            );
        }
        RestoreOutcome::Failed(reason) => {
            let _ = writeln!(
                out,
                "{}",
                painter.bad(&format!("  resolver restore failed: {reason}"))
            );
        }
    }

    let elapsed = report.finished_at - report.started_at;
    let _ = write!(
        out,
        "{}",
        painter.dim(&format!("  finished in {}s", elapsed.num_seconds()))
    );
    out
}

/// Shared with `revtether tune`.
pub fn tuning_lines(out: &mut String, tuning: &TuningReport, painter: Painter) {
    let congestion = tuning.congestion_control.as_deref().unwrap_or("unchanged");
    let mtu = tuning.mtu.map_or_else(
        || "unchanged".to_owned(),
        |m| format!("{} ({})", m.value, if m.probed { "probed" } else { "fixed" }),
    );
    let autosuspend = if tuning.usb_autosuspend_disabled {
        "off"
    } else {
        "unchanged"
    };
    let _ = writeln!(
        out,
        "  tuning: congestion {congestion}, mtu {mtu}, usb autosuspend {autosuspend}"
    );
    if let Some(path) = &tuning.device_power_control {
        let _ = writeln!(out, "  usb power pinned on via {}", path.display());
    }
    if !tuning.failed.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            painter.warn(&format!("  not applied: {}", tuning.failed.join(", ")))
        );
    }
    if let Some(change) = tuning.throughput_change() {
        let _ = writeln!(out, "  throughput: {change:+.1}%");
    }
}

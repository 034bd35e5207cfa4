// ── Session orchestration ──
//
// Drives one reverse-tethering session through its states and always
// finishes in CleaningUp, whatever happened before. Consumers observe
// progress through a watch channel and get a `SessionReport` at the end.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::activator::TetheringActivator;
use crate::artifacts::SessionArtifacts;
use crate::config::SessionConfig;
use crate::configurator::NetworkConfigurator;
use crate::discovery::DeviceSessionManager;
use crate::error::CoreError;
use crate::host::{Approver, Capabilities};
use crate::model::{
    CandidateKind, Device, Diagnostics, InterfaceCandidate, Selection, SessionResult, SessionState,
};
use crate::resolver::{ResolverFiles, RestoreOutcome};
use crate::tuner::{PerformanceTuner, TuningReport};

// ── SessionReport ────────────────────────────────────────────────

/// Everything one session did, for the consumer to render.
#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub state_history: Vec<SessionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<InterfaceCandidate>,
    #[serde(flatten)]
    pub result: SessionResult,
    /// The error behind a non-success result, if any.
    #[serde(skip)]
    pub error: Option<CoreError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuning: Option<TuningReport>,
    pub resolver: RestoreOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn exit_code(&self) -> i32 {
        self.result.exit_code()
    }

    pub fn final_state(&self) -> SessionState {
        self.state_history
            .last()
            .copied()
            .unwrap_or(SessionState::Idle)
    }

    /// Error to surface to the operator, synthesizing one for results
    /// that carry no underlying error.
    pub fn take_error(&mut self) -> Option<CoreError> {
        if let Some(error) = self.error.take() {
            return Some(error);
        }
        match &self.result {
            SessionResult::Success | SessionResult::Declined => None,
            SessionResult::Interrupted => Some(CoreError::Rejected {
                message: "session interrupted".into(),
            }),
            other => Some(CoreError::Internal(format!("session ended with {other}"))),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Collected along the way and moved into the report.
#[derive(Debug, Default)]
struct Progress {
    history: Vec<SessionState>,
    device: Option<Device>,
    interface: Option<InterfaceCandidate>,
    diagnostics: Option<Diagnostics>,
    tuning: Option<TuningReport>,
}

type Outcome = (SessionResult, Option<CoreError>);

/// One run from device discovery to cleanup. Consumed by [`run`](Self::run).
pub struct Session {
    config: SessionConfig,
    approver: Arc<dyn Approver>,
    sessions: DeviceSessionManager,
    activator: TetheringActivator,
    configurator: NetworkConfigurator,
    tuner: PerformanceTuner,
    artifacts: SessionArtifacts,
    state: watch::Sender<SessionState>,
    progress: Progress,
    /// A resolver backup was already on disk before this session started.
    leftover_backup: bool,
}

impl Session {
    pub fn new(caps: Capabilities, approver: Arc<dyn Approver>, config: SessionConfig) -> Self {
        let sessions = DeviceSessionManager::new(
            Arc::clone(&caps.executor),
            config.tether.auth_grace,
            config.tether.wait_timeout,
        );
        let activator = TetheringActivator::new(
            Arc::clone(&caps.executor),
            Arc::clone(&caps.inspector),
            config.tether.settle,
            config.tether.commands.clone(),
        );
        let configurator = NetworkConfigurator::new(
            Arc::clone(&caps.inspector),
            Arc::clone(&caps.mutator),
            ResolverFiles::from_paths(&config.paths),
            config.tether.link_settle,
            config.reachability_probe(),
        );
        let tuner = PerformanceTuner::new(
            Arc::clone(&caps.inspector),
            Arc::clone(&caps.mutator),
            caps.throughput.clone(),
            config.tuning.clone(),
        );
        let artifacts = SessionArtifacts::new(config.paths.clone());
        let (state, _) = watch::channel(SessionState::Idle);
        let leftover_backup = configurator.resolver().has_backup();

        Self {
            config,
            approver,
            sessions,
            activator,
            configurator,
            tuner,
            artifacts,
            state,
            progress: Progress {
                history: vec![SessionState::Idle],
                ..Progress::default()
            },
            leftover_backup,
        }
    }

    /// Subscribe to state changes. The receiver outlives the session and
    /// sees `CleaningUp` last.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn run(self) -> SessionReport {
        self.run_until(std::future::pending()).await
    }

    /// Run until done or until `interrupt` resolves. Cleanup runs in
    /// both cases.
    pub async fn run_until<F>(mut self, interrupt: F) -> SessionReport
    where
        F: Future<Output = ()> + Send,
    {
        let started_at = Utc::now();
        if self.leftover_backup {
            warn!(
                backup = %self.configurator.resolver().backup().display(),
                "resolver backup from an earlier run found; it will not be restored \
                 by this session, run `revtether restore-dns` to put it back"
            );
        }

        let (result, error) = tokio::select! {
            outcome = self.drive() => outcome,
            () = interrupt => {
                warn!("interrupted, cleaning up");
                (SessionResult::Interrupted, None)
            }
        };

        let terminal = match result {
            SessionResult::Success | SessionResult::NoConnectivity => SessionState::Done,
            _ => SessionState::Aborted,
        };
        self.transition(terminal);
        let resolver = self.cleanup(&result);

        info!(result = %result, "session finished");
        SessionReport {
            state_history: self.progress.history,
            device: self.progress.device,
            interface: self.progress.interface,
            result,
            error,
            diagnostics: self.progress.diagnostics,
            tuning: self.progress.tuning,
            resolver,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn transition(&mut self, next: SessionState) {
        info!(state = %next, "{}", next.describe());
        self.progress.history.push(next);
        self.state.send_replace(next);
    }

    #[allow(clippy::too_many_lines)]
    async fn drive(&mut self) -> Outcome {
        // ── Discovery ────────────────────────────────────────────
        self.transition(SessionState::DiscoveringDevice);
        let device = match self.sessions.discover_with_wait().await {
            Ok(device) => device,
            Err(CoreError::AmbiguousDevice { ids }) => {
                return (
                    SessionResult::AmbiguousDevice { ids: ids.clone() },
                    Some(CoreError::AmbiguousDevice { ids }),
                );
            }
            Err(e) => return (SessionResult::DeviceNotFound, Some(e)),
        };
        info!(device = %device, "using device");
        self.progress.device = Some(device.clone());

        // ── Authorization ────────────────────────────────────────
        self.transition(SessionState::Authorizing);
        match self.sessions.verify_authorization(&device).await {
            Ok(true) => {}
            Ok(false) => {
                return (
                    SessionResult::AuthorizationFailed,
                    Some(CoreError::Authorization {
                        device: device.id.clone(),
                    }),
                );
            }
            Err(e) => return (SessionResult::AuthorizationFailed, Some(e)),
        }

        // Nothing on the phone or the host has been touched before this.
        let prompt = format!(
            "Switch {device} to USB tethering and route this host's traffic through it?"
        );
        match self.approver.confirm(&prompt).await {
            Ok(true) => {}
            Ok(false) => {
                info!("operator declined, nothing changed");
                return (SessionResult::Declined, None);
            }
            Err(e) => {
                warn!(error = %e, "confirmation prompt failed");
                return (SessionResult::Interrupted, Some(e));
            }
        }

        // ── Activation ───────────────────────────────────────────
        self.transition(SessionState::Activating);
        let activation = match self.activator.activate(&device).await {
            Ok(activation) => activation,
            Err(e) => return (SessionResult::ActivationFailed, Some(e)),
        };
        self.artifacts.record_snapshot("before", &activation.before);
        self.artifacts.record_snapshot("after", &activation.after);

        // ── Detection ────────────────────────────────────────────
        self.transition(SessionState::DetectingInterface);
        let candidate = match self.resolve(activation.selection).await {
            Ok(candidate) => candidate,
            Err(e) => return (SessionResult::InterfaceNotDetected, Some(e)),
        };
        if candidate.kind == CandidateKind::Fallback {
            warn!(
                interface = %candidate.name,
                "no USB-looking or new interface, falling back to an existing one"
            );
        }
        self.progress.interface = Some(candidate.clone());

        // ── Configuration ────────────────────────────────────────
        self.transition(SessionState::Configuring);
        let name = candidate.name.as_str();
        let network = &self.config.network;
        let report = match self.configurator.configure(name, network).await {
            Ok(report) => report,
            Err(first) if first.is_configuration() => {
                warn!(interface = name, error = %first, "configuration failed, retrying once");
                if let Err(e) = self.configurator.cycle_interface(name).await {
                    warn!(interface = name, error = %e, "interface cycle failed");
                }
                match self.configurator.configure(name, network).await {
                    Ok(report) => report,
                    Err(e) => return (SessionResult::ConfigurationFailedAfterRetry, Some(e)),
                }
            }
            Err(e) => return (SessionResult::ConfigurationFailed, Some(e)),
        };

        let (result, error) = match report.require_connectivity() {
            Ok(_) => (SessionResult::Success, None),
            Err(e) => {
                if let CoreError::Connectivity { diagnostics, .. } = &e {
                    warn!("tether configured but not passing traffic:\n{diagnostics}");
                    self.progress.diagnostics = Some((**diagnostics).clone());
                }
                (SessionResult::NoConnectivity, Some(e))
            }
        };

        // ── Tuning ───────────────────────────────────────────────
        if self.config.tuning.enabled {
            self.transition(SessionState::Tuning);
            self.progress.tuning = Some(self.tuner.tune(name).await);
        }

        (result, error)
    }

    /// Settle an ambiguous selection: the preferred name when it is one
    /// of the candidates, otherwise whatever the operator picks.
    async fn resolve(&self, selection: Selection) -> Result<InterfaceCandidate, CoreError> {
        let candidates = match selection {
            Selection::Selected(candidate) => return Ok(candidate),
            Selection::NotDetected => return Err(CoreError::InterfaceNotDetected),
            Selection::Ambiguous(candidates) => candidates,
        };

        if let Some(preferred) = &self.config.preferred_interface {
            if let Some(candidate) = candidates.iter().find(|c| &c.name == preferred) {
                info!(interface = %preferred, "using preferred interface");
                return Ok(candidate.clone());
            }
            warn!(interface = %preferred, "preferred interface is not a candidate");
        }

        match self.approver.choose_interface(&candidates).await? {
            Some(name) => candidates
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .ok_or_else(|| CoreError::Rejected {
                    message: format!("{name} is not one of the candidate interfaces"),
                }),
            None => Err(CoreError::AmbiguousInterface { candidates }),
        }
    }

    /// Runs on every path. Failures are logged, never raised. Only a
    /// backup this session wrote is restored.
    fn cleanup(&mut self, result: &SessionResult) -> RestoreOutcome {
        self.transition(SessionState::CleaningUp);
        let resolver = self.configurator.resolver();

        let keep = self.config.keep_dns_on_success && result.is_success() && resolver.has_backup();
        let outcome = if self.leftover_backup {
            warn!(
                backup = %resolver.backup().display(),
                "earlier resolver backup left in place, run `revtether restore-dns`"
            );
            RestoreOutcome::Leftover
        } else if keep {
            info!(
                backup = %resolver.backup().display(),
                "keeping tether DNS, run `revtether restore-dns` to undo"
            );
            RestoreOutcome::Kept
        } else {
            resolver.restore()
        };

        resolver.remove_staging();
        self.artifacts.remove_all();
        outcome
    }
}

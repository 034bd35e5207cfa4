//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use revtether_config::ConfigError;
use revtether_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("No Android device connected")]
    #[diagnostic(
        code(revtether::no_device),
        help(
            "Plug the phone in with a data cable and enable USB debugging\n\
             (Settings > Developer options). Check with: adb devices"
        )
    )]
    NoDevice,

    #[error("More than one device connected: {ids}")]
    #[diagnostic(
        code(revtether::ambiguous_device),
        help("Disconnect all but the phone you want to tether through.")
    )]
    AmbiguousDevice { ids: String },

    #[error("Device {device} has not authorized this computer")]
    #[diagnostic(
        code(revtether::unauthorized),
        help(
            "Unlock the phone and accept the \"Allow USB debugging?\" prompt,\n\
             then run again. `revtether devices` shows the current state."
        )
    )]
    Unauthorized { device: String },

    // ── Activation ───────────────────────────────────────────────────
    #[error("No tethering interface appeared")]
    #[diagnostic(
        code(revtether::no_interface),
        help(
            "Make sure mobile data is on, then try a longer settle delay:\n\
             revtether start --settle 10"
        )
    )]
    InterfaceNotDetected,

    #[error("Several interfaces could be the tether: {candidates}")]
    #[diagnostic(
        code(revtether::ambiguous_interface),
        help("Pick one explicitly: revtether start --interface <NAME>")
    )]
    AmbiguousInterface { candidates: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Network configuration failed: {message}")]
    #[diagnostic(
        code(revtether::configuration),
        help("Changing addresses and routes needs root. Run with -vv to see each command.")
    )]
    Configuration { message: String },

    #[error("Tether configured but {target} is unreachable")]
    #[diagnostic(code(revtether::no_connectivity), help("{diagnostics}"))]
    NoConnectivity { target: String, diagnostics: String },

    // ── Host tools ───────────────────────────────────────────────────
    #[error("{operation} failed: {message}")]
    #[diagnostic(
        code(revtether::host),
        help("Check that adb and iproute2 are installed and on PATH.")
    )]
    Host { operation: String, message: String },

    #[error("{message}")]
    #[diagnostic(code(revtether::rejected))]
    Rejected { message: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(revtether::internal))]
    Internal(String),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(revtether::validation))]
    Validation { field: String, reason: String },

    // ── Configuration file ───────────────────────────────────────────
    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(
        code(revtether::config_invalid),
        help("Fix the value in {path}, or inspect it with: revtether config show")
    )]
    ConfigInvalid {
        field: String,
        reason: String,
        path: String,
    },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(revtether::config_exists),
        help("Use: revtether config init --force")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(revtether::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(revtether::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(revtether::output))]
    Output(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the config path to validation failures.
    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::ConfigInvalid {
                field,
                reason,
                path: path.display().to_string(),
            },
            other => other.into(),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::AlreadyExists { path } => CliError::ConfigExists {
                path: path.display().to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoDevice => CliError::NoDevice,

            CoreError::AmbiguousDevice { ids } => CliError::AmbiguousDevice {
                ids: ids.join(", "),
            },

            CoreError::Authorization { device } => CliError::Unauthorized { device },

            CoreError::InterfaceNotDetected => CliError::InterfaceNotDetected,

            CoreError::AmbiguousInterface { candidates } => CliError::AmbiguousInterface {
                candidates: candidates
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            },

            CoreError::Connectivity {
                target,
                diagnostics,
            } => CliError::NoConnectivity {
                target: target.to_string(),
                diagnostics: diagnostics.to_string(),
            },

            e @ (CoreError::InterfaceNotFound { .. }
            | CoreError::AddressAssignment { .. }
            | CoreError::RouteAssignment { .. }
            | CoreError::Verification { .. }) => CliError::Configuration {
                message: e.to_string(),
            },

            CoreError::Host { operation, message } => CliError::Host { operation, message },

            CoreError::Rejected { message } => CliError::Rejected { message },

            CoreError::Io(e) => CliError::Io(e),

            CoreError::Internal(msg) => CliError::Internal(msg),
        }
    }
}

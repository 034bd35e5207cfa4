// ── Core error types ──
//
// Domain errors for a tethering session. Consumers never see process
// exit codes or parse failures from the host layer directly -- the
// host crate translates those into `Host` or `Io` variants.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::model::{Diagnostics, InterfaceCandidate};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("No Android device connected")]
    NoDevice,

    #[error("Multiple devices connected: {}", ids.join(", "))]
    AmbiguousDevice { ids: Vec<String> },

    #[error("Device {device} did not authorize this host")]
    Authorization { device: String },

    // ── Activation errors ────────────────────────────────────────────
    #[error("No tethering interface appeared after enabling RNDIS")]
    InterfaceNotDetected,

    #[error("Several interfaces could be the tether: {}", names(candidates))]
    AmbiguousInterface { candidates: Vec<InterfaceCandidate> },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Interface {name} does not exist")]
    InterfaceNotFound { name: String },

    #[error("Failed to assign {address} to {interface}: {message}")]
    AddressAssignment {
        interface: String,
        address: String,
        message: String,
    },

    #[error("Failed to add default route via {gateway} on {interface}: {message}")]
    RouteAssignment {
        interface: String,
        gateway: Ipv4Addr,
        message: String,
    },

    #[error("Verification of {what} failed: expected {expected}, found {found}")]
    Verification {
        what: String,
        expected: String,
        found: String,
    },

    #[error("Cannot reach {target} through the tether")]
    Connectivity {
        target: Ipv4Addr,
        diagnostics: Box<Diagnostics>,
    },

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("{operation} failed: {message}")]
    Host { operation: String, message: String },

    #[error("Operation rejected: {message}")]
    Rejected { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a failed collaborator call.
    pub fn host(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Host {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error came out of the configuration step and is
    /// therefore eligible for the one-shot interface cycle retry.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InterfaceNotFound { .. }
                | Self::AddressAssignment { .. }
                | Self::RouteAssignment { .. }
                | Self::Verification { .. }
                | Self::Host { .. }
                | Self::Io(_)
        )
    }
}

fn names(candidates: &[InterfaceCandidate]) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

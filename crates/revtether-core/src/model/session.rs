use serde::{Deserialize, Serialize};
use strum::Display;

/// Where the orchestrator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Idle,
    DiscoveringDevice,
    Authorizing,
    Activating,
    DetectingInterface,
    Configuring,
    Tuning,
    Done,
    Aborted,
    CleaningUp,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Human label for progress output.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::DiscoveringDevice => "Looking for a device",
            Self::Authorizing => "Checking debug authorization",
            Self::Activating => "Switching the phone to RNDIS tethering",
            Self::DetectingInterface => "Waiting for the tether interface",
            Self::Configuring => "Configuring address, route and DNS",
            Self::Tuning => "Tuning TCP, MTU and USB power",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
            Self::CleaningUp => "Cleaning up",
        }
    }
}

/// Terminal outcome of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case", tag = "result")]
#[strum(serialize_all = "kebab-case")]
pub enum SessionResult {
    Success,
    /// Address, route and DNS are in place but the probe got no answer.
    NoConnectivity,
    /// The operator declined before anything was changed.
    Declined,
    DeviceNotFound,
    AmbiguousDevice { ids: Vec<String> },
    AuthorizationFailed,
    /// The remote commands or interface enumeration failed outright.
    ActivationFailed,
    InterfaceNotDetected,
    ConfigurationFailed,
    ConfigurationFailedAfterRetry,
    Interrupted,
}

impl SessionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Process exit code: 0 for success or a declined prompt, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success | Self::Declined => 0,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(SessionResult::Success.exit_code(), 0);
        assert_eq!(SessionResult::Declined.exit_code(), 0);
        assert_eq!(SessionResult::DeviceNotFound.exit_code(), 1);
        assert_eq!(SessionResult::NoConnectivity.exit_code(), 1);
        assert_eq!(
            SessionResult::AmbiguousDevice {
                ids: vec!["a".into(), "b".into()]
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn result_names() {
        assert_eq!(
            SessionResult::ConfigurationFailedAfterRetry.to_string(),
            "configuration-failed-after-retry"
        );
        assert_eq!(SessionState::DetectingInterface.to_string(), "detecting_interface");
    }
}

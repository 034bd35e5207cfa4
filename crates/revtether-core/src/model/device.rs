use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Whether the phone has accepted this host's debug key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthorizationState {
    Authorized,
    Unauthorized,
}

impl AuthorizationState {
    /// Map the state column of `adb devices`. Only `device` means the
    /// shell is usable; `unauthorized`, `offline` and friends are not.
    pub fn from_adb_state(state: &str) -> Self {
        if state.trim() == "device" {
            Self::Authorized
        } else {
            Self::Unauthorized
        }
    }
}

/// A phone visible over the debug bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub authorization: AuthorizationState,
    /// Marketing model name (`ro.product.model`), informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Android release (`ro.build.version.release`), informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Device {
    pub fn new(id: impl Into<String>, authorization: AuthorizationState) -> Self {
        Self {
            id: id.into(),
            authorization,
            model: None,
            version: None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.authorization == AuthorizationState::Authorized
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        match (&self.model, &self.version) {
            (Some(model), Some(version)) => write!(f, " ({model}, Android {version})"),
            (Some(model), None) => write!(f, " ({model})"),
            (None, Some(version)) => write!(f, " (Android {version})"),
            (None, None) => Ok(()),
        }
    }
}

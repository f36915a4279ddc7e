//! Hypervisor-reported device state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a device as last reported by the hypervisor.
///
/// The hypervisor may report states this crate does not know about; those
/// are kept verbatim in [`DeviceState::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceState {
    /// Device is idle and usable.
    Free,
    /// Device is in use on the hypervisor side.
    Active,
    /// Device is offline.
    Offline,
    /// Device disappeared from the hypervisor's device list.
    NotFound,
    /// Any other reported state.
    Other(String),
}

impl DeviceState {
    /// Return the state as stored in the `fcp.state` column.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::Offline => "offline",
            Self::NotFound => "notfound",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for DeviceState {
    fn from(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "free" => Self::Free,
            "active" => Self::Active,
            "offline" => Self::Offline,
            "notfound" => Self::NotFound,
            _ => Self::Other(raw.to_string()),
        }
    }
}

impl From<String> for DeviceState {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<DeviceState> for String {
    fn from(state: DeviceState) -> String {
        state.as_str().to_string()
    }
}

impl FromStr for DeviceState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

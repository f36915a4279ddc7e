//! Device selection policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Which allocation strategy picks devices from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Use the device at the same sorted position on every path.
    SameIndex,
    /// Balance load across PCHIDs by remaining capacity.
    #[default]
    Weighted,
}

impl SelectionPolicy {
    /// Return the policy as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameIndex => "same_index",
            Self::Weighted => "weighted",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "same_index" => Ok(Self::SameIndex),
            "weighted" => Ok(Self::Weighted),
            other => Err(AppError::invalid_input(format!(
                "Unknown selection policy: {other}"
            ))),
        }
    }
}

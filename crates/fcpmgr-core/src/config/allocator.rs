//! Device selection configuration.

use serde::{Deserialize, Serialize};

use crate::types::policy::SelectionPolicy;

/// Settings for the FCP allocation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Pick devices at the same index on every path instead of the
    /// weighted PCHID selection.
    #[serde(default)]
    pub same_index_policy: bool,
    /// Per-PCHID `max` assumed by the CLI when no capacity snapshot is
    /// supplied.
    #[serde(default = "default_capacity_max")]
    pub default_capacity_max: i64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            same_index_policy: false,
            default_capacity_max: default_capacity_max(),
        }
    }
}

impl AllocatorConfig {
    /// The selection policy configured for this host.
    pub fn policy(&self) -> SelectionPolicy {
        if self.same_index_policy {
            SelectionPolicy::SameIndex
        } else {
            SelectionPolicy::Weighted
        }
    }
}

fn default_capacity_max() -> i64 {
    128
}

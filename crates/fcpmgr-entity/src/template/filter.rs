//! Template query filters.

use serde::{Deserialize, Serialize};

/// Which templates a listing returns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFilter {
    /// Every template.
    #[default]
    All,
    /// Templates with the given ids.
    Ids(Vec<String>),
    /// Templates the guest's devices were allocated from.
    Assigner(String),
    /// Templates bound to these storage providers; `["all"]` means every
    /// bound template.
    StorageProviders(Vec<String>),
    /// Templates with the given host-default flag.
    HostDefault(bool),
}

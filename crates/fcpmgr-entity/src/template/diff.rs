//! PCHID changes produced by a template edit.

use serde::{Deserialize, Serialize};

use super::model::TemplateInfo;

/// PCHIDs the edit brought into the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PchidsAdded {
    /// Every added PCHID.
    pub all: Vec<String>,
    /// Added PCHIDs no template used before the edit.
    pub first_used_by_templates: Vec<String>,
}

/// PCHIDs the edit removed from the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PchidsDeleted {
    /// Every removed PCHID.
    pub all: Vec<String>,
    /// Removed PCHIDs no template uses after the edit.
    pub not_exist_in_any_template: Vec<String>,
}

/// Sorted PCHID sets before/after a template edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PchidDiff {
    /// Added PCHIDs.
    pub add: PchidsAdded,
    /// Removed PCHIDs.
    pub delete: PchidsDeleted,
    /// PCHIDs of the template after the edit.
    pub all: Vec<String>,
}

/// Result of a successful template edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEditOutcome {
    /// The updated template.
    pub template: TemplateInfo,
    /// PCHID changes.
    pub pchids: PchidDiff,
}

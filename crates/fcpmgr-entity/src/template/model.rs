//! Template row model and its caller-facing view.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored minimum path count meaning "all configured paths".
pub const UNSET_MIN_PATHS: i64 = -1;

/// One row of the `template` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Template {
    /// Template id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Whether this is the host default template.
    pub is_default: bool,
    /// Minimum usable paths, or [`UNSET_MIN_PATHS`].
    pub min_fcp_paths_count: i64,
}

impl Template {
    /// Resolve the minimum path count against the template's path count.
    pub fn resolved_min_paths(&self, path_count: usize) -> usize {
        if self.min_fcp_paths_count == UNSET_MIN_PATHS {
            path_count
        } else {
            usize::try_from(self.min_fcp_paths_count).unwrap_or(path_count)
        }
    }
}

/// Template basic info as returned by queries and mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Template id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Whether this is the host default template.
    pub host_default: bool,
    /// Storage providers defaulting to this template.
    pub storage_providers: Vec<String>,
    /// Minimum usable paths, resolved against the path count.
    pub min_fcp_paths_count: usize,
    /// Number of configured paths.
    pub path_count: usize,
}

impl TemplateInfo {
    /// Build the view from a row and its related data.
    pub fn new(template: Template, storage_providers: Vec<String>, path_count: usize) -> Self {
        let min_fcp_paths_count = template.resolved_min_paths(path_count);
        Self {
            id: template.id,
            name: template.name,
            description: template.description,
            host_default: template.is_default,
            storage_providers,
            min_fcp_paths_count,
            path_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(min: i64) -> Template {
        Template {
            id: "t1".into(),
            name: "t1".into(),
            description: String::new(),
            is_default: false,
            min_fcp_paths_count: min,
        }
    }

    #[test]
    fn test_unset_min_resolves_to_path_count() {
        assert_eq!(template(UNSET_MIN_PATHS).resolved_min_paths(3), 3);
        assert_eq!(template(2).resolved_min_paths(3), 2);
    }

    #[test]
    fn test_info_carries_resolved_min() {
        let info = TemplateInfo::new(template(UNSET_MIN_PATHS), vec!["sp1".into()], 2);
        assert_eq!(info.min_fcp_paths_count, 2);
        assert_eq!(info.storage_providers, vec!["sp1".to_string()]);
    }
}

//! Template create/edit requests.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use fcpmgr_core::error::AppError;
use fcpmgr_core::types::{DevicesByPath, FcpId, expand_fcp_list};

/// Devices of a template, either as a path map or in the textual form
/// `"0011-0013;0015;0017-0018"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceList {
    /// Operator text form, one `;`-separated segment per path.
    Text(String),
    /// Explicit devices per 0-based path.
    Paths(DevicesByPath),
}

impl Default for DeviceList {
    fn default() -> Self {
        Self::Paths(DevicesByPath::new())
    }
}

impl DeviceList {
    /// Resolve into devices per path, validating the layout.
    ///
    /// Paths must be numbered `0..n` without gaps, none may be empty, and a
    /// device may occupy only one path.
    pub fn resolve(&self) -> Result<DevicesByPath, AppError> {
        let paths = match self {
            Self::Text(raw) => return expand_fcp_list(raw),
            Self::Paths(paths) => paths,
        };

        let mut seen: BTreeSet<&FcpId> = BTreeSet::new();
        for (expected, (path, devices)) in paths.iter().enumerate() {
            if *path as usize != expected {
                return Err(AppError::invalid_input(format!(
                    "Template paths must be numbered from 0 without gaps, found path {path}"
                )));
            }
            if devices.is_empty() {
                return Err(AppError::invalid_input(format!("Path {path} has no FCP devices")));
            }
            for id in devices {
                if !seen.insert(id) {
                    return Err(AppError::invalid_input(format!(
                        "FCP device {id} appears in more than one path"
                    )));
                }
            }
        }
        Ok(paths.clone())
    }
}

/// Request to create a multipath template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    /// Template id; a UUID is generated when absent.
    #[validate(length(min = 1, max = 36))]
    pub id: Option<String>,
    /// Display name.
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    #[validate(length(max = 255))]
    pub description: String,
    /// Devices per path.
    #[serde(default)]
    pub devices: DeviceList,
    /// Make this the host default template.
    #[serde(default)]
    pub host_default: bool,
    /// Storage providers that default to this template.
    #[serde(default)]
    pub default_sp_list: Vec<String>,
    /// Minimum usable paths; `None` means all paths.
    pub min_fcp_paths_count: Option<i64>,
}

/// Request to edit a template. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EditTemplateRequest {
    /// New display name.
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    /// New description.
    #[validate(length(max = 255))]
    pub description: Option<String>,
    /// New devices per path; an empty list removes every device.
    pub devices: Option<DeviceList>,
    /// New host-default flag.
    pub host_default: Option<bool>,
    /// Storage providers that default to this template afterwards.
    pub default_sp_list: Option<Vec<String>>,
    /// New minimum path count; `-1` means all paths.
    pub min_fcp_paths_count: Option<i64>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<FcpId> {
        ids.iter().map(|s| FcpId::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_text_list_resolves() {
        let paths = DeviceList::Text("1a00-1a01;1b00".into()).resolve().unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[&1], set(&["1B00"]));
    }

    #[test]
    fn test_path_map_must_be_contiguous() {
        let mut paths = BTreeMap::new();
        paths.insert(0, set(&["1A00"]));
        paths.insert(2, set(&["1B00"]));
        assert!(DeviceList::Paths(paths).resolve().is_err());
    }

    #[test]
    fn test_path_map_rejects_shared_device() {
        let mut paths = BTreeMap::new();
        paths.insert(0, set(&["1A00"]));
        paths.insert(1, set(&["1a00"]));
        assert!(DeviceList::Paths(paths).resolve().is_err());
    }

    #[test]
    fn test_untagged_json_forms() {
        let text: DeviceList = serde_json::from_str("\"1a00;1b00\"").unwrap();
        assert!(matches!(text, DeviceList::Text(_)));
        let paths: DeviceList = serde_json::from_str(r#"{"0": ["1a00"], "1": ["1b00"]}"#).unwrap();
        assert_eq!(paths.resolve().unwrap().len(), 2);
    }

    #[test]
    fn test_name_length_validated() {
        let request = CreateTemplateRequest {
            name: "x".repeat(129),
            ..CreateTemplateRequest::default()
        };
        assert!(request.validate().is_err());
    }
}

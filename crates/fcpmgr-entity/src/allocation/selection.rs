//! Output of a selection strategy.

use serde::{Deserialize, Serialize};

use fcpmgr_core::types::FcpId;

/// A device chosen for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedDevice {
    /// Path index within the template.
    pub path: u32,
    /// Device number.
    pub fcp_id: FcpId,
    /// Virtual (NPIV) port name.
    pub wwpn_npiv: String,
    /// Physical port name.
    pub wwpn_phy: String,
    /// Physical channel id.
    pub pchid: String,
}

/// Devices chosen for a guest, one per used path.
///
/// An empty device list is not an error: `reason` then explains why
/// nothing could be selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Chosen devices ordered by path.
    pub devices: Vec<SelectedDevice>,
    /// Diagnostic when `devices` is empty.
    pub reason: Option<String>,
}

impl Selection {
    /// A successful selection.
    pub fn found(mut devices: Vec<SelectedDevice>) -> Self {
        devices.sort_by_key(|d| d.path);
        Self {
            devices,
            reason: None,
        }
    }

    /// An empty selection with a diagnostic.
    pub fn empty(reason: impl Into<String>) -> Self {
        Self {
            devices: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// Whether no device was selected.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Chosen device ids in path order.
    pub fn fcp_ids(&self) -> Vec<FcpId> {
        self.devices.iter().map(|d| d.fcp_id.clone()).collect()
    }
}

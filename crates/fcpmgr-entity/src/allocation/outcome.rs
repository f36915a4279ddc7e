//! Result of allocating devices to a guest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fcpmgr_core::types::FcpId;

use super::selection::SelectedDevice;

/// Devices reserved for a guest from one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    /// Devices held for the guest, ordered by path. Empty when nothing
    /// could be selected.
    pub devices: Vec<SelectedDevice>,
    /// Whether this call reserved new devices.
    pub is_reserved_changed: bool,
    /// Template the devices come from.
    pub template_id: String,
    /// Number of paths configured in the template.
    pub path_count: usize,
    /// PCHID → devices on it.
    pub pchid_devices: BTreeMap<String, Vec<FcpId>>,
    /// Diagnostic when `devices` is empty.
    pub reason: Option<String>,
}

impl AllocationOutcome {
    /// Group devices by PCHID.
    pub fn group_by_pchid(devices: &[SelectedDevice]) -> BTreeMap<String, Vec<FcpId>> {
        let mut map: BTreeMap<String, Vec<FcpId>> = BTreeMap::new();
        for device in devices {
            map.entry(device.pchid.to_uppercase())
                .or_default()
                .push(device.fcp_id.clone());
        }
        map
    }
}

//! Bulk device facts reported by the hypervisor.

use serde::{Deserialize, Serialize};

use fcpmgr_core::types::FcpId;

/// Hypervisor-owned columns of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFacts {
    /// Device number.
    pub fcp_id: FcpId,
    /// Virtual (NPIV) port name.
    #[serde(default)]
    pub wwpn_npiv: String,
    /// Physical port name.
    #[serde(default)]
    pub wwpn_phy: String,
    /// Channel path id.
    #[serde(default)]
    pub chpid: String,
    /// Physical channel id.
    #[serde(default)]
    pub pchid: String,
    /// Reported state.
    #[serde(default)]
    pub state: String,
    /// Reported owner.
    #[serde(default)]
    pub owner: String,
}

/// Move a set of devices to a new state, e.g. `notfound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Devices to update.
    pub ids: Vec<FcpId>,
    /// New raw state.
    pub state: String,
}

/// One reconciliation batch, applied in a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncBatch {
    /// New devices.
    pub insert: Vec<DeviceFacts>,
    /// Refreshed facts of existing devices.
    pub update: Vec<DeviceFacts>,
    /// Devices that no longer exist.
    pub delete: Vec<FcpId>,
    /// State-only changes.
    pub state_changes: Vec<StateChange>,
}

impl SyncBatch {
    /// Whether the batch carries no work.
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty()
            && self.update.is_empty()
            && self.delete.is_empty()
            && self.state_changes.iter().all(|c| c.ids.is_empty())
    }
}

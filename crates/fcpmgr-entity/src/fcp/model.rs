//! FCP device row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use fcpmgr_core::types::FcpId;

use super::state::DeviceState;

/// One row of the `fcp` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FcpDevice {
    /// Device number, upper case.
    pub fcp_id: FcpId,
    /// Guest holding the device, or empty.
    pub assigner_id: String,
    /// Active attachments.
    pub connections: i64,
    /// 1 while reserved for `assigner_id`.
    pub reserved: i64,
    /// Virtual (NPIV) port name.
    pub wwpn_npiv: String,
    /// Physical port name.
    pub wwpn_phy: String,
    /// Channel path id, two hex digits.
    pub chpid: String,
    /// Physical channel id, four hex digits.
    pub pchid: String,
    /// Raw hypervisor state.
    pub state: String,
    /// Hypervisor-reported owner.
    pub owner: String,
    /// Template the device was allocated from, or empty.
    pub tmpl_id: String,
}

impl FcpDevice {
    /// Parsed hypervisor state.
    pub fn device_state(&self) -> DeviceState {
        DeviceState::from(self.state.as_str())
    }

    /// Whether the device is reserved.
    pub fn is_reserved(&self) -> bool {
        self.reserved != 0
    }

    /// Whether the device is reserved or attached.
    pub fn is_in_use(&self) -> bool {
        self.connections != 0 || self.reserved != 0
    }

    /// Whether the device can be handed out right now.
    pub fn is_available(&self) -> bool {
        self.connections == 0
            && self.reserved == 0
            && self.device_state() == DeviceState::Free
            && !self.wwpn_npiv.is_empty()
            && !self.wwpn_phy.is_empty()
    }
}

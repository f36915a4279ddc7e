//! Devices held by a guest, joined with their template path.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use fcpmgr_core::types::FcpId;

/// A device held by a guest together with its path in the template it was
/// allocated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AssignedDevice {
    /// Device number.
    pub fcp_id: FcpId,
    /// Path index within the template.
    pub path: i64,
    /// Physical channel id.
    pub pchid: String,
    /// Virtual (NPIV) port name.
    pub wwpn_npiv: String,
    /// Physical port name.
    pub wwpn_phy: String,
    /// Active attachments.
    pub connections: i64,
    /// 1 while reserved.
    pub reserved: i64,
}

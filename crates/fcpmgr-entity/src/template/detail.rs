//! Per-path template details and statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use fcpmgr_core::types::FcpId;

use super::model::TemplateInfo;

/// A mapped device joined with its `fcp` row, if one exists.
///
/// Devices can be mapped before the hypervisor reports them, so every
/// device column is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TemplateDeviceRow {
    /// Owning template.
    pub tmpl_id: String,
    /// Path index.
    pub path: i64,
    /// Device number from the mapping.
    pub fcp_id: FcpId,
    /// Guest holding the device.
    pub assigner_id: Option<String>,
    /// Active attachments.
    pub connections: Option<i64>,
    /// 1 while reserved.
    pub reserved: Option<i64>,
    /// Virtual (NPIV) port name.
    pub wwpn_npiv: Option<String>,
    /// Physical port name.
    pub wwpn_phy: Option<String>,
    /// Channel path id.
    pub chpid: Option<String>,
    /// Physical channel id.
    pub pchid: Option<String>,
    /// Raw hypervisor state.
    pub state: Option<String>,
    /// Hypervisor-reported owner.
    pub owner: Option<String>,
    /// Template the device was allocated from.
    pub allocated_tmpl_id: Option<String>,
}

impl TemplateDeviceRow {
    /// Whether the device has a row in `fcp`.
    pub fn exists(&self) -> bool {
        self.state.is_some()
    }

    /// Whether the device satisfies the availability predicate.
    pub fn is_available(&self) -> bool {
        self.connections == Some(0)
            && self.reserved == Some(0)
            && self.state.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("free"))
            && self.wwpn_npiv.as_deref().is_some_and(|w| !w.is_empty())
            && self.wwpn_phy.as_deref().is_some_and(|w| !w.is_empty())
    }
}

/// Usage statistics of one template path. Device sets are shrunk range
/// strings such as `"1A01 - 1A03, 1B05"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStatistics {
    /// Every mapped device.
    pub total: String,
    /// Number of mapped devices.
    pub total_count: usize,
    /// Available devices.
    pub available: String,
    /// Number of available devices.
    pub available_count: usize,
    /// Reserved and connected.
    pub allocated: String,
    /// Reserved without connections.
    pub reserve_only: String,
    /// Connected without reservation.
    pub connection_only: String,
    /// Active on the hypervisor with no local usage, device → owner.
    pub unallocated_but_active: BTreeMap<String, String>,
    /// Locally in use while the hypervisor reports free.
    pub allocated_but_free: String,
    /// Mapped but unknown to the hypervisor.
    pub notfound: String,
    /// Offline devices.
    pub offline: String,
    /// CHPID → devices.
    pub chpids: BTreeMap<String, String>,
}

/// A template with its raw device rows and statistics per path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDetail {
    /// Basic info.
    #[serde(flatten)]
    pub info: TemplateInfo,
    /// Device rows keyed by path.
    pub raw: BTreeMap<u32, Vec<TemplateDeviceRow>>,
    /// Statistics keyed by path.
    pub statistics: BTreeMap<u32, PathStatistics>,
}

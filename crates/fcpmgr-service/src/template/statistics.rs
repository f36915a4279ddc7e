//! Per-path usage statistics of template devices.

use std::collections::BTreeMap;

use fcpmgr_core::types::{FcpId, shrink_fcp_list};
use fcpmgr_entity::fcp::DeviceState;
use fcpmgr_entity::template::{PathStatistics, TemplateDeviceRow};

/// Classify the devices of one path.
pub fn path_statistics(rows: &[TemplateDeviceRow]) -> PathStatistics {
    let mut total = Vec::new();
    let mut available = Vec::new();
    let mut allocated = Vec::new();
    let mut reserve_only = Vec::new();
    let mut connection_only = Vec::new();
    let mut allocated_but_free = Vec::new();
    let mut notfound = Vec::new();
    let mut offline = Vec::new();
    let mut unallocated_but_active = BTreeMap::new();
    let mut chpids: BTreeMap<String, Vec<&FcpId>> = BTreeMap::new();

    for row in rows {
        total.push(&row.fcp_id);

        let state = row.state.as_deref().map(DeviceState::from);
        match state {
            None | Some(DeviceState::NotFound) => notfound.push(&row.fcp_id),
            Some(DeviceState::Offline) => offline.push(&row.fcp_id),
            _ => {}
        }
        if !row.exists() {
            continue;
        }

        if row.is_available() {
            available.push(&row.fcp_id);
        }

        let reserved = row.reserved.unwrap_or_default() != 0;
        let connected = row.connections.unwrap_or_default() != 0;
        match (reserved, connected) {
            (true, true) => allocated.push(&row.fcp_id),
            (true, false) => reserve_only.push(&row.fcp_id),
            (false, true) => connection_only.push(&row.fcp_id),
            (false, false) => {
                if state == Some(DeviceState::Active) {
                    unallocated_but_active.insert(
                        row.fcp_id.to_string(),
                        row.owner.clone().unwrap_or_default(),
                    );
                }
            }
        }
        if (reserved || connected) && state == Some(DeviceState::Free) {
            allocated_but_free.push(&row.fcp_id);
        }

        if let Some(chpid) = row.chpid.as_deref().filter(|c| !c.is_empty()) {
            chpids.entry(chpid.to_uppercase()).or_default().push(&row.fcp_id);
        }
    }

    PathStatistics {
        total: shrink_fcp_list(total.iter().copied()),
        total_count: total.len(),
        available: shrink_fcp_list(available.iter().copied()),
        available_count: available.len(),
        allocated: shrink_fcp_list(allocated),
        reserve_only: shrink_fcp_list(reserve_only),
        connection_only: shrink_fcp_list(connection_only),
        unallocated_but_active,
        allocated_but_free: shrink_fcp_list(allocated_but_free),
        notfound: shrink_fcp_list(notfound),
        offline: shrink_fcp_list(offline),
        chpids: chpids
            .into_iter()
            .map(|(chpid, ids)| (chpid, shrink_fcp_list(ids)))
            .collect(),
    }
}

//! In-memory view of one template's devices, read once per selection.

use std::collections::{BTreeMap, BTreeSet};

use fcpmgr_entity::allocation::SelectedDevice;
use fcpmgr_entity::template::TemplateDeviceRow;

/// Devices of a template grouped by path, each path sorted by device id.
#[derive(Debug, Clone)]
pub struct TemplateInventory {
    template_id: String,
    min_paths: usize,
    paths: BTreeMap<u32, Vec<TemplateDeviceRow>>,
}

impl TemplateInventory {
    /// Group mapping rows of one template by path.
    ///
    /// `min_paths` is the resolved minimum path count of the template.
    pub fn new<I>(template_id: impl Into<String>, min_paths: usize, rows: I) -> Self
    where
        I: IntoIterator<Item = TemplateDeviceRow>,
    {
        let mut paths: BTreeMap<u32, Vec<TemplateDeviceRow>> = BTreeMap::new();
        for row in rows {
            paths.entry(path_index(&row)).or_default().push(row);
        }
        for devices in paths.values_mut() {
            devices.sort_by(|a, b| a.fcp_id.cmp(&b.fcp_id));
        }
        Self {
            template_id: template_id.into(),
            min_paths,
            paths,
        }
    }

    /// Template the devices belong to.
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Resolved minimum path count.
    pub fn min_paths(&self) -> usize {
        self.min_paths
    }

    /// Number of configured paths.
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Whether no device is mapped into the template.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Devices per path.
    pub fn paths(&self) -> &BTreeMap<u32, Vec<TemplateDeviceRow>> {
        &self.paths
    }

    /// Available devices of one path on one PCHID.
    pub fn available_on(&self, path: u32, pchid: &str) -> Vec<&TemplateDeviceRow> {
        self.paths
            .get(&path)
            .map(|devices| {
                devices
                    .iter()
                    .filter(|d| d.is_available() && pchid_of(d).eq_ignore_ascii_case(pchid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// PCHIDs holding at least one available device, per path. Paths
    /// without available devices are omitted.
    pub fn free_pchids_per_path(&self) -> BTreeMap<u32, Vec<String>> {
        self.paths
            .iter()
            .filter_map(|(path, devices)| {
                let pchids: BTreeSet<String> = devices
                    .iter()
                    .filter(|d| d.is_available())
                    .map(|d| pchid_of(d).to_uppercase())
                    .collect();
                (!pchids.is_empty()).then(|| (*path, pchids.into_iter().collect()))
            })
            .collect()
    }
}

/// PCHID of a mapped device, empty when unknown.
pub(crate) fn pchid_of(row: &TemplateDeviceRow) -> &str {
    row.pchid.as_deref().unwrap_or_default()
}

fn path_index(row: &TemplateDeviceRow) -> u32 {
    u32::try_from(row.path).unwrap_or_default()
}

/// Convert an available mapping row into a selection entry.
pub(crate) fn to_selected(row: &TemplateDeviceRow) -> SelectedDevice {
    SelectedDevice {
        path: path_index(row),
        fcp_id: row.fcp_id.clone(),
        wwpn_npiv: row.wwpn_npiv.clone().unwrap_or_default(),
        wwpn_phy: row.wwpn_phy.clone().unwrap_or_default(),
        pchid: pchid_of(row).to_uppercase(),
    }
}

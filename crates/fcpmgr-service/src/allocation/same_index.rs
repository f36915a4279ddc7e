//! Same-index selection: the i-th device (by id) of every path.

use rand::RngCore;
use rand::seq::IndexedRandom;
use tracing::{error, info};

use fcpmgr_core::types::{CapacitySnapshot, SelectionPolicy};
use fcpmgr_entity::allocation::Selection;
use fcpmgr_entity::template::TemplateDeviceRow;

use super::inventory::{TemplateInventory, pchid_of, to_selected};
use super::strategy::{SelectionStrategy, no_devices_reason};
use super::weight::{CapacityShortfall, combination_weight};

/// Pairs devices across paths by their position in id order.
///
/// Every path is always used; the minimum path count is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameIndexSelector;

impl SelectionStrategy for SameIndexSelector {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::SameIndex
    }

    fn select(
        &self,
        inventory: &TemplateInventory,
        capacity: &CapacitySnapshot,
        rng: &mut dyn RngCore,
    ) -> Selection {
        let template_id = inventory.template_id();
        if inventory.is_empty() {
            error!(template_id = %template_id, "Template has no FCP devices");
            return Selection::empty(no_devices_reason(template_id));
        }

        let paths = inventory.paths();
        let busy_paths = paths
            .values()
            .filter(|devices| !devices.iter().any(TemplateDeviceRow::is_available))
            .count();
        if busy_paths > 0 {
            error!(
                template_id = %template_id,
                busy_paths,
                total_paths = paths.len(),
                "Free path count is less than total path count"
            );
            return Selection::empty(format!(
                "With the same-index policy every path of the template must have free FCP \
                 devices, but {busy_paths} path(s) of FCP multipath template \
                 (id={template_id}) have none. To use this template, add free FCP devices \
                 by editing the template."
            ));
        }

        let depth = paths.values().map(Vec::len).min().unwrap_or(0);
        let mut groups: Vec<Vec<&TemplateDeviceRow>> = (0..depth)
            .filter_map(|index| {
                let group: Vec<&TemplateDeviceRow> =
                    paths.values().map(|devices| &devices[index]).collect();
                group.iter().all(|d| d.is_available()).then_some(group)
            })
            .collect();

        if groups.is_empty() {
            let reason = format!(
                "No FCP device combination of FCP multipath template (id={template_id}) \
                 matches the same index policy. To use this template, add free FCP devices \
                 by editing the template."
            );
            error!(template_id = %template_id, "{reason}");
            return Selection::empty(reason);
        }

        let mut shortfall = CapacityShortfall::default();
        groups.retain(|group| {
            combination_weight(group.iter().map(|d| pchid_of(d)), capacity, &mut shortfall)
                .is_sufficient()
        });

        match groups.choose(rng) {
            Some(group) => {
                info!(
                    template_id = %template_id,
                    candidates = groups.len(),
                    first = %group[0].fcp_id,
                    "Selected same-index FCP devices"
                );
                Selection::found(group.iter().map(|d| to_selected(d)).collect())
            }
            None => {
                let reason = shortfall.describe(template_id);
                error!(template_id = %template_id, "{reason}");
                Selection::empty(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::super::inventory::fixtures::{busy_row, free_row};
    use super::*;

    fn select(inventory: &TemplateInventory, capacity: &CapacitySnapshot) -> Selection {
        let mut rng = StdRng::seed_from_u64(7);
        SameIndexSelector.select(inventory, capacity, &mut rng)
    }

    fn ids(selection: &Selection) -> Vec<String> {
        selection
            .devices
            .iter()
            .map(|d| d.fcp_id.to_string())
            .collect()
    }

    #[test]
    fn test_empty_template_has_reason() {
        let inventory = TemplateInventory::new("t1", 0, Vec::new());
        let selection = select(&inventory, &CapacitySnapshot::new());
        assert!(selection.is_empty());
        assert!(selection.reason.unwrap().contains("No FCP device exists"));
    }

    #[test]
    fn test_path_without_free_device_has_reason() {
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![free_row(0, "1A00", "AAAA"), busy_row(1, "1B00", "BBBB")],
        );
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 8).with("BBBB", 0, 8);
        let selection = select(&inventory, &capacity);
        assert!(selection.is_empty());
        assert!(selection.reason.unwrap().contains("1 path(s)"));
    }

    #[test]
    fn test_pairs_only_matching_positions() {
        // Position 0 is busy on path 1, so only position 1 pairs up.
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![
                free_row(0, "1A00", "AAAA"),
                free_row(0, "1A01", "AAAA"),
                busy_row(1, "1B00", "BBBB"),
                free_row(1, "1B01", "BBBB"),
            ],
        );
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 8).with("BBBB", 0, 8);
        let selection = select(&inventory, &capacity);
        assert_eq!(ids(&selection), vec!["1A01", "1B01"]);
        assert_eq!(selection.devices[1].path, 1);
    }

    #[test]
    fn test_no_matching_position() {
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![
                free_row(0, "1A00", "AAAA"),
                busy_row(0, "1A01", "AAAA"),
                busy_row(1, "1B00", "BBBB"),
                free_row(1, "1B01", "BBBB"),
            ],
        );
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 8).with("BBBB", 0, 8);
        let selection = select(&inventory, &capacity);
        assert!(selection.is_empty());
        assert!(selection.reason.unwrap().contains("same index policy"));
    }

    #[test]
    fn test_capacity_filters_groups() {
        // Both paths of group 0 share CCCC which has room for one device.
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![
                free_row(0, "1A00", "CCCC"),
                free_row(1, "1B00", "CCCC"),
                free_row(0, "1A01", "AAAA"),
                free_row(1, "1B01", "BBBB"),
            ],
        );
        let capacity = CapacitySnapshot::new()
            .with("AAAA", 0, 4)
            .with("BBBB", 0, 4)
            .with("CCCC", 3, 4);
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = SameIndexSelector.select(&inventory, &capacity, &mut rng);
            assert_eq!(ids(&selection), vec!["1A01", "1B01"]);
        }
    }

    #[test]
    fn test_capacity_exhausted_names_pchids() {
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![free_row(0, "1A00", "AAAA"), free_row(1, "1B00", "BBBB")],
        );
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 4).with("BBBB", 1, 1);
        let selection = select(&inventory, &capacity);
        assert!(selection.is_empty());
        assert!(selection.reason.unwrap().contains("BBBB: 0"));
    }
}

//! Weighted selection: balance allocations across PCHIDs.
//!
//! For the largest feasible number of paths, every subset of free paths and
//! every choice of one PCHID per path is weighed against the capacity
//! snapshot. The heaviest combinations win, ties go to the ones spreading
//! over the most distinct PCHIDs, and the final pick is random.

use std::collections::{BTreeMap, BTreeSet};

use rand::RngCore;
use rand::seq::IndexedRandom;
use tracing::{debug, error, info};

use fcpmgr_core::types::{CapacitySnapshot, SelectionPolicy};
use fcpmgr_entity::allocation::Selection;

use super::inventory::{TemplateInventory, to_selected};
use super::strategy::{SelectionStrategy, no_devices_reason};
use super::weight::{CapacityShortfall, Weight, combination_weight};

/// One PCHID chosen per path, in path order.
type PchidCombination = Vec<(u32, String)>;

/// Load-balancing selector honoring the template's minimum path count.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSelector;

impl SelectionStrategy for WeightedSelector {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::Weighted
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

        let free = inventory.free_pchids_per_path();
        if free.is_empty() {
            let reason = format!(
                "No free FCP device left in FCP multipath template (id={template_id}). To use \
                 this template, add free FCP devices by editing the template. For load balance \
                 across PCHIDs, add the same number of FCP devices per PCHID."
            );
            error!(template_id = %template_id, "{reason}");
            return Selection::empty(reason);
        }

        let min_paths = inventory.min_paths().max(1);
        let free_paths = free.len();
        info!(
            template_id = %template_id,
            min_paths,
            total_paths = inventory.path_count(),
            free_paths,
            "Selecting FCP devices by PCHID weight"
        );
        if free_paths < min_paths {
            let reason = format!(
                "The count of paths with free FCP devices must not be less than the minimum \
                 path count. The free path count of FCP multipath template (id={template_id}) \
                 is {free_paths}, which is less than its minimum path count {min_paths}. To use \
                 this template, lower the minimum path count or add free FCP devices by \
                 editing the template."
            );
            error!(template_id = %template_id, "{reason}");
            return Selection::empty(reason);
        }

        let path_ids: Vec<u32> = free.keys().copied().collect();
        let mut shortfall = CapacityShortfall::default();

        for path_count in (min_paths..=free_paths).rev() {
            let candidates = best_combinations(&path_ids, path_count, &free, capacity, &mut shortfall);
            let Some(chosen) = candidates.choose(rng) else {
                debug!(template_id = %template_id, path_count, "No usable PCHID combination");
                continue;
            };

            let mut devices = Vec::with_capacity(chosen.len());
            for (path, pchid) in chosen {
                let pool = inventory.available_on(*path, pchid);
                if let Some(device) = pool.choose(rng) {
                    devices.push(to_selected(device));
                }
            }
            info!(
                template_id = %template_id,
                path_count,
                candidates = candidates.len(),
                "Selected FCP devices"
            );
            return Selection::found(devices);
        }

        let reason = shortfall.describe(template_id);
        error!(template_id = %template_id, "{reason}");
        Selection::empty(reason)
    }
}

/// The usable combinations over `path_count` paths with the highest weight,
/// narrowed to those with the most distinct PCHIDs.
fn best_combinations(
    path_ids: &[u32],
    path_count: usize,
    free: &BTreeMap<u32, Vec<String>>,
    capacity: &CapacitySnapshot,
    shortfall: &mut CapacityShortfall,
) -> Vec<PchidCombination> {
    let mut best: Vec<PchidCombination> = Vec::new();
    let mut best_weight: Option<Weight> = None;

    for subset in combinations(path_ids, path_count) {
        let choices: Vec<&[String]> = subset
            .iter()
            .map(|path| free.get(path).map(Vec::as_slice).unwrap_or_default())
            .collect();
        for pchids in cartesian_product(&choices) {
            let weight = combination_weight(pchids.iter().copied(), capacity, shortfall);
            if !weight.is_sufficient() {
                continue;
            }
            let combination: PchidCombination = subset
                .iter()
                .copied()
                .zip(pchids.iter().map(|p| p.to_string()))
                .collect();
            match best_weight {
                Some(current) if weight < current => {}
                Some(current) if weight == current => best.push(combination),
                _ => {
                    best_weight = Some(weight);
                    best = vec![combination];
                }
            }
        }
    }

    let distinct = |c: &PchidCombination| c.iter().map(|(_, p)| p).collect::<BTreeSet<_>>().len();
    if let Some(most) = best.iter().map(distinct).max() {
        best.retain(|c| distinct(c) == most);
    }
    best
}

/// Every `k`-element subset of `items`, preserving order.
fn combinations(items: &[u32], k: usize) -> Vec<Vec<u32>> {
    if k == 0 || k > items.len() {
        return Vec::new();
    }
    let n = items.len();
    let mut indices: Vec<usize> = (0..k).collect();
    let mut result = Vec::new();
    loop {
        result.push(indices.iter().map(|&i| items[i]).collect());
        // Rightmost index that can still move forward.
        let Some(pos) = (0..k).rev().find(|&i| indices[i] != i + n - k) else {
            return result;
        };
        indices[pos] += 1;
        for j in pos + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// Every choice of one element per list.
fn cartesian_product<'a>(lists: &[&'a [String]]) -> Vec<Vec<&'a str>> {
    let mut product: Vec<Vec<&'a str>> = vec![Vec::new()];
    for &list in lists {
        product = product
            .into_iter()
            .flat_map(|prefix| {
                list.iter().map(move |item| {
                    let mut next = prefix.clone();
                    next.push(item.as_str());
                    next
                })
            })
            .collect();
    }
    product
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::super::inventory::fixtures::{busy_row, free_row};
    use super::*;

    fn select_seeded(
        inventory: &TemplateInventory,
        capacity: &CapacitySnapshot,
        seed: u64,
    ) -> Selection {
        let mut rng = StdRng::seed_from_u64(seed);
        WeightedSelector.select(inventory, capacity, &mut rng)
    }

    fn example_inventory() -> TemplateInventory {
        TemplateInventory::new(
            "P",
            2,
            vec![
                free_row(0, "1A01", "AAAA"),
                free_row(0, "1A02", "AAAA"),
                free_row(1, "1B01", "BBBB"),
            ],
        )
    }

    #[test]
    fn test_combinations() {
        assert_eq!(
            combinations(&[1, 3, 4, 5], 3),
            vec![vec![1, 3, 4], vec![1, 3, 5], vec![1, 4, 5], vec![3, 4, 5]]
        );
        assert_eq!(combinations(&[1, 2], 2), vec![vec![1, 2]]);
        assert!(combinations(&[1, 2], 3).is_empty());
    }

    #[test]
    fn test_cartesian_product() {
        let a = vec!["AAAA".to_string(), "BBBB".to_string()];
        let c = vec!["CCCC".to_string()];
        let product = cartesian_product(&[a.as_slice(), c.as_slice()]);
        assert_eq!(product, vec![vec!["AAAA", "CCCC"], vec!["BBBB", "CCCC"]]);
    }

    #[test]
    fn test_one_device_per_path() {
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 2).with("BBBB", 0, 1);
        for seed in 0..16 {
            let selection = select_seeded(&example_inventory(), &capacity, seed);
            assert_eq!(selection.devices.len(), 2);
            assert!(["1A01", "1A02"].contains(&selection.devices[0].fcp_id.as_str()));
            assert_eq!(selection.devices[1].fcp_id.as_str(), "1B01");
            assert_eq!(selection.devices[1].pchid, "BBBB");
        }
    }

    #[test]
    fn test_exhausted_pchid_yields_reason() {
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 2).with("BBBB", 1, 1);
        let selection = select_seeded(&example_inventory(), &capacity, 1);
        assert!(selection.is_empty());
        let reason = selection.reason.unwrap();
        assert!(reason.contains("BBBB: 0"));
        assert!(!reason.contains("AAAA"));
    }

    #[test]
    fn test_falls_back_to_fewer_paths() {
        let inventory = TemplateInventory::new(
            "t1",
            1,
            vec![free_row(0, "1A01", "AAAA"), free_row(1, "1B01", "BBBB")],
        );
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 2).with("BBBB", 1, 1);
        let selection = select_seeded(&inventory, &capacity, 3);
        assert_eq!(selection.devices.len(), 1);
        assert_eq!(selection.devices[0].fcp_id.as_str(), "1A01");
    }

    #[test]
    fn test_prefers_higher_weight() {
        let inventory = TemplateInventory::new(
            "t1",
            1,
            vec![free_row(0, "1A01", "AAAA"), free_row(0, "1A02", "CCCC")],
        );
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 2).with("CCCC", 0, 9);
        for seed in 0..16 {
            let selection = select_seeded(&inventory, &capacity, seed);
            assert_eq!(selection.devices[0].fcp_id.as_str(), "1A02");
        }
    }

    #[test]
    fn test_prefers_distinct_pchids_on_equal_weight() {
        // {CCCC, CCCC} and {CCCC, DDDD} both weigh 2.
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![
                free_row(0, "1A01", "CCCC"),
                free_row(1, "1B01", "CCCC"),
                free_row(1, "1B02", "DDDD"),
            ],
        );
        let capacity = CapacitySnapshot::new().with("CCCC", 0, 4).with("DDDD", 0, 2);
        for seed in 0..16 {
            let selection = select_seeded(&inventory, &capacity, seed);
            assert_eq!(selection.devices[1].fcp_id.as_str(), "1B02");
        }
    }

    #[test]
    fn test_free_path_count_below_minimum() {
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![free_row(0, "1A01", "AAAA"), busy_row(1, "1B01", "BBBB")],
        );
        let capacity = CapacitySnapshot::new().with("AAAA", 0, 2).with("BBBB", 0, 2);
        let selection = select_seeded(&inventory, &capacity, 0);
        assert!(selection.is_empty());
        assert!(selection.reason.unwrap().contains("less than its minimum path count 2"));
    }

    #[test]
    fn test_no_free_device() {
        let inventory = TemplateInventory::new("t1", 1, vec![busy_row(0, "1A01", "AAAA")]);
        let selection = select_seeded(&inventory, &CapacitySnapshot::new(), 0);
        assert!(selection.is_empty());
        assert!(selection.reason.unwrap().contains("No free FCP device left"));
    }

    #[test]
    fn test_never_returns_insufficient_combination() {
        let inventory = TemplateInventory::new(
            "t1",
            2,
            vec![
                free_row(0, "1A01", "AAAA"),
                free_row(0, "1A02", "BBBB"),
                free_row(1, "1B01", "AAAA"),
                free_row(1, "1B02", "BBBB"),
            ],
        );
        // AAAA fits one more device, BBBB fits two.
        let capacity = CapacitySnapshot::new().with("AAAA", 1, 2).with("BBBB", 0, 2);
        for seed in 0..32 {
            let selection = select_seeded(&inventory, &capacity, seed);
            let on_aaaa = selection
                .devices
                .iter()
                .filter(|d| d.pchid == "AAAA")
                .count();
            assert!(on_aaaa <= 1);
            assert_eq!(selection.devices.len(), 2);
        }
    }
}

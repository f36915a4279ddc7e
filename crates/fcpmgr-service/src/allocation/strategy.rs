//! Selection strategy trait and its policy dispatcher.

use std::fmt;

use rand::RngCore;

use fcpmgr_core::types::{CapacitySnapshot, SelectionPolicy};
use fcpmgr_entity::allocation::Selection;

use super::inventory::TemplateInventory;
use super::same_index::SameIndexSelector;
use super::weighted::WeightedSelector;

/// Picks one device per path from a template's inventory.
///
/// Implementations only see availability as read in the enclosing
/// transaction, so a returned device is always available at read time.
/// An empty [`Selection`] carries the reason nothing was picked.
pub trait SelectionStrategy: Send + Sync + fmt::Debug {
    /// The policy this strategy implements.
    fn policy(&self) -> SelectionPolicy;

    /// Select devices under the given capacity snapshot.
    fn select(
        &self,
        inventory: &TemplateInventory,
        capacity: &CapacitySnapshot,
        rng: &mut dyn RngCore,
    ) -> Selection;
}

/// Dispatcher over the available strategies.
#[derive(Debug, Clone, Copy)]
pub enum SelectionStrategyDispatch {
    /// Same index on every path.
    SameIndex(SameIndexSelector),
    /// Weighted PCHID selection.
    Weighted(WeightedSelector),
}

impl SelectionStrategyDispatch {
    /// Strategy implementing the given policy.
    pub fn new(policy: SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::SameIndex => Self::SameIndex(SameIndexSelector),
            SelectionPolicy::Weighted => Self::Weighted(WeightedSelector),
        }
    }
}

impl SelectionStrategy for SelectionStrategyDispatch {
    fn policy(&self) -> SelectionPolicy {
        match self {
            Self::SameIndex(inner) => inner.policy(),
            Self::Weighted(inner) => inner.policy(),
        }
    }

    fn select(
        &self,
        inventory: &TemplateInventory,
        capacity: &CapacitySnapshot,
        rng: &mut dyn RngCore,
    ) -> Selection {
        match self {
            Self::SameIndex(inner) => inner.select(inventory, capacity, rng),
            Self::Weighted(inner) => inner.select(inventory, capacity, rng),
        }
    }
}

/// Diagnostic for a template without any mapped device.
pub(crate) fn no_devices_reason(template_id: &str) -> String {
    format!(
        "No FCP device exists in FCP multipath template (id={template_id}). To use this \
         template, add free FCP devices by editing the template. For load balance across \
         PCHIDs, add the same number of FCP devices per PCHID."
    )
}

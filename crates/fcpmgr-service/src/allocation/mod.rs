//! Allocation engine: device selection strategies and the reserve flow.

pub mod inventory;
pub mod same_index;
pub mod service;
pub mod strategy;
pub mod weight;
pub mod weighted;

pub use inventory::TemplateInventory;
pub use same_index::SameIndexSelector;
pub use service::{AllocateRequest, AllocationService};
pub use strategy::{SelectionStrategy, SelectionStrategyDispatch};
pub use weighted::WeightedSelector;

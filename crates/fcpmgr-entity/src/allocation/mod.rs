//! Selection and allocation results.

pub mod outcome;
pub mod selection;

pub use outcome::AllocationOutcome;
pub use selection::{SelectedDevice, Selection};

//! Multipath template entities.

pub mod detail;
pub mod diff;
pub mod filter;
pub mod mapping;
pub mod model;

pub use detail::{PathStatistics, TemplateDetail, TemplateDeviceRow};
pub use diff::{PchidDiff, PchidsAdded, PchidsDeleted, TemplateEditOutcome};
pub use filter::TemplateFilter;
pub use mapping::TemplateFcpMapping;
pub use model::{Template, TemplateInfo, UNSET_MIN_PATHS};

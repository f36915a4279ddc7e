//! Device state manager.

pub mod service;
pub mod sync;

pub use service::DeviceService;
pub use sync::SyncSummary;

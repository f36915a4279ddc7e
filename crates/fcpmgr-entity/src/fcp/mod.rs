//! FCP device entities.

pub mod assigned;
pub mod model;
pub mod state;
pub mod sync;
pub mod usage;

pub use assigned::AssignedDevice;
pub use model::FcpDevice;
pub use state::DeviceState;
pub use sync::{DeviceFacts, StateChange, SyncBatch};
pub use usage::FcpUsage;

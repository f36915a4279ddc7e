//! Core type definitions used across the fcpmgr workspace.

pub mod capacity;
pub mod fcp_id;
pub mod fcp_list;
pub mod policy;

pub use capacity::{CapacitySnapshot, PchidCapacity};
pub use fcp_id::FcpId;
pub use fcp_list::{DevicesByPath, expand_fcp_list, shrink_fcp_list};
pub use policy::SelectionPolicy;

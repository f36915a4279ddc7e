//! # fcpmgr-service
//!
//! Business logic of the FCP allocator: the device state manager, the
//! multipath template manager and the allocation engine. Every public
//! operation runs inside one store transaction.

pub mod allocation;
pub mod device;
pub mod manager;
pub mod template;

pub use allocation::AllocationService;
pub use device::DeviceService;
pub use manager::FcpManager;
pub use template::TemplateService;

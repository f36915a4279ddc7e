//! Multipath template manager.

pub mod query;
pub mod request;
pub mod service;
pub mod statistics;

pub use request::{CreateTemplateRequest, DeviceList, EditTemplateRequest};
pub use service::TemplateService;

//! # fcpmgr-core
//!
//! Core crate for the FCP multipath allocator. Contains configuration
//! schemas, typed device identifiers, device-list parsing and formatting,
//! the per-PCHID capacity snapshot, and the unified error system.
//!
//! This crate has **no** internal dependencies on other fcpmgr crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;

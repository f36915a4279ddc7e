//! # fcpmgr-entity
//!
//! Row models for the four allocator tables and the value objects the
//! services hand back to callers. Table rows derive `sqlx::FromRow` and are
//! read by column name.

pub mod allocation;
pub mod fcp;
pub mod template;

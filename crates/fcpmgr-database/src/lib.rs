//! # fcpmgr-database
//!
//! SQLite store handle, migration runner and the repositories over the
//! four allocator tables. Repositories never open transactions themselves;
//! callers obtain a [`StoreTx`] from [`FcpDatabase::begin`] and pass its
//! connection down.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::{FcpDatabase, StoreTx};

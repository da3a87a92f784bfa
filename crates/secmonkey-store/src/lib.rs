//! Security Monkey store: SQLite persistence for items, revisions and
//! collection exceptions
//!
//! Provides:
//! - SQLite schema with a checksummed migrations framework
//! - `SqliteStore`, the durable `RevisionStore` + `ExceptionLog`
//! - Row hydration helpers shared by the store's queries

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use errors::Result;
pub use repo::SqliteStore;

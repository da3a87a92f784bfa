//! Repository layer persisting items, revisions and exceptions to SQLite

pub mod hydration;
pub mod sqlite_repo;

pub use sqlite_repo::SqliteStore;

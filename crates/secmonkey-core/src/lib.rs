//! Security Monkey core: change detection and revision tracking
//!
//! This crate provides the in-memory half of the engine:
//! - `ConfigValue` configuration trees and location keys
//! - Complete/durable hashing with ephemeral path stripping
//! - Structural diff with similarity-based list matching
//! - Created/changed/ephemeral/deleted classification honoring collection exceptions
//! - Rate-limit retry, technology descriptors and TOML configuration
//! - The `RevisionStore` contract with an in-memory implementation
//!
//! Persistence lives in `secmonkey-store`, orchestration in `secmonkey-engine`.

pub mod classify;
pub mod config;
pub mod diff;
pub mod errors;
pub mod exceptions;
pub mod hashing;
pub mod logging_facility;
pub mod model;
pub mod retry;
pub mod store;
pub mod technology;

// Used by the exported logging macros
#[doc(hidden)]
pub use secmonkey_core_types;

// Re-export commonly used types
pub use classify::{classify, ChangeClass, ChangeItem, Classification};
pub use errors::{ExError, ExErrorKind, FetchError, Result};
pub use exceptions::{ExceptionLog, ExceptionMap, ExceptionRecord};
pub use hashing::{complete_hash, durable_hash, ConfigHash, EphemeralPath};
pub use model::{ConfigSnapshot, ConfigValue, ExceptionScope, Item, Location, Revision};
pub use retry::{RateLimitPolicy, RateLimiter, Sleeper, ThreadSleeper};
pub use store::{MemoryRevisionStore, RepairReport, RevisionStore, StoreOutcome};
pub use technology::TechnologyDescriptor;

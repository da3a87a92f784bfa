//! Complete and durable hashing of configuration trees.
//!
//! ## Responsibilities
//!
//! - Parse and apply ephemeral field paths
//! - Compute deterministic complete/durable digests
//!
//! ## Non-Responsibilities
//!
//! - Deciding what counts as a change (see `classify`)
//! - Persisting digests (handled by `secmonkey-store`)

pub mod digest;
pub mod path;

pub use digest::{
    complete_hash, durable_hash, hash_item, hash_string, strip_ephemeral, ConfigHash, ItemHashes,
};
pub use path::EphemeralPath;

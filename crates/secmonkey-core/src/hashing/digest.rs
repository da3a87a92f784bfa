//! Digest computation for configuration snapshots.
//!
//! ## Digest Types
//!
//! - **Complete hash**: SHA256 of the canonical JSON of the full config
//! - **Durable hash**: complete hash of a copy with ephemeral paths stripped
//!
//! ## Determinism Guarantees
//!
//! - Same input → same digest (canonical JSON: sorted keys, compact)
//! - Different list order → different digest (order-sensitive)
//! - Input config is never mutated

use crate::hashing::path::EphemeralPath;
use crate::model::value::ConfigValue;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA256 digest (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(String);

impl ConfigHash {
    /// Wrap a digest read back from storage.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Both digests of one config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHashes {
    pub complete: ConfigHash,
    pub durable: ConfigHash,
}

/// Compute the complete hash of a config.
///
/// ## Arguments
///
/// - `config`: Full configuration tree
///
/// ## Returns
///
/// Hex-encoded SHA256 digest of the canonical JSON
///
/// ## Example
///
/// ```
/// use secmonkey_core::hashing::complete_hash;
/// use secmonkey_core::model::ConfigValue;
///
/// let config = ConfigValue::from(serde_json::json!({"ports": [80]}));
/// assert_eq!(complete_hash(&config).as_str().len(), 64);
/// ```
pub fn complete_hash(config: &ConfigValue) -> ConfigHash {
    ConfigHash(hash_string(&config.canonical_json()))
}

/// Compute the durable hash of a config.
///
/// Works on a private copy: every node addressed by `paths` is removed, then
/// the complete hash of what remains is returned. Paths that address nothing
/// are ignored.
///
/// ## Arguments
///
/// - `config`: Full configuration tree
/// - `paths`: Ephemeral paths declared by the technology
pub fn durable_hash(config: &ConfigValue, paths: &[EphemeralPath]) -> ConfigHash {
    if paths.is_empty() {
        return complete_hash(config);
    }
    complete_hash(&strip_ephemeral(config, paths))
}

/// Copy of `config` with every ephemeral path removed.
pub fn strip_ephemeral(config: &ConfigValue, paths: &[EphemeralPath]) -> ConfigValue {
    let mut copy = config.clone();
    for path in paths {
        path.strip(&mut copy);
    }
    copy
}

/// Compute both digests for an item's config.
pub fn hash_item(config: &ConfigValue, paths: &[EphemeralPath]) -> ItemHashes {
    ItemHashes {
        complete: complete_hash(config),
        durable: durable_hash(config, paths),
    }
}

/// Hash a string using SHA256 and return hex-encoded result.
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

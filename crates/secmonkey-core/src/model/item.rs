//! Persisted identity and revision records.

use crate::hashing::ConfigHash;
use crate::model::location::Location;
use crate::model::snapshot::ConfigSnapshot;
use crate::model::value::ConfigValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persistent identity of one resource, keyed by its [`Location`].
///
/// `latest_revision_id` may be dangling after a partial write; that state is
/// what orphan repair looks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub location: Location,
    pub active: bool,
    pub latest_revision_id: Option<i64>,
    pub latest_complete_hash: Option<ConfigHash>,
    pub latest_durable_hash: Option<ConfigHash>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable configuration recorded for an [`Item`].
///
/// Only `active` is ever rewritten after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: i64,
    pub item_id: i64,
    pub arn: Option<String>,
    pub config: ConfigValue,
    pub complete_hash: ConfigHash,
    pub durable_hash: ConfigHash,
    /// Whether this revision was written for a durable change (or a first sighting)
    pub durable: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Revision {
    /// Rebuild the snapshot this revision was written from.
    pub fn to_snapshot(&self, location: &Location) -> ConfigSnapshot {
        ConfigSnapshot {
            location: location.clone(),
            arn: self.arn.clone(),
            config: self.config.clone(),
        }
    }
}

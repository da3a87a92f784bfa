//! Per-cycle collection exception tracking.
//!
//! An [`ExceptionMap`] records, for one watcher cycle, every scope at which
//! data collection failed. The classifier consults it so that failed scopes
//! produce neither deletions nor changes.

use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::{ExceptionScope, Location};
use chrono::{DateTime, Utc};
use secmonkey_core_types::RunId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// A collection failure at one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub scope: ExceptionScope,
    /// Stable `ERR_*` code of the failure
    pub code: String,
    pub message: String,
}

impl ExceptionRecord {
    pub fn from_error(scope: ExceptionScope, err: &ExError) -> Self {
        let message = if err.message().is_empty() {
            err.to_string()
        } else {
            err.message().to_string()
        };
        Self {
            scope,
            code: err.code().to_string(),
            message,
        }
    }

    pub fn kind(&self) -> Option<ExErrorKind> {
        ExErrorKind::from_code(&self.code)
    }
}

/// Scoped collection failures for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ExceptionRecord>", into = "Vec<ExceptionRecord>")]
pub struct ExceptionMap {
    entries: BTreeMap<ExceptionScope, ExceptionRecord>,
}

impl From<Vec<ExceptionRecord>> for ExceptionMap {
    fn from(records: Vec<ExceptionRecord>) -> Self {
        let entries = records.into_iter().fold(BTreeMap::new(), |mut acc, r| {
            acc.entry(r.scope.clone()).or_insert(r);
            acc
        });
        Self { entries }
    }
}

impl From<ExceptionMap> for Vec<ExceptionRecord> {
    fn from(map: ExceptionMap) -> Self {
        map.into_records()
    }
}

impl ExceptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure at `scope`. An existing record for the same scope is
    /// kept and the new one is only logged. Returns whether it was inserted.
    pub fn record(&mut self, scope: ExceptionScope, err: &ExError) -> bool {
        self.insert(ExceptionRecord::from_error(scope, err))
    }

    /// Insert a prebuilt record, with the same no-overwrite rule as [`record`](Self::record).
    pub fn insert(&mut self, record: ExceptionRecord) -> bool {
        if let Some(existing) = self.entries.get(&record.scope) {
            info!(
                scope = %record.scope,
                existing_code = %existing.code,
                ignored_code = %record.code,
                "exception already recorded for scope; keeping the first"
            );
            return false;
        }
        warn!(
            scope = %record.scope,
            code = %record.code,
            message = %record.message,
            "collection exception recorded"
        );
        self.entries.insert(record.scope.clone(), record);
        true
    }

    /// Whether `location` or any of its prefixes has a recorded failure.
    pub fn covers(&self, location: &Location) -> bool {
        self.covering(location).is_some()
    }

    /// The broadest record covering `location`, if any.
    pub fn covering(&self, location: &Location) -> Option<&ExceptionRecord> {
        location
            .scopes()
            .iter()
            .find_map(|scope| self.entries.get(scope))
    }

    /// Fold another map in. Existing entries win.
    pub fn merge(&mut self, other: ExceptionMap) {
        for (_, record) in other.entries {
            self.insert(record);
        }
    }

    pub fn get(&self, scope: &ExceptionScope) -> Option<&ExceptionRecord> {
        self.entries.get(scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExceptionRecord> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_records(self) -> Vec<ExceptionRecord> {
        self.entries.into_values().collect()
    }
}

/// A collection exception as kept in the persisted log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedException {
    pub run_id: String,
    pub record: ExceptionRecord,
    pub recorded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// When an exception recorded at `recorded_at` stops shielding its scope.
///
/// # Errors
///
/// `InvalidInput` when the sum leaves the representable date range.
pub fn expiry(recorded_at: DateTime<Utc>, ttl: chrono::Duration) -> Result<DateTime<Utc>> {
    recorded_at.checked_add_signed(ttl).ok_or_else(|| {
        ExError::new(ExErrorKind::InvalidInput)
            .with_op("store_exceptions")
            .with_message(format!("exception ttl of {}s overflows", ttl.num_seconds()))
    })
}

/// Durable log of collection exceptions with a time-to-live.
pub trait ExceptionLog {
    /// Persist every record of `exceptions`, expiring `ttl` after `recorded_at`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the expiry overflows; `Persistence` on storage
    /// failure.
    fn store_exceptions(
        &mut self,
        run_id: &RunId,
        exceptions: &ExceptionMap,
        recorded_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Result<usize>;

    /// Delete rows whose `expires_at` is at or before `now`. Returns rows removed.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn clear_expired_exceptions(&mut self, now: DateTime<Utc>) -> Result<usize>;

    /// Every stored exception, oldest first.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn list_exceptions(&self) -> Result<Vec<PersistedException>>;
}

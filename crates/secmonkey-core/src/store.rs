//! Revision store contract and an in-memory implementation.
//!
//! The SQLite implementation lives in `secmonkey-store`; both follow the
//! same rules:
//!
//! - an item has at most one active revision, and none once deleted
//! - revisions are never rewritten except for their `active` flag
//! - storing the exact config the item already holds writes nothing

use crate::errors::{ExError, ExErrorKind, Result};
use crate::exceptions::{expiry, ExceptionLog, ExceptionMap, PersistedException};
use crate::hashing::{hash_item, EphemeralPath};
use crate::model::{ConfigSnapshot, Item, Location, Revision};
use chrono::{DateTime, Utc};
use secmonkey_core_types::RunId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info};

/// What a [`RevisionStore::store`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// A new revision row was written and is now the active one
    Written(Revision),
    /// The item already holds this exact config
    Unchanged,
    /// Config unchanged, but the stored durable hash was stale and has been recomputed
    DurableHashRefreshed,
}

impl StoreOutcome {
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            StoreOutcome::Written(rev) => Some(rev),
            _ => None,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, StoreOutcome::Written(_))
    }
}

/// Result of an orphan repair pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    /// Items removed because they had no revisions at all
    pub deleted: Vec<Location>,
    /// Items whose latest pointer was reset to their newest revision
    pub repaired: Vec<Location>,
}

impl RepairReport {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.repaired.is_empty()
    }
}

/// Persistence boundary for items and their revisions.
pub trait RevisionStore {
    /// One snapshot per active item of `technology` in `accounts`, built from
    /// each item's latest revision.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn get_previous(&self, technology: &str, accounts: &[String]) -> Result<Vec<ConfigSnapshot>>;

    /// Record `snapshot` as the item's current state.
    ///
    /// An unknown location creates the item. Otherwise a new active revision
    /// replaces the previous active one, unless the item is active and already
    /// holds this exact config. `is_new` reactivates an inactive item.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn store(
        &mut self,
        snapshot: &ConfigSnapshot,
        is_durable_change: bool,
        is_new: bool,
        ephemeral_paths: &[EphemeralPath],
    ) -> Result<StoreOutcome>;

    /// Deactivate the item and its active revision. Returns false if the
    /// item is unknown or already inactive.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn mark_deleted(&mut self, location: &Location) -> Result<bool>;

    /// Restore the latest-revision invariant for items of `technology` in `accounts`.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn repair_orphans(
        &mut self,
        technology: &str,
        accounts: &[String],
        ephemeral_paths: &[EphemeralPath],
    ) -> Result<RepairReport>;

    /// Every revision of the item at `location`, newest first.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn list_revisions(&self, location: &Location) -> Result<Vec<Revision>>;

    /// The item at `location`, if known.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn get_item(&self, location: &Location) -> Result<Option<Item>>;
}

/// In-memory store. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRevisionStore {
    items: BTreeMap<Location, Item>,
    revisions: BTreeMap<i64, Revision>,
    exceptions: Vec<PersistedException>,
    next_item_id: i64,
    next_revision_id: i64,
}

impl MemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn revisions_of(&self, item_id: i64) -> impl Iterator<Item = &Revision> {
        self.revisions.values().filter(move |r| r.item_id == item_id)
    }

    fn newest_revision_id(&self, item_id: i64) -> Option<i64> {
        self.revisions_of(item_id)
            .max_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)))
            .map(|r| r.id)
    }

    fn insert_revision(
        &mut self,
        item_id: i64,
        snapshot: &ConfigSnapshot,
        durable: bool,
        ephemeral_paths: &[EphemeralPath],
        now: DateTime<Utc>,
    ) -> Revision {
        for rev in self.revisions.values_mut() {
            if rev.item_id == item_id {
                rev.active = false;
            }
        }
        self.next_revision_id += 1;
        let hashes = hash_item(&snapshot.config, ephemeral_paths);
        let revision = Revision {
            id: self.next_revision_id,
            item_id,
            arn: snapshot.arn.clone(),
            config: snapshot.config.clone(),
            complete_hash: hashes.complete,
            durable_hash: hashes.durable,
            durable,
            active: true,
            created_at: now,
        };
        self.revisions.insert(revision.id, revision.clone());
        revision
    }

    /// Simulate a partial write by pointing an item at a revision that does
    /// not exist.
    #[doc(hidden)]
    pub fn corrupt_latest_pointer(&mut self, location: &Location) {
        if let Some(item) = self.items.get_mut(location) {
            item.latest_revision_id = Some(-1);
        }
    }

    /// Simulate a partial write by removing every revision of an item.
    #[doc(hidden)]
    pub fn drop_revisions(&mut self, location: &Location) {
        if let Some(item) = self.items.get(location) {
            let id = item.id;
            self.revisions.retain(|_, r| r.item_id != id);
        }
    }
}

impl RevisionStore for MemoryRevisionStore {
    fn get_previous(&self, technology: &str, accounts: &[String]) -> Result<Vec<ConfigSnapshot>> {
        let accounts: BTreeSet<&str> = accounts.iter().map(String::as_str).collect();
        let mut out = Vec::new();
        for (location, item) in &self.items {
            if location.technology != technology
                || !accounts.contains(location.account.as_str())
                || !item.active
            {
                continue;
            }
            let Some(rev) = item.latest_revision_id.and_then(|id| self.revisions.get(&id)) else {
                continue;
            };
            out.push(rev.to_snapshot(location));
        }
        Ok(out)
    }

    fn store(
        &mut self,
        snapshot: &ConfigSnapshot,
        is_durable_change: bool,
        is_new: bool,
        ephemeral_paths: &[EphemeralPath],
    ) -> Result<StoreOutcome> {
        let now = Utc::now();
        let location = &snapshot.location;
        let hashes = hash_item(&snapshot.config, ephemeral_paths);

        let Some(existing) = self.items.get(location).cloned() else {
            self.next_item_id += 1;
            let item_id = self.next_item_id;
            let revision = self.insert_revision(item_id, snapshot, true, ephemeral_paths, now);
            self.items.insert(
                location.clone(),
                Item {
                    id: item_id,
                    location: location.clone(),
                    active: true,
                    latest_revision_id: Some(revision.id),
                    latest_complete_hash: Some(revision.complete_hash.clone()),
                    latest_durable_hash: Some(revision.durable_hash.clone()),
                    created_at: now,
                    updated_at: now,
                },
            );
            debug!(location = %location, revision_id = revision.id, "item created");
            return Ok(StoreOutcome::Written(revision));
        };

        if existing.active && existing.latest_complete_hash.as_ref() == Some(&hashes.complete) {
            if existing.latest_durable_hash.as_ref() == Some(&hashes.durable) {
                return Ok(StoreOutcome::Unchanged);
            }
            info!(location = %location, "refreshing stale durable hash");
            if let Some(item) = self.items.get_mut(location) {
                item.latest_durable_hash = Some(hashes.durable.clone());
                item.updated_at = now;
            }
            if let Some(rev) = existing
                .latest_revision_id
                .and_then(|id| self.revisions.get_mut(&id))
            {
                rev.durable_hash = hashes.durable;
            }
            return Ok(StoreOutcome::DurableHashRefreshed);
        }

        if !existing.active && is_new {
            info!(location = %location, "reactivating previously deleted item");
        }
        let durable = is_durable_change || is_new || !existing.active;
        let revision = self.insert_revision(existing.id, snapshot, durable, ephemeral_paths, now);
        let item = self.items.get_mut(location).ok_or_else(|| {
            ExError::new(ExErrorKind::Internal)
                .with_op("store")
                .with_location(location.to_string())
                .with_message("item vanished during store")
        })?;
        item.active = true;
        item.latest_revision_id = Some(revision.id);
        item.latest_complete_hash = Some(revision.complete_hash.clone());
        item.latest_durable_hash = Some(revision.durable_hash.clone());
        item.updated_at = now;
        debug!(location = %location, revision_id = revision.id, durable, "revision written");
        Ok(StoreOutcome::Written(revision))
    }

    fn mark_deleted(&mut self, location: &Location) -> Result<bool> {
        let Some(item) = self.items.get_mut(location) else {
            return Ok(false);
        };
        if !item.active {
            return Ok(false);
        }
        item.active = false;
        item.updated_at = Utc::now();
        let item_id = item.id;
        for rev in self.revisions.values_mut() {
            if rev.item_id == item_id {
                rev.active = false;
            }
        }
        debug!(location = %location, "item marked deleted");
        Ok(true)
    }

    fn repair_orphans(
        &mut self,
        technology: &str,
        accounts: &[String],
        ephemeral_paths: &[EphemeralPath],
    ) -> Result<RepairReport> {
        let accounts: BTreeSet<&str> = accounts.iter().map(String::as_str).collect();
        let mut report = RepairReport::default();

        let candidates: Vec<(Location, Item)> = self
            .items
            .iter()
            .filter(|(loc, _)| {
                loc.technology == technology && accounts.contains(loc.account.as_str())
            })
            .filter(|(_, item)| {
                item.latest_revision_id
                    .and_then(|id| self.revisions.get(&id))
                    .map_or(true, |rev| rev.item_id != item.id)
            })
            .map(|(loc, item)| (loc.clone(), item.clone()))
            .collect();

        for (location, item) in candidates {
            error!(location = %location, item_id = item.id, "item has no resolvable latest revision");
            let Some(newest_id) = self.newest_revision_id(item.id) else {
                self.items.remove(&location);
                info!(location = %location, "deleted orphaned item with no revisions");
                report.deleted.push(location);
                continue;
            };

            let mut hashes = None;
            for rev in self.revisions.values_mut() {
                if rev.item_id != item.id {
                    continue;
                }
                rev.active = item.active && rev.id == newest_id;
                if rev.id == newest_id {
                    let h = hash_item(&rev.config, ephemeral_paths);
                    rev.complete_hash = h.complete.clone();
                    rev.durable_hash = h.durable.clone();
                    hashes = Some(h);
                }
            }
            if let Some(stored) = self.items.get_mut(&location) {
                stored.latest_revision_id = Some(newest_id);
                if let Some(h) = hashes {
                    stored.latest_complete_hash = Some(h.complete);
                    stored.latest_durable_hash = Some(h.durable);
                }
                stored.updated_at = Utc::now();
            }
            info!(location = %location, revision_id = newest_id, "repaired latest revision pointer");
            report.repaired.push(location);
        }
        Ok(report)
    }

    fn list_revisions(&self, location: &Location) -> Result<Vec<Revision>> {
        let Some(item) = self.items.get(location) else {
            return Ok(Vec::new());
        };
        let mut revs: Vec<Revision> = self.revisions_of(item.id).cloned().collect();
        revs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(revs)
    }

    fn get_item(&self, location: &Location) -> Result<Option<Item>> {
        Ok(self.items.get(location).cloned())
    }
}

impl ExceptionLog for MemoryRevisionStore {
    fn store_exceptions(
        &mut self,
        run_id: &RunId,
        exceptions: &ExceptionMap,
        recorded_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Result<usize> {
        let expires_at = expiry(recorded_at, ttl)?;
        for record in exceptions.iter() {
            self.exceptions.push(PersistedException {
                run_id: run_id.to_string(),
                record: record.clone(),
                recorded_at,
                expires_at,
            });
        }
        Ok(exceptions.len())
    }

    fn clear_expired_exceptions(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.exceptions.len();
        self.exceptions.retain(|e| e.expires_at > now);
        Ok(before - self.exceptions.len())
    }

    fn list_exceptions(&self) -> Result<Vec<PersistedException>> {
        Ok(self.exceptions.clone())
    }
}

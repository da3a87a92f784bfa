//! SQLite-backed revision store
//!
//! Every mutating call runs in its own immediate transaction so that a
//! failure leaves the item exactly as it was. A crash between statements of
//! an older build could still leave a dangling latest pointer; that is what
//! `repair_orphans` cleans up.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;
use crate::repo::hydration::{
    exception_from_row, item_from_row, now_millis, revision_from_row, to_millis,
    EXCEPTION_COLUMNS, ITEM_COLUMNS, REVISION_COLUMNS,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use secmonkey_core::exceptions::{expiry, ExceptionLog, ExceptionMap, PersistedException};
use secmonkey_core::hashing::{hash_item, EphemeralPath, ItemHashes};
use secmonkey_core::model::{ConfigSnapshot, ConfigValue, Item, Location, Revision};
use secmonkey_core::store::{RepairReport, RevisionStore, StoreOutcome};
use secmonkey_core::ExError;
use secmonkey_core_types::RunId;
use std::path::Path;
use tracing::{debug, error, info};

/// Durable [`RevisionStore`] and [`ExceptionLog`] over one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(db::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    /// Configure `conn` and bring its schema up to date.
    pub fn from_connection(mut conn: Connection) -> Result<Self> {
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Every item of `technology`, active or not, ordered by location.
    pub fn list_items(&self, technology: &str) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE technology = ?1
             ORDER BY technology, account, region, name"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let items = stmt
            .query_map([technology], item_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(items)
    }
}

fn account_placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn find_item(conn: &Connection, location: &Location) -> Result<Option<Item>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM items
         WHERE technology = ?1 AND account = ?2 AND region = ?3 AND name = ?4"
    );
    conn.query_row(
        &sql,
        params![
            location.technology,
            location.account,
            location.region,
            location.name
        ],
        item_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

fn config_json(config: &ConfigValue) -> String {
    config.canonical_json()
}

fn insert_revision(
    conn: &Connection,
    item_id: i64,
    snapshot: &ConfigSnapshot,
    hashes: &ItemHashes,
    durable: bool,
    at: (i64, DateTime<Utc>),
) -> Result<Revision> {
    // Clear first: the partial unique index allows one active row per item
    conn.execute(
        "UPDATE item_revisions SET active = 0 WHERE item_id = ?1 AND active = 1",
        [item_id],
    )
    .map_err(from_rusqlite)?;

    conn.execute(
        "INSERT INTO item_revisions
            (item_id, arn, config, complete_hash, durable_hash, durable, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
        params![
            item_id,
            snapshot.arn,
            config_json(&snapshot.config),
            hashes.complete.as_str(),
            hashes.durable.as_str(),
            durable,
            at.0,
        ],
    )
    .map_err(from_rusqlite)?;

    Ok(Revision {
        id: conn.last_insert_rowid(),
        item_id,
        arn: snapshot.arn.clone(),
        config: snapshot.config.clone(),
        complete_hash: hashes.complete.clone(),
        durable_hash: hashes.durable.clone(),
        durable,
        active: true,
        created_at: at.1,
    })
}

fn point_item_at(conn: &Connection, item_id: i64, revision: &Revision, now_ms: i64) -> Result<()> {
    conn.execute(
        "UPDATE items SET active = 1, latest_revision_id = ?1, latest_complete_hash = ?2,
             latest_durable_hash = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            revision.id,
            revision.complete_hash.as_str(),
            revision.durable_hash.as_str(),
            now_ms,
            item_id,
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

fn with_location(err: ExError, op: &str, location: &Location) -> ExError {
    err.with_op(op).with_location(location.to_string())
}

impl RevisionStore for SqliteStore {
    fn get_previous(&self, technology: &str, accounts: &[String]) -> Result<Vec<ConfigSnapshot>> {
        if accounts.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT i.technology, i.account, i.region, i.name, r.arn, r.config
             FROM items i
             JOIN item_revisions r ON r.id = i.latest_revision_id AND r.item_id = i.id
             WHERE i.active = 1 AND i.technology = ?1 AND i.account IN ({})
             ORDER BY i.technology, i.account, i.region, i.name",
            account_placeholders(2, accounts.len())
        );
        let params = std::iter::once(technology).chain(accounts.iter().map(String::as_str));

        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let location = Location::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                );
                let arn: Option<String> = row.get(4)?;
                let config: String = row.get(5)?;
                Ok((location, arn, config))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter()
            .map(|(location, arn, config)| {
                let config: ConfigValue = serde_json::from_str(&config)
                    .map_err(|e| with_location(ExError::from(e), "get_previous", &location))?;
                Ok(ConfigSnapshot {
                    location,
                    arn,
                    config,
                })
            })
            .collect()
    }

    fn store(
        &mut self,
        snapshot: &ConfigSnapshot,
        is_durable_change: bool,
        is_new: bool,
        ephemeral_paths: &[EphemeralPath],
    ) -> Result<StoreOutcome> {
        let location = &snapshot.location;
        let hashes = hash_item(&snapshot.config, ephemeral_paths);
        let now = now_millis();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;

        let outcome = match find_item(&tx, location)? {
            None => {
                tx.execute(
                    "INSERT INTO items (technology, account, region, name, active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
                    params![
                        location.technology,
                        location.account,
                        location.region,
                        location.name,
                        now.0
                    ],
                )
                .map_err(from_rusqlite)?;
                let item_id = tx.last_insert_rowid();
                let revision = insert_revision(&tx, item_id, snapshot, &hashes, true, now)?;
                point_item_at(&tx, item_id, &revision, now.0)?;
                debug!(location = %location, revision_id = revision.id, "item created");
                StoreOutcome::Written(revision)
            }
            Some(existing)
                if existing.active
                    && existing.latest_complete_hash.as_ref() == Some(&hashes.complete) =>
            {
                if existing.latest_durable_hash.as_ref() == Some(&hashes.durable) {
                    StoreOutcome::Unchanged
                } else {
                    info!(location = %location, "refreshing stale durable hash");
                    tx.execute(
                        "UPDATE items SET latest_durable_hash = ?1, updated_at = ?2 WHERE id = ?3",
                        params![hashes.durable.as_str(), now.0, existing.id],
                    )
                    .map_err(from_rusqlite)?;
                    if let Some(revision_id) = existing.latest_revision_id {
                        tx.execute(
                            "UPDATE item_revisions SET durable_hash = ?1 WHERE id = ?2",
                            params![hashes.durable.as_str(), revision_id],
                        )
                        .map_err(from_rusqlite)?;
                    }
                    StoreOutcome::DurableHashRefreshed
                }
            }
            Some(existing) => {
                if !existing.active && is_new {
                    info!(location = %location, "reactivating previously deleted item");
                }
                let durable = is_durable_change || is_new || !existing.active;
                let revision = insert_revision(&tx, existing.id, snapshot, &hashes, durable, now)?;
                point_item_at(&tx, existing.id, &revision, now.0)?;
                debug!(location = %location, revision_id = revision.id, durable, "revision written");
                StoreOutcome::Written(revision)
            }
        };

        tx.commit().map_err(from_rusqlite)?;
        Ok(outcome)
    }

    fn mark_deleted(&mut self, location: &Location) -> Result<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;

        let Some(item) = find_item(&tx, location)? else {
            return Ok(false);
        };
        if !item.active {
            return Ok(false);
        }
        let (now_ms, _) = now_millis();
        tx.execute(
            "UPDATE items SET active = 0, updated_at = ?1 WHERE id = ?2",
            params![now_ms, item.id],
        )
        .map_err(from_rusqlite)?;
        tx.execute(
            "UPDATE item_revisions SET active = 0 WHERE item_id = ?1",
            [item.id],
        )
        .map_err(from_rusqlite)?;
        tx.commit().map_err(from_rusqlite)?;

        debug!(location = %location, "item marked deleted");
        Ok(true)
    }

    fn repair_orphans(
        &mut self,
        technology: &str,
        accounts: &[String],
        ephemeral_paths: &[EphemeralPath],
    ) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        if accounts.is_empty() {
            return Ok(report);
        }

        let sql = format!(
            "SELECT {} FROM items i
             LEFT JOIN item_revisions r ON r.id = i.latest_revision_id AND r.item_id = i.id
             WHERE i.technology = ?1 AND i.account IN ({}) AND r.id IS NULL
             ORDER BY i.technology, i.account, i.region, i.name",
            ITEM_COLUMNS
                .split(", ")
                .map(|c| format!("i.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", "),
            account_placeholders(2, accounts.len())
        );
        let params = std::iter::once(technology).chain(accounts.iter().map(String::as_str));
        let candidates: Vec<Item> = {
            let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
            let rows = stmt
                .query_map(params_from_iter(params), item_from_row)
                .map_err(from_rusqlite)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?
        };

        for item in candidates {
            let location = item.location.clone();
            error!(location = %location, item_id = item.id, "item has no resolvable latest revision");

            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(from_rusqlite)?;

            let newest_sql = format!(
                "SELECT {REVISION_COLUMNS} FROM item_revisions WHERE item_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            );
            let newest = tx
                .query_row(&newest_sql, [item.id], revision_from_row)
                .optional()
                .map_err(from_rusqlite)?;

            let Some(newest) = newest else {
                tx.execute("DELETE FROM items WHERE id = ?1", [item.id])
                    .map_err(from_rusqlite)?;
                tx.commit().map_err(from_rusqlite)?;
                info!(location = %location, "deleted orphaned item with no revisions");
                report.deleted.push(location);
                continue;
            };

            let hashes = hash_item(&newest.config, ephemeral_paths);
            let (now_ms, _) = now_millis();
            tx.execute(
                "UPDATE item_revisions SET active = 0 WHERE item_id = ?1",
                [item.id],
            )
            .map_err(from_rusqlite)?;
            tx.execute(
                "UPDATE item_revisions SET active = ?1, complete_hash = ?2, durable_hash = ?3
                 WHERE id = ?4",
                params![
                    item.active,
                    hashes.complete.as_str(),
                    hashes.durable.as_str(),
                    newest.id
                ],
            )
            .map_err(from_rusqlite)?;
            tx.execute(
                "UPDATE items SET latest_revision_id = ?1, latest_complete_hash = ?2,
                     latest_durable_hash = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    newest.id,
                    hashes.complete.as_str(),
                    hashes.durable.as_str(),
                    now_ms,
                    item.id
                ],
            )
            .map_err(from_rusqlite)?;
            tx.commit().map_err(from_rusqlite)?;

            info!(location = %location, revision_id = newest.id, "repaired latest revision pointer");
            report.repaired.push(location);
        }
        Ok(report)
    }

    fn list_revisions(&self, location: &Location) -> Result<Vec<Revision>> {
        let Some(item) = find_item(&self.conn, location)? else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {REVISION_COLUMNS} FROM item_revisions WHERE item_id = ?1
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let revisions = stmt
            .query_map([item.id], revision_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(revisions)
    }

    fn get_item(&self, location: &Location) -> Result<Option<Item>> {
        find_item(&self.conn, location)
    }
}

impl ExceptionLog for SqliteStore {
    fn store_exceptions(
        &mut self,
        run_id: &RunId,
        exceptions: &ExceptionMap,
        recorded_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Result<usize> {
        let expires_at = expiry(recorded_at, ttl)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;
        for record in exceptions.iter() {
            let scope = serde_json::to_string(&record.scope)?;
            tx.execute(
                "INSERT INTO collection_exceptions
                    (run_id, technology, scope, code, message, recorded_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    run_id.as_str(),
                    record.scope.technology_part(),
                    scope,
                    record.code,
                    record.message,
                    to_millis(recorded_at),
                    to_millis(expires_at),
                ],
            )
            .map_err(from_rusqlite)?;
        }
        tx.commit().map_err(from_rusqlite)?;
        Ok(exceptions.len())
    }

    fn clear_expired_exceptions(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM collection_exceptions WHERE expires_at <= ?1",
                [to_millis(now)],
            )
            .map_err(from_rusqlite)?;
        if removed > 0 {
            debug!(removed, "expired collection exceptions cleared");
        }
        Ok(removed)
    }

    fn list_exceptions(&self) -> Result<Vec<PersistedException>> {
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM collection_exceptions ORDER BY recorded_at, id"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([], exception_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(rows)
    }
}

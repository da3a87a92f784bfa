//! Hydration: turns database rows back into domain records
//!
//! Column lists are fixed so that each mapper can read by position.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use secmonkey_core::exceptions::{ExceptionRecord, PersistedException};
use secmonkey_core::hashing::ConfigHash;
use secmonkey_core::model::{ConfigValue, ExceptionScope, Item, Location, Revision};

pub const ITEM_COLUMNS: &str = "id, technology, account, region, name, active, \
     latest_revision_id, latest_complete_hash, latest_durable_hash, created_at, updated_at";

pub const REVISION_COLUMNS: &str =
    "id, item_id, arn, config, complete_hash, durable_hash, durable, active, created_at";

pub const EXCEPTION_COLUMNS: &str = "run_id, scope, code, message, recorded_at, expires_at";

/// Epoch milliseconds as stored in every timestamp column.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Current time truncated to what the database keeps.
pub fn now_millis() -> (i64, DateTime<Utc>) {
    let ms = to_millis(Utc::now());
    (ms, DateTime::from_timestamp_millis(ms).unwrap_or_default())
}

fn millis_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {ms}").into(),
        )
    })
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a row selected with [`ITEM_COLUMNS`].
pub fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        location: Location::new(
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ),
        active: row.get(5)?,
        latest_revision_id: row.get(6)?,
        latest_complete_hash: row.get::<_, Option<String>>(7)?.map(ConfigHash::from_hex),
        latest_durable_hash: row.get::<_, Option<String>>(8)?.map(ConfigHash::from_hex),
        created_at: millis_at(row, 9)?,
        updated_at: millis_at(row, 10)?,
    })
}

/// Map a row selected with [`REVISION_COLUMNS`].
pub fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<Revision> {
    let config: ConfigValue = json_at(row, 3)?;
    Ok(Revision {
        id: row.get(0)?,
        item_id: row.get(1)?,
        arn: row.get(2)?,
        config,
        complete_hash: ConfigHash::from_hex(row.get::<_, String>(4)?),
        durable_hash: ConfigHash::from_hex(row.get::<_, String>(5)?),
        durable: row.get(6)?,
        active: row.get(7)?,
        created_at: millis_at(row, 8)?,
    })
}

/// Map a row selected with [`EXCEPTION_COLUMNS`].
pub fn exception_from_row(row: &Row<'_>) -> rusqlite::Result<PersistedException> {
    let scope: ExceptionScope = json_at(row, 1)?;
    Ok(PersistedException {
        run_id: row.get(0)?,
        record: ExceptionRecord {
            scope,
            code: row.get(2)?,
            message: row.get(3)?,
        },
        recorded_at: millis_at(row, 4)?,
        expires_at: millis_at(row, 5)?,
    })
}

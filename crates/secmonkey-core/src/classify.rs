//! Previous/current snapshot classification.
//!
//! [`classify`] joins two snapshot collections on [`Location`] and sorts every
//! location into created, changed (durable), ephemeral or deleted. Locations
//! covered by an [`ExceptionMap`] entry are never reported as changed or
//! deleted, because a collection failure is not evidence that a resource
//! went away or changed.

use crate::diff::{field_changes, FieldChange};
use crate::errors::Result;
use crate::exceptions::ExceptionMap;
use crate::hashing::{strip_ephemeral, EphemeralPath};
use crate::model::{ConfigSnapshot, ConfigValue, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// How a location moved between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    Created,
    /// Differs after ephemeral fields are stripped
    Changed,
    /// Differs only in ephemeral fields
    Ephemeral,
    Deleted,
}

impl ChangeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeClass::Created => "created",
            ChangeClass::Changed => "changed",
            ChangeClass::Ephemeral => "ephemeral",
            ChangeClass::Deleted => "deleted",
        }
    }
}

/// One classified location with both sides of the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeItem {
    pub location: Location,
    pub class: ChangeClass,
    pub arn: Option<String>,
    pub old_config: Option<ConfigValue>,
    pub new_config: Option<ConfigValue>,
}

impl ChangeItem {
    /// The current observation, for anything that was seen this poll.
    pub fn current_snapshot(&self) -> Option<ConfigSnapshot> {
        self.new_config.as_ref().map(|config| ConfigSnapshot {
            location: self.location.clone(),
            arn: self.arn.clone(),
            config: config.clone(),
        })
    }

    /// Leaf-level field changes between the old and new config. A missing
    /// side is treated as an empty map.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the two configs have different root shapes.
    pub fn field_changes(&self) -> Result<Vec<FieldChange>> {
        let empty = ConfigValue::empty_map();
        let old = self.old_config.as_ref().unwrap_or(&empty);
        let new = self.new_config.as_ref().unwrap_or(&empty);
        field_changes(old, new)
    }
}

/// Result of [`classify`]. Every list is sorted by location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub created: Vec<ChangeItem>,
    pub changed: Vec<ChangeItem>,
    pub ephemeral: Vec<ChangeItem>,
    pub deleted: Vec<ChangeItem>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.changed.is_empty()
            && self.ephemeral.is_empty()
            && self.deleted.is_empty()
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.changed.len() + self.ephemeral.len() + self.deleted.len()
    }
}

/// Classify `current` against `previous`.
///
/// - deleted: in previous only, unless covered by `exceptions`
/// - created: in current only (never filtered)
/// - changed / ephemeral: in both, not covered, and unequal after list
///   normalisation. With no `ephemeral_paths` every such change is durable;
///   otherwise the stripped copies decide.
///
/// When a location appears more than once in the same input, the last
/// occurrence wins.
pub fn classify(
    previous: &[ConfigSnapshot],
    current: &[ConfigSnapshot],
    exceptions: &ExceptionMap,
    ephemeral_paths: &[EphemeralPath],
) -> Classification {
    let prev_map = index_by_location(previous, "previous");
    let curr_map = index_by_location(current, "current");

    let mut out = Classification::default();

    for (location, prev) in &prev_map {
        if curr_map.contains_key(location) {
            continue;
        }
        if exceptions.covers(location) {
            debug!(location = %location, "absent but covered by exception; not deleted");
            continue;
        }
        out.deleted.push(ChangeItem {
            location: (*location).clone(),
            class: ChangeClass::Deleted,
            arn: prev.arn.clone(),
            old_config: Some(prev.config.clone()),
            new_config: None,
        });
    }

    for (location, curr) in &curr_map {
        let Some(prev) = prev_map.get(location) else {
            out.created.push(ChangeItem {
                location: (*location).clone(),
                class: ChangeClass::Created,
                arn: curr.arn.clone(),
                old_config: None,
                new_config: Some(curr.config.clone()),
            });
            continue;
        };

        if exceptions.covers(location) {
            continue;
        }

        let old_norm = prev.config.normalized();
        let new_norm = curr.config.normalized();
        if old_norm == new_norm {
            continue;
        }

        let class = if ephemeral_paths.is_empty() {
            ChangeClass::Changed
        } else {
            let old_durable = strip_ephemeral(&prev.config, ephemeral_paths).normalized();
            let new_durable = strip_ephemeral(&curr.config, ephemeral_paths).normalized();
            if old_durable != new_durable {
                ChangeClass::Changed
            } else {
                ChangeClass::Ephemeral
            }
        };

        let item = ChangeItem {
            location: (*location).clone(),
            class,
            arn: curr.arn.clone(),
            old_config: Some(prev.config.clone()),
            new_config: Some(curr.config.clone()),
        };
        match class {
            ChangeClass::Changed => out.changed.push(item),
            _ => out.ephemeral.push(item),
        }
    }

    out
}

fn index_by_location<'a>(
    snapshots: &'a [ConfigSnapshot],
    side: &str,
) -> BTreeMap<&'a Location, &'a ConfigSnapshot> {
    let mut map = BTreeMap::new();
    for snapshot in snapshots {
        if map.insert(&snapshot.location, snapshot).is_some() {
            warn!(
                location = %snapshot.location,
                side,
                "duplicate location in snapshot set; keeping the last one"
            );
        }
    }
    map
}

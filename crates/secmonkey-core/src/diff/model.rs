//! Structural diff output types.
//!
//! All types implement `Debug, Clone, Serialize, Deserialize, PartialEq`.
//! Map children live in a `BTreeMap`, so traversal order is deterministic.

use crate::model::value::ConfigValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of the diff tree between two configuration values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiffNode {
    /// Same value on both sides
    Unchanged { value: ConfigValue },
    /// Present only on the new side
    Added { value: ConfigValue },
    /// Present only on the old side
    Removed { value: ConfigValue },
    /// Scalar (or differently-typed) value swapped for another
    Replaced { old: ConfigValue, new: ConfigValue },
    /// Both sides are maps; children keyed by map key
    Map { children: BTreeMap<String, DiffNode> },
    /// Both sides are lists
    List { entries: Vec<ListEntryDiff> },
}

/// A list element in the diff, with its index on each side where it exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListEntryDiff {
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
    pub node: DiffNode,
}

impl DiffNode {
    /// True if nothing under this node differs.
    pub fn is_unchanged(&self) -> bool {
        match self {
            DiffNode::Unchanged { .. } => true,
            DiffNode::Added { .. } | DiffNode::Removed { .. } | DiffNode::Replaced { .. } => false,
            DiffNode::Map { children } => children.values().all(DiffNode::is_unchanged),
            DiffNode::List { entries } => entries.iter().all(|e| e.node.is_unchanged()),
        }
    }
}

/// Kind of a flattened field change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FieldChangeKind {
    Added,
    Removed,
    Replaced,
}

/// A leaf-level change with its path from the root.
///
/// Paths join map keys with `.` and list indices as `[i]`, e.g.
/// `rules[2].port`. List indices refer to the new side, or to the old side
/// for removed elements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    pub path: String,
    pub kind: FieldChangeKind,
    pub old: Option<ConfigValue>,
    pub new: Option<ConfigValue>,
}

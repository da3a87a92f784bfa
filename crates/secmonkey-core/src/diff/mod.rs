//! Structural configuration diff.
//!
//! Compares two configuration trees and produces a deterministic diff tree,
//! plus a flattened list of field changes for reporting.
//!
//! ## Entry point
//!
//! ```
//! use secmonkey_core::diff::{field_changes, FieldChangeKind};
//! use secmonkey_core::model::ConfigValue;
//!
//! let old = ConfigValue::from(serde_json::json!(["Sam", "Jason"]));
//! let new = ConfigValue::from(serde_json::json!(["Sam", "Jason", "Ben"]));
//! let changes = field_changes(&old, &new).unwrap();
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes[0].kind, FieldChangeKind::Added);
//! ```
//!
//! ## Guarantees
//!
//! - **Determinism**: identical inputs produce identical diff trees.
//! - **Minimal list diffs**: an appended list element is reported alone, not as
//!   a replacement of the whole list.

pub mod engine;
pub mod human_summary;
pub mod model;

pub use engine::{compute_diff, field_changes, flatten, levenshtein};
pub use human_summary::{render_change_summary, render_field_changes};
pub use model::{DiffNode, FieldChange, FieldChangeKind, ListEntryDiff};

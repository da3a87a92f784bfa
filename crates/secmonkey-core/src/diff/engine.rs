//! Structural diff computation engine.
//!
//! The core entry point is [`compute_diff`], which walks two configuration
//! trees in lockstep and produces a [`DiffNode`] tree. [`flatten`] turns
//! that tree into leaf-level [`FieldChange`]s.
//!
//! ## List matching
//!
//! Lists are first matched exactly (multiset). Each leftover added element
//! is then paired with the most similar leftover removed element of the same
//! type, measured by Levenshtein distance over canonical JSON:
//!
//! 1. a single candidate of the same type is taken without measuring
//! 2. a distance of 0 wins immediately
//! 3. otherwise the lowest distance wins; on a tie the earliest candidate wins
//!
//! Paired containers are diffed recursively, paired scalars are `Replaced`.
//! Anything left unpaired is reported as `Added` or `Removed`.

use crate::diff::model::{DiffNode, FieldChange, FieldChangeKind, ListEntryDiff};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::value::ConfigValue;
use std::collections::BTreeMap;

/// Diff two configuration roots.
///
/// # Errors
///
/// `TypeMismatch` when one root is a map and the other a list or scalar (or
/// any other container-shape disagreement). Type changes below the root are
/// reported as ordinary differences.
pub fn compute_diff(old: &ConfigValue, new: &ConfigValue) -> Result<DiffNode> {
    if shape(old) != shape(new) {
        return Err(ExError::new(ExErrorKind::TypeMismatch)
            .with_op("compute_diff")
            .with_message(format!(
                "cannot diff a {} against a {}",
                old.type_name(),
                new.type_name()
            )));
    }
    Ok(diff_values(old, new))
}

/// Convenience: diff and flatten in one call.
///
/// # Errors
///
/// Same as [`compute_diff`].
pub fn field_changes(old: &ConfigValue, new: &ConfigValue) -> Result<Vec<FieldChange>> {
    compute_diff(old, new).map(|node| flatten(&node))
}

#[derive(PartialEq, Eq)]
enum Shape {
    Scalar,
    List,
    Map,
}

fn shape(v: &ConfigValue) -> Shape {
    match v {
        ConfigValue::Scalar(_) => Shape::Scalar,
        ConfigValue::List(_) => Shape::List,
        ConfigValue::Map(_) => Shape::Map,
    }
}

fn diff_values(old: &ConfigValue, new: &ConfigValue) -> DiffNode {
    match (old, new) {
        (ConfigValue::Map(a), ConfigValue::Map(b)) => diff_maps(a, b),
        (ConfigValue::List(a), ConfigValue::List(b)) => diff_lists(a, b),
        _ if old == new => DiffNode::Unchanged { value: new.clone() },
        _ => DiffNode::Replaced {
            old: old.clone(),
            new: new.clone(),
        },
    }
}

fn diff_maps(
    old: &BTreeMap<String, ConfigValue>,
    new: &BTreeMap<String, ConfigValue>,
) -> DiffNode {
    let mut children = BTreeMap::new();
    for (key, old_value) in old {
        let node = match new.get(key) {
            Some(new_value) => diff_values(old_value, new_value),
            None => DiffNode::Removed {
                value: old_value.clone(),
            },
        };
        children.insert(key.clone(), node);
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            children.insert(
                key.clone(),
                DiffNode::Added {
                    value: new_value.clone(),
                },
            );
        }
    }
    DiffNode::Map { children }
}

fn diff_lists(old: &[ConfigValue], new: &[ConfigValue]) -> DiffNode {
    // Exact multiset matching: each new element claims the first unclaimed equal old element
    let mut old_claimed = vec![false; old.len()];
    let mut new_match: Vec<Option<usize>> = vec![None; new.len()];
    for (ni, item) in new.iter().enumerate() {
        if let Some(oi) = (0..old.len()).find(|&oi| !old_claimed[oi] && old[oi] == *item) {
            old_claimed[oi] = true;
            new_match[ni] = Some(oi);
        }
    }

    // Pair leftovers by similarity
    let mut paired: Vec<Option<usize>> = vec![None; new.len()];
    for (ni, item) in new.iter().enumerate() {
        if new_match[ni].is_some() {
            continue;
        }
        let candidates: Vec<usize> = (0..old.len())
            .filter(|&oi| !old_claimed[oi] && old[oi].type_name() == item.type_name())
            .collect();
        if let Some(oi) = best_candidate(item, old, &candidates) {
            old_claimed[oi] = true;
            paired[ni] = Some(oi);
        }
    }

    let mut entries = Vec::with_capacity(new.len());
    for (ni, item) in new.iter().enumerate() {
        let entry = match (new_match[ni], paired[ni]) {
            (Some(oi), _) => ListEntryDiff {
                old_index: Some(oi),
                new_index: Some(ni),
                node: DiffNode::Unchanged {
                    value: item.clone(),
                },
            },
            (None, Some(oi)) => ListEntryDiff {
                old_index: Some(oi),
                new_index: Some(ni),
                node: diff_values(&old[oi], item),
            },
            (None, None) => ListEntryDiff {
                old_index: None,
                new_index: Some(ni),
                node: DiffNode::Added {
                    value: item.clone(),
                },
            },
        };
        entries.push(entry);
    }
    for (oi, item) in old.iter().enumerate() {
        if !old_claimed[oi] {
            entries.push(ListEntryDiff {
                old_index: Some(oi),
                new_index: None,
                node: DiffNode::Removed {
                    value: item.clone(),
                },
            });
        }
    }
    DiffNode::List { entries }
}

fn best_candidate(item: &ConfigValue, old: &[ConfigValue], candidates: &[usize]) -> Option<usize> {
    match candidates {
        [] => None,
        [only] => Some(*only),
        _ => {
            let target = item.canonical_json();
            let mut best: Option<(usize, usize)> = None;
            for &oi in candidates {
                let distance = levenshtein(&target, &old[oi].canonical_json());
                if distance == 0 {
                    return Some(oi);
                }
                // strict: equal distances keep the earlier candidate
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((oi, distance));
                }
            }
            best.map(|(oi, _)| oi)
        }
    }
}

/// Character-level Levenshtein edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Flatten a diff tree into leaf-level changes, in tree order.
pub fn flatten(node: &DiffNode) -> Vec<FieldChange> {
    let mut out = Vec::new();
    flatten_into(node, String::new(), &mut out);
    out
}

fn flatten_into(node: &DiffNode, path: String, out: &mut Vec<FieldChange>) {
    match node {
        DiffNode::Unchanged { .. } => {}
        DiffNode::Added { value } => out.push(FieldChange {
            path,
            kind: FieldChangeKind::Added,
            old: None,
            new: Some(value.clone()),
        }),
        DiffNode::Removed { value } => out.push(FieldChange {
            path,
            kind: FieldChangeKind::Removed,
            old: Some(value.clone()),
            new: None,
        }),
        DiffNode::Replaced { old, new } => out.push(FieldChange {
            path,
            kind: FieldChangeKind::Replaced,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }),
        DiffNode::Map { children } => {
            for (key, child) in children {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                flatten_into(child, child_path, out);
            }
        }
        DiffNode::List { entries } => {
            for entry in entries {
                let index = entry.new_index.or(entry.old_index).unwrap_or_default();
                flatten_into(&entry.node, format!("{path}[{index}]"), out);
            }
        }
    }
}

//! Ephemeral field paths.
//!
//! A path is a `.`-separated list of segments. `*` matches every key of a
//! map or every element of a list at that level; a numeric segment also
//! addresses a list element by index. Examples:
//!
//! - `last_status_change`
//! - `tunnels.*.last_status_change`
//! - `accesskeys.*.LastUsedDate`

use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::value::ConfigValue;
use serde::{Deserialize, Serialize};
use std::fmt;

const SEPARATOR: char = '.';
const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Key(String),
    Wildcard,
}

/// Parsed ephemeral path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EphemeralPath {
    raw: String,
    segments: Vec<Segment>,
}

impl EphemeralPath {
    /// Parse a path string.
    ///
    /// # Errors
    ///
    /// `InvalidPath` for an empty path or any empty segment (`a..b`, `.a`, `a.`).
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }
        let mut segments = Vec::new();
        for part in raw.split(SEPARATOR) {
            if part.is_empty() {
                return Err(invalid(raw, "path has an empty segment"));
            }
            if part == WILDCARD {
                segments.push(Segment::Wildcard);
            } else {
                segments.push(Segment::Key(part.to_string()));
            }
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Parse many paths, failing on the first malformed one.
    ///
    /// # Errors
    ///
    /// `InvalidPath` naming the offending path.
    pub fn parse_all<S: AsRef<str>>(raws: &[S]) -> Result<Vec<Self>> {
        raws.iter().map(|r| Self::parse(r.as_ref())).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Delete every node this path addresses. Returns whether anything was removed.
    /// Missing intermediate nodes are not an error.
    pub fn strip(&self, value: &mut ConfigValue) -> bool {
        strip_segments(value, &self.segments)
    }

    /// Whether this path addresses at least one node of `value`.
    pub fn matches_any(&self, value: &ConfigValue) -> bool {
        let mut copy = value.clone();
        self.strip(&mut copy)
    }
}

fn invalid(raw: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidPath)
        .with_op("parse_ephemeral_path")
        .with_message(format!("{reason}: {raw:?}"))
}

fn strip_segments(value: &mut ConfigValue, segments: &[Segment]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };
    let last = rest.is_empty();

    match (value, head) {
        (ConfigValue::Map(map), Segment::Key(key)) => {
            if last {
                map.remove(key).is_some()
            } else {
                map.get_mut(key)
                    .map(|child| strip_segments(child, rest))
                    .unwrap_or(false)
            }
        }
        (ConfigValue::Map(map), Segment::Wildcard) => {
            if last {
                let removed = !map.is_empty();
                map.clear();
                removed
            } else {
                let mut removed = false;
                for child in map.values_mut() {
                    removed |= strip_segments(child, rest);
                }
                removed
            }
        }
        (ConfigValue::List(items), Segment::Wildcard) => {
            if last {
                let removed = !items.is_empty();
                items.clear();
                removed
            } else {
                let mut removed = false;
                for child in items.iter_mut() {
                    removed |= strip_segments(child, rest);
                }
                removed
            }
        }
        (ConfigValue::List(items), Segment::Key(key)) => match key.parse::<usize>() {
            Ok(index) if index < items.len() => {
                if last {
                    items.remove(index);
                    true
                } else {
                    strip_segments(&mut items[index], rest)
                }
            }
            _ => false,
        },
        (ConfigValue::Scalar(_), _) => false,
    }
}

impl TryFrom<String> for EphemeralPath {
    type Error = ExError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<EphemeralPath> for String {
    fn from(path: EphemeralPath) -> Self {
        path.raw
    }
}

impl fmt::Display for EphemeralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cv(v: serde_json::Value) -> ConfigValue {
        ConfigValue::from(v)
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for bad in ["", ".", "a..b", ".a", "a."] {
            let err = EphemeralPath::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ExErrorKind::InvalidPath, "path {bad:?}");
        }
    }

    #[test]
    fn test_strip_top_level_key() {
        let path = EphemeralPath::parse("last_status_change").unwrap();
        let mut v = cv(json!({"last_status_change": "now", "state": "up"}));
        assert!(path.strip(&mut v));
        assert_eq!(v, cv(json!({"state": "up"})));
    }

    #[test]
    fn test_strip_wildcard_through_list() {
        let path = EphemeralPath::parse("tunnels.*.last_status_change").unwrap();
        let mut v = cv(json!({"tunnels": [
            {"ip": "1.1.1.1", "last_status_change": "t1"},
            {"ip": "2.2.2.2", "last_status_change": "t2"}
        ]}));
        assert!(path.strip(&mut v));
        assert_eq!(
            v,
            cv(json!({"tunnels": [{"ip": "1.1.1.1"}, {"ip": "2.2.2.2"}]}))
        );
    }

    #[test]
    fn test_strip_wildcard_through_map() {
        let path = EphemeralPath::parse("accesskeys.*.LastUsedDate").unwrap();
        let mut v = cv(json!({"accesskeys": {
            "AKIA1": {"Status": "Active", "LastUsedDate": "2024-01-01"},
            "AKIA2": {"Status": "Inactive"}
        }}));
        assert!(path.strip(&mut v));
        assert_eq!(
            v.get("accesskeys").and_then(|k| k.get("AKIA1")),
            Some(&cv(json!({"Status": "Active"})))
        );
    }

    #[test]
    fn test_missing_path_is_noop() {
        let path = EphemeralPath::parse("a.b.c").unwrap();
        let original = cv(json!({"a": {"x": 1}, "z": [1, 2]}));
        let mut v = original.clone();
        assert!(!path.strip(&mut v));
        assert_eq!(v, original);
    }

    #[test]
    fn test_index_segment_on_list() {
        let path = EphemeralPath::parse("rules.1.seen").unwrap();
        let mut v = cv(json!({"rules": [{"seen": 1}, {"seen": 2, "port": 22}]}));
        assert!(path.strip(&mut v));
        assert_eq!(v, cv(json!({"rules": [{"seen": 1}, {"port": 22}]})));
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let p: EphemeralPath = serde_json::from_str("\"tunnels.*.x\"").unwrap();
        assert_eq!(p.as_str(), "tunnels.*.x");
        assert!(serde_json::from_str::<EphemeralPath>("\"a..b\"").is_err());
    }
}

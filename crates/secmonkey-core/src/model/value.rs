//! Tagged configuration value.
//!
//! Collectors hand us arbitrary JSON. It is converted once into
//! [`ConfigValue`] so that hashing, path stripping and the structural diff
//! can recurse over an exhaustive enum instead of re-inspecting dynamic types
//! at every level.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Leaf value of a configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// A configuration tree: scalar, list or string-keyed map.
///
/// Maps are `BTreeMap`s, so key order never affects equality, hashing or
/// serialization. List order is significant unless [`ConfigValue::normalized`]
/// is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ConfigValue {
    Scalar(Scalar),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Empty map, the config of an item that has no data yet.
    pub fn empty_map() -> Self {
        ConfigValue::Map(BTreeMap::new())
    }

    /// Shorthand for a string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::String(s.into()))
    }

    /// Name of the runtime type, used to decide whether two list items may be
    /// paired as a replacement.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Scalar(Scalar::Null) => "null",
            ConfigValue::Scalar(Scalar::Bool(_)) => "bool",
            ConfigValue::Scalar(Scalar::Number(_)) => "number",
            ConfigValue::Scalar(Scalar::String(_)) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Map(_) => "map",
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a direct child of a map.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Convert back into a `serde_json::Value`.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Scalar(Scalar::Null) => Value::Null,
            ConfigValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            ConfigValue::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            ConfigValue::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            ConfigValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            ConfigValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Compact JSON with sorted keys. Two values are structurally equal iff
    /// their canonical JSON strings are equal.
    pub fn canonical_json(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            ConfigValue::Scalar(Scalar::Null) => out.push_str("null"),
            ConfigValue::Scalar(Scalar::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
            ConfigValue::Scalar(Scalar::Number(n)) => out.push_str(&n.to_string()),
            ConfigValue::Scalar(Scalar::String(s)) => push_json_string(out, s),
            ConfigValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            ConfigValue::Map(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    push_json_string(out, key);
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }

    /// Copy of this value with every list recursively sorted by the canonical
    /// JSON of its (already normalized) elements.
    ///
    /// Used for change detection so that a provider returning the same set in
    /// a different order does not count as a change.
    pub fn normalized(&self) -> ConfigValue {
        match self {
            ConfigValue::Scalar(_) => self.clone(),
            ConfigValue::Map(map) => ConfigValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.normalized()))
                    .collect(),
            ),
            ConfigValue::List(items) => {
                let mut keyed: Vec<(String, ConfigValue)> = items
                    .iter()
                    .map(|v| {
                        let n = v.normalized();
                        (n.canonical_json(), n)
                    })
                    .collect();
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
                ConfigValue::List(keyed.into_iter().map(|(_, v)| v).collect())
            }
        }
    }
}

fn push_json_string(out: &mut String, s: &str) {
    // Value's Display handles escaping
    out.push_str(&Value::String(s.to_string()).to_string());
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Scalar(Scalar::Null),
            Value::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ConfigValue::Scalar(Scalar::Number(n)),
            Value::String(s) => ConfigValue::Scalar(Scalar::String(s)),
            Value::Array(items) => ConfigValue::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                ConfigValue::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        value.to_json()
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        Self::empty_map()
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a = ConfigValue::from(json!({"b": 1, "a": 2}));
        let b = ConfigValue::from(json!({"a": 2, "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a.canonical_json(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_list_order_matters_until_normalized() {
        let a = ConfigValue::from(json!({"ports": [443, 80]}));
        let b = ConfigValue::from(json!({"ports": [80, 443]}));
        assert_ne!(a, b);
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn test_normalize_sorts_nested_lists_of_maps() {
        let a = ConfigValue::from(json!([{"x": [2, 1]}, {"a": 1}]));
        let b = ConfigValue::from(json!([{"a": 1}, {"x": [1, 2]}]));
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ConfigValue::from(json!(null)).type_name(), "null");
        assert_eq!(ConfigValue::from(json!(1)).type_name(), "number");
        assert_eq!(ConfigValue::from(json!("s")).type_name(), "string");
        assert_eq!(ConfigValue::from(json!([])).type_name(), "list");
        assert_eq!(ConfigValue::from(json!({})).type_name(), "map");
    }

    #[test]
    fn test_serde_is_plain_json() {
        let v: ConfigValue = serde_json::from_str(r#"{"a":[1,"x",null,true]}"#).unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"a":[1,"x",null,true]}"#);
    }
}

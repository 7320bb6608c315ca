//! Flattening of nested JSON maps into path-keyed entries.
//!
//! `{"pool": {"eth": {"delta": 1.5}}}` becomes `["pool", "eth", "delta"] => 1.5`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key path from the root map down to a leaf.
pub type KeyPath = Vec<String>;

/// Flatten a nested map. Every non-object value is a leaf; empty nested
/// maps produce no entries. Each call builds its own accumulator.
pub fn flatten(root: &Map<String, Value>) -> BTreeMap<KeyPath, Value> {
    let mut flat = BTreeMap::new();
    let mut stack: Vec<(KeyPath, &Map<String, Value>)> = vec![(Vec::new(), root)];

    while let Some((path, map)) = stack.pop() {
        for (key, value) in map {
            let mut key_path = path.clone();
            key_path.push(key.clone());
            match value {
                Value::Object(child) => stack.push((key_path, child)),
                leaf => {
                    flat.insert(key_path, leaf.clone());
                }
            }
        }
    }

    flat
}

/// Flatten any JSON value. A non-object root is a single leaf at the empty
/// path; `null` flattens to nothing.
pub fn flatten_value(value: &Value) -> BTreeMap<KeyPath, Value> {
    match value {
        Value::Object(map) => flatten(map),
        Value::Null => BTreeMap::new(),
        leaf => BTreeMap::from([(Vec::new(), leaf.clone())]),
    }
}

/// Join a key path for display, e.g. `pool.eth.delta`.
pub fn join_path(path: &[String], separator: &str) -> String {
    path.join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> KeyPath {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_flatten_nested_map() {
        let value = json!({
            "timestamp": 1700000000,
            "pool": {
                "ETH": {"delta": "1.5", "weight": "0.3"},
                "BTC": {"delta": "-0.2"}
            }
        });

        let flat = flatten_value(&value);

        assert_eq!(flat.len(), 4);
        assert_eq!(flat[&path(&["timestamp"])], json!(1700000000));
        assert_eq!(flat[&path(&["pool", "ETH", "delta"])], json!("1.5"));
        assert_eq!(flat[&path(&["pool", "ETH", "weight"])], json!("0.3"));
        assert_eq!(flat[&path(&["pool", "BTC", "delta"])], json!("-0.2"));
    }

    #[test]
    fn test_flatten_does_not_leak_between_calls() {
        let first = flatten_value(&json!({"a": {"b": 1}}));
        let second = flatten_value(&json!({"c": 2}));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(second.contains_key(&path(&["c"])));
        assert!(!second.contains_key(&path(&["a", "b"])));
    }

    #[test]
    fn test_empty_nested_map_and_arrays() {
        let flat = flatten_value(&json!({"empty": {}, "list": [1, 2]}));

        assert_eq!(flat.len(), 1);
        assert_eq!(flat[&path(&["list"])], json!([1, 2]));
    }

    #[test]
    fn test_scalar_and_null_roots() {
        assert!(flatten_value(&Value::Null).is_empty());
        assert_eq!(flatten_value(&json!(3))[&Vec::new()], json!(3));
        assert_eq!(join_path(&path(&["pool", "ETH", "delta"]), "."), "pool.ETH.delta");
    }
}

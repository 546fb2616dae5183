//! Immutable merge of a patch record into a state record.
//!
//! Both merges are total: any pair of records yields a new record. Values in
//! the current record that the patch does not touch are carried over by
//! reference, never copied.

use crate::types::{Record, Value};

/// Shallow merge: every key of the patch replaces the key in `current`.
///
/// Nested records and arrays in the patch replace wholesale. A `Null` in the
/// patch clears the key but keeps it present. An absent `current` merges as
/// an empty record.
pub fn merge(current: Option<&Record>, patch: &Record) -> Record {
    match current {
        Some(current) => current.merge(patch),
        None => Record::new().merge(patch),
    }
}

/// Deep merge: record-valued patch entries recurse into the current value.
///
/// A current value that is missing or not a record is treated as an empty
/// record to merge into. Arrays, primitives and `Null` replace wholesale,
/// exactly as in [`merge`].
pub fn merge_deep(current: Option<&Record>, patch: &Record) -> Record {
    match current {
        Some(current) => current.merge_deep(patch),
        None => Record::new().merge_deep(patch),
    }
}

impl Record {
    /// Shallow merge of `patch` into this record. See [`merge`].
    pub fn merge(&self, patch: &Record) -> Record {
        if patch.is_empty() {
            return self.clone();
        }

        let mut map = self.to_map();
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
        Record::from_map(map)
    }

    /// Deep merge of `patch` into this record. See [`merge_deep`].
    pub fn merge_deep(&self, patch: &Record) -> Record {
        if patch.is_empty() {
            return self.clone();
        }

        let mut map = self.to_map();
        for (key, value) in patch {
            let merged = match value {
                Value::Record(sub) => {
                    let merged = match map.get(key) {
                        Some(Value::Record(base)) => base.merge_deep(sub),
                        _ => Record::new().merge_deep(sub),
                    };
                    Value::Record(merged)
                }
                other => other.clone(),
            };
            map.insert(key.clone(), merged);
        }
        Record::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[test]
    fn test_merge_into_absent() {
        let result = merge(None, &rec(json!({"a": 2})));
        assert_eq!(result.to_json(), json!({"a": 2}));
    }

    #[test]
    fn test_merge_basic_types() {
        let cases = [
            (json!({"a": 1, "b": 1}), json!({"a": 2}), json!({"a": 2, "b": 1})),
            (json!({"a": "1", "b": 1}), json!({"a": "2"}), json!({"a": "2", "b": 1})),
            (
                json!({"a": "1", "b": true}),
                json!({"b": false}),
                json!({"a": "1", "b": false}),
            ),
            (
                json!({"a": 1, "b": 1, "c": "1"}),
                json!({"a": 2, "c": "2"}),
                json!({"a": 2, "b": 1, "c": "2"}),
            ),
        ];

        for (current, patch, expected) in cases {
            assert_eq!(merge(Some(&rec(current)), &rec(patch)).to_json(), expected);
        }
    }

    #[test]
    fn test_merge_replaces_composites() {
        let result = merge(
            Some(&rec(json!({"a": {"b": 1, "c": 1}, "d": 1}))),
            &rec(json!({"a": {"b": 2}})),
        );
        assert_eq!(result.to_json(), json!({"a": {"b": 2}, "d": 1}));

        let result = merge(Some(&rec(json!({"a": [1, 2, 3], "b": 1}))), &rec(json!({"a": [2]})));
        assert_eq!(result.to_json(), json!({"a": [2], "b": 1}));
    }

    #[test]
    fn test_merge_null_clears_but_keeps_key() {
        let result = merge(Some(&rec(json!({"a": 1, "b": 1}))), &rec(json!({"a": null})));
        assert!(result.contains_key("a"));
        assert!(result.get("a").unwrap().is_null());
        assert_eq!(result.get("b").unwrap().as_i64(), Some(1));
    }

    #[test]
    fn test_merge_deep_nested() {
        let result = merge_deep(
            Some(&rec(json!({"a": {"b": 1, "c": {"d": 1, "e": 1}}, "f": 1}))),
            &rec(json!({"a": {"c": {"d": 2}}})),
        );
        assert_eq!(
            result.to_json(),
            json!({"a": {"b": 1, "c": {"d": 2, "e": 1}}, "f": 1})
        );
    }

    #[test]
    fn test_merge_deep_arrays_are_leaves() {
        let result = merge_deep(
            Some(&rec(json!({"a": {"b": 1, "c": {"d": [1, 2, 3], "e": [1]}}, "f": "1"}))),
            &rec(json!({"a": {"c": {"d": [3, 2]}}, "f": "2"})),
        );
        assert_eq!(
            result.to_json(),
            json!({"a": {"b": 1, "c": {"d": [3, 2], "e": [1]}}, "f": "2"})
        );
    }

    #[test]
    fn test_merge_deep_over_non_record() {
        let result = merge_deep(
            Some(&rec(json!({"a": 5, "b": [1]}))),
            &rec(json!({"a": {"x": 1}, "b": {"y": 2}, "c": {"z": {"w": 3}}})),
        );
        assert_eq!(
            result.to_json(),
            json!({"a": {"x": 1}, "b": {"y": 2}, "c": {"z": {"w": 3}}})
        );
    }

    #[test]
    fn test_merge_deep_shares_untouched_subtrees() {
        let current = rec(json!({"left": {"x": 1}, "right": {"y": {"z": 2}, "w": 1}}));
        let result = merge_deep(Some(&current), &rec(json!({"right": {"w": 2}})));

        let old_left = current.get("left").unwrap().as_record().unwrap();
        let new_left = result.get("left").unwrap().as_record().unwrap();
        assert!(Record::ptr_eq(old_left, new_left));

        let old_y = current.get("right").unwrap().as_record().unwrap().get("y").unwrap();
        let new_y = result.get("right").unwrap().as_record().unwrap().get("y").unwrap();
        assert!(Record::ptr_eq(old_y.as_record().unwrap(), new_y.as_record().unwrap()));

        let old_right = current.get("right").unwrap().as_record().unwrap();
        let new_right = result.get("right").unwrap().as_record().unwrap();
        assert!(!Record::ptr_eq(old_right, new_right));
    }
}

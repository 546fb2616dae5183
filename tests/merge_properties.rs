//! Property tests for the merge engine and derived streams.

use proptest::prelude::*;
use statecell::{compose, merge, merge_deep, Partial, Record, StateCell, Value};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        "[a-z]{0,4}".prop_map(Value::from),
        prop::collection::vec(0i64..10, 0..3).prop_map(Value::from),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop::collection::btree_map("[a-d]", inner, 0..4)
            .prop_map(|entries| Value::Record(entries.into_iter().collect()))
    })
}

fn record() -> impl Strategy<Value = Record> {
    prop::collection::btree_map("[a-f]", value(), 0..6)
        .prop_map(|entries| entries.into_iter().collect())
}

proptest! {
    #[test]
    fn test_empty_patch_is_identity(current in record()) {
        let merged = merge(Some(&current), &Record::new());
        prop_assert!(Record::ptr_eq(&merged, &current));
        prop_assert_eq!(merge_deep(Some(&current), &Record::new()), current);
    }

    #[test]
    fn test_shallow_merge_is_keywise_union(current in record(), patch in record()) {
        let merged = merge(Some(&current), &patch);

        for key in merged.keys() {
            prop_assert!(current.contains_key(key) || patch.contains_key(key));
        }
        for (key, value) in &patch {
            prop_assert_eq!(merged.get(key), Some(value));
        }
        for (key, value) in &current {
            if !patch.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }

    #[test]
    fn test_absent_current_merges_as_empty(patch in record()) {
        prop_assert_eq!(merge(None, &patch), merge(Some(&Record::new()), &patch));
        prop_assert_eq!(merge_deep(None, &patch), merge_deep(Some(&Record::new()), &patch));
    }

    #[test]
    fn test_deep_merge_recurses_into_records(current in record(), patch in record()) {
        let merged = merge_deep(Some(&current), &patch);

        for (key, value) in &patch {
            let expected = match value {
                Value::Record(sub) => {
                    let base = current.get(key).and_then(Value::as_record);
                    Value::Record(merge_deep(base, sub))
                }
                other => other.clone(),
            };
            prop_assert_eq!(merged.get(key), Some(&expected));
        }
        for (key, value) in &current {
            if !patch.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }

    #[test]
    fn test_untouched_records_are_shared(current in record(), patch in record()) {
        let shallow = merge(Some(&current), &patch);
        let deep = merge_deep(Some(&current), &patch);

        for (key, value) in &current {
            if patch.contains_key(key) {
                continue;
            }
            if let Value::Record(original) = value {
                let in_shallow = shallow.get(key).and_then(Value::as_record).unwrap();
                let in_deep = deep.get(key).and_then(Value::as_record).unwrap();
                prop_assert!(Record::ptr_eq(original, in_shallow));
                prop_assert!(Record::ptr_eq(original, in_deep));
            }
        }
    }

    #[test]
    fn test_merge_leaves_inputs_untouched(current in record(), patch in record()) {
        let current_before = current.to_json();
        let patch_before = patch.to_json();

        let _ = merge(Some(&current), &patch);
        let _ = merge_deep(Some(&current), &patch);

        prop_assert_eq!(current.to_json(), current_before);
        prop_assert_eq!(patch.to_json(), patch_before);
    }

    #[test]
    fn test_select_never_repeats_consecutively(values in prop::collection::vec(0i64..4, 1..40)) {
        let cell: StateCell<Record> = StateCell::new();
        let selected = cell
            .select(|st: &Record| st.get("a").and_then(Value::as_i64))
            .watch();

        for a in &values {
            cell.set(Partial::new().set("a", *a)).unwrap();
        }

        let mut expected: Vec<Option<i64>> = values.iter().map(|a| Some(*a)).collect();
        expected.dedup();
        prop_assert_eq!(selected.drain(), expected);
    }

    #[test]
    fn test_compose_emits_once_per_input_emission(writes in prop::collection::vec(any::<bool>(), 0..30)) {
        let left: StateCell<Record> = StateCell::new();
        let right: StateCell<Record> = StateCell::new();
        let view = compose([left.records(), right.records()]).watch();

        for (n, to_left) in writes.iter().enumerate() {
            let target = if *to_left { &left } else { &right };
            target.set(Partial::new().set("n", n as i64)).unwrap();
        }

        let seen = view.drain();
        prop_assert_eq!(seen.len(), writes.len());
        if let Some(last) = seen.last() {
            // The right input wins shared keys
            let expected = right.record().or_else(|| left.record());
            prop_assert_eq!(last.get("n"), expected.as_ref().and_then(|r| r.get("n")));
        }
    }
}

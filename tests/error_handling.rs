//! Error handling tests.

use serde::Deserialize;
use serde_json::json;
use statecell::{
    CellConfig, FileStorage, MemoryStorage, MutateOptions, Partial, Record, State, StateCell,
    StateError, Storage, Update,
};
use std::fmt;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct Profile {
    name: String,
    age: u32,
}

impl State for Profile {}

#[derive(Debug)]
struct Overflow;

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "counter overflow")
    }
}

impl std::error::Error for Overflow {}

fn patch<T>(value: serde_json::Value) -> Partial<T> {
    Partial::from_json(value).unwrap()
}

// --- Update Errors ---

#[test]
fn test_failing_update_leaves_value_unchanged() {
    let cell: StateCell<Record> = StateCell::new();
    cell.set(patch(json!({"counter": 1}))).unwrap();
    let watcher = cell.records().watch();
    watcher.drain();

    let result = cell.mutate(
        Update::try_compute(|_: Option<&Record>| Err::<Partial<Record>, _>(Overflow)),
        MutateOptions::default(),
    );

    match result {
        Err(StateError::Update(source)) => assert_eq!(source.to_string(), "counter overflow"),
        other => panic!("expected update error, got {:?}", other),
    }
    assert_eq!(cell.record().unwrap().to_json(), json!({"counter": 1}));
    assert!(watcher.drain().is_empty());
}

#[test]
fn test_failing_update_is_not_persisted() {
    let storage = Arc::new(MemoryStorage::new());
    let cell: StateCell<Record> = StateCell::with_config(CellConfig {
        persist: true,
        storage: Some(storage.clone()),
        ..CellConfig::named("Guarded")
    });

    let result = cell.mutate(
        Update::try_compute(|_: Option<&Record>| Err::<Partial<Record>, _>("rejected")),
        MutateOptions::default(),
    );

    assert!(result.is_err());
    assert!(cell.read().is_none());
    assert!(storage.is_empty());
}

#[test]
fn test_shape_mismatch_is_rejected() {
    let cell: StateCell<Profile> = StateCell::new();
    cell.set(patch(json!({"name": "ada", "age": 36}))).unwrap();

    let result = cell.set(patch(json!({"age": "unknown"})));
    assert!(matches!(result, Err(StateError::Shape(_))));

    let profile = cell.read().unwrap();
    assert_eq!(profile.name, "ada");
    assert_eq!(profile.age, 36);
}

#[test]
fn test_incomplete_first_write_is_rejected() {
    let cell: StateCell<Profile> = StateCell::new();

    let result = cell.set(patch(json!({"name": "ada"})));
    assert!(matches!(result, Err(StateError::Shape(_))));
    assert!(!cell.is_initialized());
}

#[test]
fn test_non_record_patch_is_rejected() {
    let result = Partial::<Record>::from_json(json!([1, 2, 3]));
    assert!(matches!(result, Err(StateError::NotARecord(_))));

    let result = Record::from_json(json!("text"));
    assert!(matches!(result, Err(StateError::NotARecord(_))));
}

// --- Storage Errors ---

#[test]
fn test_clear_stored_without_storage() {
    let cell: StateCell<Record> = StateCell::named("Unbacked");
    let result = cell.clear_stored(None);
    assert!(matches!(result, Err(StateError::NoStorage(name)) if name == "Unbacked"));
}

#[test]
fn test_corrupt_stored_value_is_ignored_on_load() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set("Corrupt", "{not json").unwrap();

    let cell: StateCell<Record> = StateCell::with_config(CellConfig {
        persist: true,
        storage: Some(storage.clone()),
        ..CellConfig::named("Corrupt")
    });
    assert!(cell.read().is_none());

    // The next mutation overwrites the broken entry
    cell.set(patch(json!({"a": 1}))).unwrap();
    assert_eq!(storage.get("Corrupt").unwrap().as_deref(), Some("{\"a\":1}"));
}

#[test]
fn test_stored_value_of_wrong_shape_is_ignored_on_load() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set("Profile", "{\"name\":7}").unwrap();

    let cell: StateCell<Profile> = StateCell::with_config(CellConfig {
        persist: true,
        storage: Some(storage),
        ..CellConfig::named("Profile")
    });

    assert!(cell.read().is_none());
}

#[test]
fn test_file_storage_rejects_foreign_files() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path(), 4).unwrap();

    let entry = dir.path().join(format!("{}.entry", hex::encode("Foreign")));
    std::fs::write(&entry, b"definitely not an entry").unwrap();

    let result = storage.get("Foreign");
    assert!(matches!(result, Err(StateError::InvalidFormat(_))));
}

// --- Lifetime Errors ---

#[test]
fn test_weak_handle_after_drop() {
    let cell: StateCell<Record> = StateCell::new();
    let weak = cell.downgrade();
    weak.set(patch(json!({"a": 1}))).unwrap();
    assert_eq!(weak.read().unwrap().to_json(), json!({"a": 1}));

    drop(cell);

    assert!(weak.read().is_none());
    assert!(matches!(
        weak.update(|_: Option<&Record>| Partial::new()),
        Err(StateError::CellDropped)
    ));
}

#[test]
fn test_stream_after_drop_is_inert() {
    let cell: StateCell<Record> = StateCell::new();
    cell.set(patch(json!({"a": 1}))).unwrap();
    let stream = cell.records();
    drop(cell);

    let watcher = stream.watch();
    assert!(watcher.try_recv().is_err());
}

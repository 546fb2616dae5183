//! # State Cells
//!
//! Small, per-consumer reactive state containers. A cell holds one immutable
//! value, publishes it as a push stream and as a pull snapshot, and changes
//! it only through shallow or deep merges.
//!
//! ## Core Concepts
//!
//! - **Records**: Immutable `Arc`-shared trees; merges reuse untouched subtrees
//! - **Cells**: One value per consumer, mutated through patches or functions
//! - **Selections**: Derived streams that only fire when the projection changes
//! - **Composition**: Several record streams merged into one view
//! - **Side effects**: Optional storage, inspector and trace output per mutation
//!
//! ## Example
//!
//! ```ignore
//! use statecell::{compose, MutateOptions, Partial, Record, StateCell, Value};
//! use serde_json::json;
//!
//! let local: StateCell<Record> = StateCell::named("Counter");
//! local.set(Partial::from_json(json!({"a": 1, "c": {"d": 1}}))?)?;
//! local.mutate(
//!     Partial::from_json(json!({"c": {"e": [1, 2]}}))?,
//!     MutateOptions::new().deep().action("extend"),
//! )?;
//!
//! // Fires once per distinct square
//! let squares = local.select(|st: &Record| st.get("a").and_then(Value::as_i64).map(|a| a * a));
//!
//! // Shared and local state as one view
//! let unified = compose([global.records(), local.records()]);
//! ```

pub mod cell;
pub mod error;
pub mod inspector;
pub mod state;
pub mod storage;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use cell::{
    CellConfig, ConfigUpdate, MutateOptions, Signal, StateCell, WeakCell, DEFAULT_ACTION,
    LOAD_ACTION, TRACE_TARGET,
};
pub use error::{BoxError, Result, StateError};
pub use inspector::{
    Inspector, InspectorBridge, InspectorConnection, InspectorEntry, MemoryInspector, INIT_ACTION,
};
pub use state::{merge, merge_deep, Equality, Partial, State, Update};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use subscriptions::{
    compose, Observer, Stream, Subscription, SubscriptionId, SubscriptionManager,
    SubscriptionScope, Watcher,
};
pub use types::{Record, Value};

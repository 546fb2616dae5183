//! Immutable update engine.
//!
//! - [`merge`] and [`merge_deep`] compute a new record from a current record
//!   and a patch, sharing every untouched subtree.
//! - [`Partial`] is a typed patch for a state shape, [`Update`] either a patch
//!   or a function of the current value producing one.
//! - [`Equality`] is the comparator used to gate derived notifications.

mod equality;
mod merge;
mod partial;

pub use equality::Equality;
pub use merge::{merge, merge_deep};
pub use partial::{Partial, Update};

use crate::error::Result;
use crate::types::Record;
use serde::de::DeserializeOwned;

/// A state shape that can live in a [`StateCell`](crate::StateCell).
///
/// Cells store a [`Record`] and decode it into the shape after every
/// accepted mutation. The default decode goes through serde; a record that
/// does not fit the shape is rejected and the cell keeps its prior value.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct Counter { counter: i64, counter_max: Option<i64> }
/// impl State for Counter {}
/// ```
pub trait State: DeserializeOwned + Send + Sync + 'static {
    fn from_record(record: &Record) -> Result<Self> {
        record.decode()
    }
}

impl State for Record {
    fn from_record(record: &Record) -> Result<Self> {
        Ok(record.clone())
    }
}

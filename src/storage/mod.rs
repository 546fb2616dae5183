//! Key/value storage used to persist state cells.
//!
//! A cell with persistence enabled writes the JSON encoding of its full
//! record under its name after every mutation, and reads it back when
//! persistence is switched on.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Result;

/// String key/value store.
pub trait Storage: Send + Sync {
    /// Stored value for `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

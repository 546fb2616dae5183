//! Pull-style snapshot of a cell.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct SignalSlot<T> {
    value: RwLock<Option<Arc<T>>>,
    version: AtomicU64,
}

/// Latest value of a cell, read on demand.
///
/// Only kept current while the cell has `use_signal` enabled. Every update
/// bumps the version, so readers can tell whether anything changed since
/// they last looked.
pub struct Signal<T> {
    slot: Arc<SignalSlot<T>>,
}

impl<T> Signal<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(SignalSlot {
                value: RwLock::new(None),
                version: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.value.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.slot.version.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, value: Option<Arc<T>>) {
        *self.slot.value.write() = value;
        self.slot.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.get())
            .field("version", &self.version())
            .finish()
    }
}

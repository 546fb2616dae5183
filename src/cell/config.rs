//! Per-cell configuration.

use crate::inspector::InspectorBridge;
use crate::storage::Storage;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter behind default cell names.
static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

fn default_name() -> String {
    format!("state-{}", NEXT_CELL_ID.fetch_add(1, Ordering::SeqCst))
}

/// State cell configuration.
#[derive(Clone)]
pub struct CellConfig {
    /// Name used as storage key and inspector label prefix.
    /// Default: `state-N` from a process-wide counter.
    pub name: String,

    /// Log every mutation on the `statecell::trace` target.
    pub trace: bool,

    /// Write the full state to `storage` after every mutation.
    pub persist: bool,

    pub storage: Option<Arc<dyn Storage>>,

    /// Report non-quiet mutations to `inspector`.
    pub inspect: bool,

    pub inspector: Option<Arc<InspectorBridge>>,

    /// Keep the cell's [`Signal`](super::Signal) up to date.
    pub use_signal: bool,
}

impl CellConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn apply(&mut self, update: ConfigUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(trace) = update.trace {
            self.trace = trace;
        }
        if let Some(persist) = update.persist {
            self.persist = persist;
        }
        if let Some(storage) = update.storage {
            self.storage = Some(storage);
        }
        if let Some(inspect) = update.inspect {
            self.inspect = inspect;
        }
        if let Some(inspector) = update.inspector {
            self.inspector = Some(inspector);
        }
        if let Some(use_signal) = update.use_signal {
            self.use_signal = use_signal;
        }
    }
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            trace: false,
            persist: false,
            storage: None,
            inspect: false,
            inspector: None,
            use_signal: false,
        }
    }
}

impl fmt::Debug for CellConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellConfig")
            .field("name", &self.name)
            .field("trace", &self.trace)
            .field("persist", &self.persist)
            .field("storage", &self.storage.is_some())
            .field("inspect", &self.inspect)
            .field("inspector", &self.inspector)
            .field("use_signal", &self.use_signal)
            .finish()
    }
}

/// A shallow change to a [`CellConfig`]. Unset fields are left as they are.
#[derive(Clone, Default)]
pub struct ConfigUpdate {
    name: Option<String>,
    trace: Option<bool>,
    persist: Option<bool>,
    storage: Option<Arc<dyn Storage>>,
    inspect: Option<bool>,
    inspector: Option<Arc<InspectorBridge>>,
    use_signal: Option<bool>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = Some(enabled);
        self
    }

    pub fn persist(mut self, enabled: bool) -> Self {
        self.persist = Some(enabled);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn inspect(mut self, enabled: bool) -> Self {
        self.inspect = Some(enabled);
        self
    }

    pub fn inspector(mut self, inspector: Arc<InspectorBridge>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn use_signal(mut self, enabled: bool) -> Self {
        self.use_signal = Some(enabled);
        self
    }
}

//! Mirroring state changes to an external inspection tool.
//!
//! The tool is an opaque sink: cells report `"{state}.{action}"` labels with
//! the new state after every non-quiet mutation. A bridge that failed to
//! connect stays inert and silently drops everything sent to it.

use crate::error::Result;
use crate::types::Record;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Label used for the seed state sent on connect.
pub const INIT_ACTION: &str = "@@INIT";

/// One connected inspection session.
pub trait InspectorConnection: Send + Sync {
    /// Seed the tool with an initial state.
    fn init(&self, seed: &Record) -> Result<()>;

    /// Report a state change under `action`.
    fn send(&self, action: &str, state: &Record) -> Result<()>;
}

/// Entry point of an inspection tool.
pub trait Inspector: Send + Sync {
    fn connect(&self, name: &str) -> Result<Arc<dyn InspectorConnection>>;
}

/// Simplified access to an inspection tool, shared by many cells.
pub struct InspectorBridge {
    connection: Option<Arc<dyn InspectorConnection>>,
}

impl InspectorBridge {
    /// Instance name used when none is given.
    pub const DEFAULT_NAME: &'static str = "statecell";

    /// Connect to `inspector` and seed it with an empty state.
    ///
    /// Failures leave the bridge inactive rather than erroring.
    pub fn connect(inspector: &dyn Inspector, name: &str) -> Self {
        let connection = match inspector.connect(name) {
            Ok(connection) => connection,
            Err(e) => {
                warn!(name, error = %e, "inspector connect failed");
                return Self::disconnected();
            }
        };

        if let Err(e) = connection.init(&Record::new()) {
            warn!(name, error = %e, "inspector init failed");
            return Self::disconnected();
        }

        debug!(name, "inspector connected");
        Self {
            connection: Some(connection),
        }
    }

    /// A bridge that drops everything.
    pub fn disconnected() -> Self {
        Self { connection: None }
    }

    pub fn is_active(&self) -> bool {
        self.connection.is_some()
    }

    /// Send `state` labelled `"{store}.{action}"`. No-op when inactive.
    pub fn send(&self, store: &str, action: &str, state: &Record) -> Result<()> {
        match &self.connection {
            Some(connection) => connection.send(&format!("{}.{}", store, action), state),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for InspectorBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectorBridge")
            .field("active", &self.is_active())
            .finish()
    }
}

/// One entry of a recorded inspection log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InspectorEntry {
    /// Name the connection was opened with.
    pub instance: String,
    pub action: String,
    pub state: serde_json::Value,
}

/// Inspector that records everything it receives, in order.
#[derive(Default)]
pub struct MemoryInspector {
    entries: Arc<Mutex<Vec<InspectorEntry>>>,
}

impl MemoryInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<InspectorEntry> {
        self.entries.lock().clone()
    }

    /// Action labels in arrival order, without the init entries.
    pub fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.action != INIT_ACTION)
            .map(|e| e.action.clone())
            .collect()
    }

    /// The log as JSON lines, for replay in external tooling.
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for entry in self.entries.lock().iter() {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

struct MemoryConnection {
    instance: String,
    entries: Arc<Mutex<Vec<InspectorEntry>>>,
}

impl MemoryConnection {
    fn record(&self, action: &str, state: &Record) {
        self.entries.lock().push(InspectorEntry {
            instance: self.instance.clone(),
            action: action.to_string(),
            state: state.to_json(),
        });
    }
}

impl InspectorConnection for MemoryConnection {
    fn init(&self, seed: &Record) -> Result<()> {
        self.record(INIT_ACTION, seed);
        Ok(())
    }

    fn send(&self, action: &str, state: &Record) -> Result<()> {
        self.record(action, state);
        Ok(())
    }
}

impl Inspector for MemoryInspector {
    fn connect(&self, name: &str) -> Result<Arc<dyn InspectorConnection>> {
        Ok(Arc::new(MemoryConnection {
            instance: name.to_string(),
            entries: Arc::clone(&self.entries),
        }))
    }
}

//! State cells.
//!
//! A [`StateCell`] owns one immutable state value and the channel that
//! announces its changes. Every mutation runs the patch through the merge
//! engine, publishes the result synchronously, then runs the optional side
//! effects (storage, inspector, trace log). Side-effect failures are logged
//! and swallowed; they never undo a published value.

mod config;
mod signal;

pub use config::{CellConfig, ConfigUpdate};
pub use signal::Signal;

use crate::error::{Result, StateError};
use crate::state::{merge, merge_deep, Equality, Partial, State, Update};
use crate::storage::Storage;
use crate::subscriptions::{Stream, Subscription, SubscriptionManager, Watcher};
use crate::types::Record;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Target of the per-mutation trace events.
pub const TRACE_TARGET: &str = "statecell::trace";

/// Action name used when none is given.
pub const DEFAULT_ACTION: &str = "set";

/// Action name reported when a stored value is loaded.
pub const LOAD_ACTION: &str = "load";

/// How a mutation is applied and reported.
#[derive(Clone, Debug)]
pub struct MutateOptions {
    /// Merge nested records recursively instead of replacing them.
    pub deep: bool,

    /// Label for the inspector and the trace log.
    pub action_name: String,

    /// Store the new value without notifying subscribers, the signal or the
    /// inspector. Storage and tracing still run.
    pub quiet: bool,
}

impl MutateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action_name = name.into();
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            deep: false,
            action_name: DEFAULT_ACTION.to_string(),
            quiet: false,
        }
    }
}

/// The stored record together with its decoded form.
struct Slot<T> {
    record: Record,
    value: Arc<T>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

/// An accepted change waiting for delivery and side effects.
struct Publication<T> {
    slot: Slot<T>,
    config: CellConfig,
    action: String,
    quiet: bool,
    write_storage: bool,
}

/// Clears the delivering flag when the outermost delivery loop exits.
struct DeliveryGuard<'a>(&'a AtomicBool);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct CellCore<T> {
    current: RwLock<Option<Slot<T>>>,
    config: RwLock<CellConfig>,
    changes: Arc<SubscriptionManager<Slot<T>>>,
    signal: Signal<T>,
    /// Serializes writers. Reentrant so subscribers may mutate the cell
    /// they are being notified by.
    write_lock: ReentrantMutex<()>,
    /// Changes made from inside a subscriber, delivered after the current one.
    pending: Mutex<VecDeque<Publication<T>>>,
    delivering: AtomicBool,
}

impl<T: State> CellCore<T> {
    fn new(config: CellConfig) -> Self {
        Self {
            current: RwLock::new(None),
            config: RwLock::new(config),
            changes: Arc::new(SubscriptionManager::new()),
            signal: Signal::new(),
            write_lock: ReentrantMutex::new(()),
            pending: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
        }
    }

    fn read(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .as_ref()
            .map(|slot| Arc::clone(&slot.value))
    }

    fn record(&self) -> Option<Record> {
        self.current.read().as_ref().map(|slot| slot.record.clone())
    }

    fn mutate(&self, update: Update<T>, options: &MutateOptions) -> Result<Arc<T>> {
        if self.changes.is_closed() {
            return Err(StateError::CellDropped);
        }

        let _guard = self.write_lock.lock();

        let current = self.current.read().clone();
        let patch = update.resolve(current.as_ref().map(|slot| &*slot.value))?;

        let base = current.as_ref().map(|slot| &slot.record);
        let record = if options.deep {
            merge_deep(base, patch.record())
        } else {
            merge(base, patch.record())
        };

        // A record that does not fit the shape never gets published
        let value = Arc::new(T::from_record(&record)?);
        let slot = Slot {
            record,
            value: Arc::clone(&value),
        };
        *self.current.write() = Some(slot.clone());

        self.dispatch(Publication {
            slot,
            config: self.config.read().clone(),
            action: options.action_name.clone(),
            quiet: options.quiet,
            write_storage: true,
        });

        Ok(value)
    }

    /// Deliver `publication`, or queue it when a delivery is already running
    /// further up the stack.
    ///
    /// Every subscriber sees accepted changes in the order they were made,
    /// and side effects run in that same order, so the last value anyone
    /// observes is the cell's current one.
    fn dispatch(&self, publication: Publication<T>) {
        self.pending.lock().push_back(publication);
        if self.delivering.swap(true, Ordering::SeqCst) {
            return;
        }
        let _guard = DeliveryGuard(&self.delivering);

        loop {
            let next = self.pending.lock().pop_front();
            let publication = match next {
                Some(publication) => publication,
                None => break,
            };
            if !publication.quiet {
                self.publish(&publication.slot, &publication.config);
            }
            self.fan_out(&publication);
        }
    }

    fn publish(&self, slot: &Slot<T>, config: &CellConfig) {
        if config.use_signal {
            self.signal.set(Some(Arc::clone(&slot.value)));
        }
        self.changes.broadcast(slot);
    }

    /// Best-effort side effects of an accepted change.
    fn fan_out(&self, publication: &Publication<T>) {
        let Publication {
            slot,
            config,
            action,
            quiet,
            write_storage,
        } = publication;

        if *write_storage && config.persist {
            if let Err(e) = Self::persist(config, &slot.record) {
                warn!(name = %config.name, error = %e, "failed to persist state");
            }
        }

        if config.inspect && !quiet {
            if let Some(bridge) = &config.inspector {
                if let Err(e) = bridge.send(&config.name, action, &slot.record) {
                    warn!(name = %config.name, error = %e, "failed to send state to inspector");
                }
            }
        }

        if config.trace {
            let label = format!("{}.{}", config.name, action);
            info!(target: TRACE_TARGET, label = %label, state = %slot.record, "state changed");
        }
    }

    fn persist(config: &CellConfig, record: &Record) -> Result<()> {
        let storage = config
            .storage
            .as_ref()
            .ok_or_else(|| StateError::NoStorage(config.name.clone()))?;
        let encoded = serde_json::to_string(record)?;
        storage.set(&config.name, &encoded)
    }

    fn load(config: &CellConfig) -> Result<Option<Record>> {
        let storage = config
            .storage
            .as_ref()
            .ok_or_else(|| StateError::NoStorage(config.name.clone()))?;

        match storage.get(&config.name)? {
            Some(encoded) => {
                let record: Record = serde_json::from_str(&encoded)
                    .map_err(|e| StateError::Deserialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn configure(&self, update: ConfigUpdate) {
        let _guard = self.write_lock.lock();

        let (was_persisting, had_signal, config) = {
            let mut config = self.config.write();
            let before = (config.persist, config.use_signal);
            config.apply(update);
            (before.0, before.1, config.clone())
        };

        if config.use_signal && !had_signal {
            self.signal.set(self.read());
        }

        if config.persist && !was_persisting {
            self.reload(&config);
        }
    }

    /// Replace the in-memory value with the stored one, if any.
    fn reload(&self, config: &CellConfig) {
        let record = match Self::load(config) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!(name = %config.name, error = %e, "failed to load stored state");
                return;
            }
        };

        let value = match T::from_record(&record) {
            Ok(value) => Arc::new(value),
            Err(e) => {
                warn!(name = %config.name, error = %e, "stored state does not fit the cell");
                return;
            }
        };

        let slot = Slot { record, value };
        *self.current.write() = Some(slot.clone());
        debug!(name = %config.name, "stored state loaded");

        self.dispatch(Publication {
            slot,
            config: config.clone(),
            action: LOAD_ACTION.to_string(),
            quiet: false,
            write_storage: false,
        });
    }

    fn clear_stored(&self, storage: Option<&dyn Storage>) -> Result<()> {
        let config = self.config.read().clone();
        match storage {
            Some(storage) => storage.remove(&config.name),
            None => config
                .storage
                .as_ref()
                .ok_or_else(|| StateError::NoStorage(config.name.clone()))?
                .remove(&config.name),
        }
    }

    /// Stream of published slots. New subscribers first get the current slot.
    fn snapshots(core: &Arc<Self>) -> Stream<Slot<T>> {
        let core = Arc::downgrade(core);
        Stream::new(move |observer| {
            let core = match core.upgrade() {
                Some(core) => core,
                None => return Subscription::empty(),
            };

            // Holding the write lock keeps a concurrent mutation from slipping
            // between registration and replay.
            let _guard = core.write_lock.lock();
            let subscription = core.changes.subscribe(Arc::clone(&observer));

            let current = core.current.read().clone();
            if let Some(slot) = current {
                if !subscription.is_closed() {
                    observer(&slot);
                }
            }

            subscription
        })
    }
}

/// Holder of one immutable state value of shape `T`.
///
/// A cell belongs to a single consumer. Dropping it releases every
/// subscription made through it; streams and weak handles obtained earlier
/// go inert.
///
/// ```ignore
/// let cell: StateCell<Record> = StateCell::named("Counter");
/// cell.set(Partial::new().set("counter", 0))?;
/// cell.update(|st| {
///     let n = st.and_then(|st| st.get("counter")).and_then(Value::as_i64).unwrap_or(0);
///     Partial::new().set("counter", n + 1)
/// })?;
/// ```
pub struct StateCell<T: State> {
    core: Arc<CellCore<T>>,
}

impl<T: State> StateCell<T> {
    /// Create an empty cell with a generated name.
    pub fn new() -> Self {
        Self::with_config(CellConfig::default())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(CellConfig::named(name))
    }

    /// Create an empty cell. Persistence enabled here loads the stored value
    /// right away.
    pub fn with_config(config: CellConfig) -> Self {
        debug!(name = %config.name, "state cell created");

        let persist = config.persist;
        let use_signal = config.use_signal;
        let base = CellConfig {
            persist: false,
            use_signal: false,
            ..config
        };

        let cell = Self {
            core: Arc::new(CellCore::new(base)),
        };
        cell.configure(
            ConfigUpdate::new()
                .persist(persist)
                .use_signal(use_signal),
        );
        cell
    }

    pub fn name(&self) -> String {
        self.core.config.read().name.clone()
    }

    pub fn config(&self) -> CellConfig {
        self.core.config.read().clone()
    }

    /// Current value, or `None` before the first write.
    pub fn read(&self) -> Option<Arc<T>> {
        self.core.read()
    }

    /// Current value as a record, or `None` before the first write.
    pub fn record(&self) -> Option<Record> {
        self.core.record()
    }

    pub fn is_initialized(&self) -> bool {
        self.core.current.read().is_some()
    }

    /// Apply `update` and publish the result.
    ///
    /// Returns the new value. If the update function fails, or the merged
    /// record does not decode into `T`, the error is returned and the cell
    /// keeps its previous value.
    ///
    /// Called from inside a subscriber of this cell, the change is applied
    /// at once but delivered after the running notification has reached
    /// every subscriber.
    pub fn mutate(&self, update: impl Into<Update<T>>, options: MutateOptions) -> Result<Arc<T>> {
        self.core.mutate(update.into(), &options)
    }

    /// Shallow merge with the default action name.
    pub fn set(&self, update: impl Into<Update<T>>) -> Result<Arc<T>> {
        self.mutate(update, MutateOptions::default())
    }

    /// Deep merge with the default action name.
    pub fn set_deep(&self, update: impl Into<Update<T>>) -> Result<Arc<T>> {
        self.mutate(update, MutateOptions::new().deep())
    }

    /// Shallow merge of a patch computed from the current value.
    pub fn update<F>(&self, f: F) -> Result<Arc<T>>
    where
        F: FnOnce(Option<&T>) -> Partial<T> + 'static,
    {
        self.mutate(Update::compute(f), MutateOptions::default())
    }

    /// Merge `update` into the configuration.
    ///
    /// Switching persistence on loads the stored value for this cell's name,
    /// if there is one, and publishes it in place of the in-memory value.
    pub fn configure(&self, update: ConfigUpdate) {
        self.core.configure(update);
    }

    /// Remove the stored value from `storage`, or from the configured storage.
    /// The in-memory value is untouched.
    pub fn clear_stored(&self, storage: Option<&dyn Storage>) -> Result<()> {
        self.core.clear_stored(storage)
    }

    /// Every published value, starting with the current one if any.
    pub fn stream(&self) -> Stream<Arc<T>> {
        CellCore::snapshots(&self.core).map(|slot: &Slot<T>| Arc::clone(&slot.value))
    }

    /// Like [`StateCell::stream`], as records. Suitable for [`compose`](crate::compose).
    pub fn records(&self) -> Stream<Record> {
        CellCore::snapshots(&self.core).map(|slot: &Slot<T>| slot.record.clone())
    }

    /// Derived stream of `project(value)`, emitted only when it changes.
    pub fn select<U, F>(&self, project: F) -> Stream<U>
    where
        U: PartialEq + Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.select_with(project, Equality::deep())
    }

    /// Derived stream of `project(value)` gated by a custom comparator.
    pub fn select_with<U, F>(&self, project: F, equality: Equality<U>) -> Stream<U>
    where
        U: Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.stream()
            .select_with(move |value: &Arc<T>| project(&**value), equality)
    }

    /// Derived stream of the sub-record holding `keys`.
    pub fn select_keys<K: AsRef<str>>(&self, keys: &[K]) -> Stream<Record> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        self.records()
            .select(move |record: &Record| record.pick(keys.as_slice()))
    }

    /// Channel-backed view of [`StateCell::stream`].
    pub fn watch(&self) -> Watcher<Arc<T>> {
        self.stream().watch()
    }

    /// Pull-style snapshot, kept current while `use_signal` is enabled.
    pub fn signal(&self) -> Signal<T> {
        self.core.signal.clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.core.changes.subscription_count()
    }

    /// Handle that can read and mutate the cell without keeping it alive.
    pub fn downgrade(&self) -> WeakCell<T> {
        WeakCell {
            core: Arc::downgrade(&self.core),
        }
    }
}

impl<T: State> Default for StateCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: State> Drop for StateCell<T> {
    fn drop(&mut self) {
        self.core.changes.close();
        let name = self.core.config.read().name.clone();
        debug!(name = %name, "state cell dropped");
    }
}

impl<T: State> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("name", &self.name())
            .field("record", &self.record())
            .finish()
    }
}

/// Non-owning handle to a [`StateCell`].
///
/// Meant for subscribers that write back into the cell they observe. Every
/// operation fails with [`StateError::CellDropped`] once the cell is gone.
pub struct WeakCell<T: State> {
    core: Weak<CellCore<T>>,
}

impl<T: State> WeakCell<T> {
    fn core(&self) -> Result<Arc<CellCore<T>>> {
        self.core.upgrade().ok_or(StateError::CellDropped)
    }

    pub fn is_alive(&self) -> bool {
        self.core
            .upgrade()
            .map(|core| !core.changes.is_closed())
            .unwrap_or(false)
    }

    pub fn read(&self) -> Option<Arc<T>> {
        self.core.upgrade().and_then(|core| core.read())
    }

    pub fn mutate(&self, update: impl Into<Update<T>>, options: MutateOptions) -> Result<Arc<T>> {
        self.core()?.mutate(update.into(), &options)
    }

    pub fn set(&self, update: impl Into<Update<T>>) -> Result<Arc<T>> {
        self.mutate(update, MutateOptions::default())
    }

    pub fn update<F>(&self, f: F) -> Result<Arc<T>>
    where
        F: FnOnce(Option<&T>) -> Partial<T> + 'static,
    {
        self.mutate(Update::compute(f), MutateOptions::default())
    }
}

impl<T: State> Clone for WeakCell<T> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

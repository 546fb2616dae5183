//! Subscription manager for broadcasting state changes.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::types::{Subscription, SubscriptionId};

/// Callback invoked with every broadcast value.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Internal subscription state.
struct Entry<T> {
    observer: Observer<T>,
    /// Cleared on unsubscribe so an in-flight broadcast skips it.
    active: Arc<AtomicBool>,
}

/// Manages observers and broadcasts values to them.
///
/// Observers run synchronously on the broadcasting thread, in subscription
/// order. The observer list is snapshotted before delivery: an observer added
/// while a broadcast is running only sees later broadcasts, and one removed
/// while a broadcast is running is skipped if not yet reached.
pub struct SubscriptionManager<T> {
    /// Active subscriptions by ID. IDs increase, so map order is subscription order.
    subscriptions: RwLock<BTreeMap<SubscriptionId, Entry<T>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<T: 'static> SubscriptionManager<T> {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Register an observer. Returns an inert handle once the manager is closed.
    pub fn subscribe(self: &Arc<Self>, observer: Observer<T>) -> Subscription {
        if self.is_closed() {
            return Subscription::empty();
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let active = Arc::new(AtomicBool::new(true));

        self.subscriptions.write().insert(
            id,
            Entry {
                observer,
                active: Arc::clone(&active),
            },
        );

        let manager: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(manager) = manager.upgrade() {
                manager.unsubscribe(id);
            }
        })
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.subscriptions.write().remove(&id);
        if let Some(entry) = removed {
            entry.active.store(false, Ordering::SeqCst);
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver `value` to every active observer.
    pub fn broadcast(&self, value: &T) {
        if self.is_closed() {
            return;
        }

        let targets: Vec<(Arc<AtomicBool>, Observer<T>)> = self
            .subscriptions
            .read()
            .values()
            .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.observer)))
            .collect();

        for (active, observer) in targets {
            if active.load(Ordering::SeqCst) && !self.is_closed() {
                observer(value);
            }
        }
    }

    /// Drop every observer and refuse new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let entries = std::mem::take(&mut *self.subscriptions.write());
        for entry in entries.values() {
            entry.active.store(false, Ordering::SeqCst);
        }
        // Observers are dropped here, outside the lock.
        drop(entries);
    }
}

impl<T: 'static> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

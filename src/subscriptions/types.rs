//! Subscription handles and consumer scopes.

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;

/// Unique identifier for a subscription within one manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to a live subscription.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) releases the
/// subscription. No notification is delivered after that point.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    teardown: Option<Teardown>,
}

impl Subscription {
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription that was never attached to anything.
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Bundle several subscriptions so they are released together.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }

    pub fn is_closed(&self) -> bool {
        self.teardown.is_none()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owns the subscriptions of one consumer.
///
/// When the scope ends (drop or [`SubscriptionScope::close`]) every
/// subscription it holds is released.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until the scope ends.
    pub fn add(&self, subscription: Subscription) {
        self.subscriptions.lock().push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release everything held so far. The scope can be reused afterwards.
    pub fn close(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        // Released outside the lock: teardown may touch this scope again.
        drop(subscriptions);
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pull-style view of a stream, backed by an unbounded channel.
///
/// Each emission of the source stream is queued in order. Once the source
/// goes away (for example the cell is dropped) `recv` reports disconnection.
pub struct Watcher<T> {
    receiver: Receiver<T>,
    _subscription: Subscription,
}

impl<T> Watcher<T> {
    pub(crate) fn new(receiver: Receiver<T>, subscription: Subscription) -> Self {
        Self {
            receiver,
            _subscription: subscription,
        }
    }

    /// Receive the next value (blocking).
    pub fn recv(&self) -> Result<T, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a value (non-blocking).
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything queued so far.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

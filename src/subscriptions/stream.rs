//! Push streams, derived selections and composition.

use crate::state::Equality;
use crate::types::Record;
use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use super::manager::{Observer, SubscriptionManager};
use super::types::{Subscription, Watcher};

type SubscribeFn<T> = dyn Fn(Observer<T>) -> Subscription + Send + Sync;

/// A push stream of values.
///
/// A stream is a recipe for subscribing: every call to [`Stream::subscribe`]
/// attaches a fresh observer chain to the source, with its own operator state
/// (for example the last value a selection emitted).
pub struct Stream<T> {
    source: Arc<SubscribeFn<T>>,
}

impl<T: 'static> Stream<T> {
    /// Build a stream from a subscribe function.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Observer<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(subscribe),
        }
    }

    /// Stream every broadcast of `manager`.
    pub fn from_manager(manager: &Arc<SubscriptionManager<T>>) -> Self {
        let manager = Arc::downgrade(manager);
        Self::new(move |observer| match manager.upgrade() {
            Some(manager) => manager.subscribe(observer),
            None => Subscription::empty(),
        })
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        (self.source)(Arc::new(observer))
    }

    /// Transform every value. No filtering.
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let f = Arc::clone(&f);
            upstream.subscribe(move |value| observer(&f(value)))
        })
    }

    /// Project every value and drop consecutive duplicates under deep equality.
    pub fn select<U, F>(&self, project: F) -> Stream<U>
    where
        U: PartialEq + Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.select_with(project, Equality::deep())
    }

    /// Project every value and drop it when `equality` says it matches the
    /// previously emitted one. The first value after subscribing always passes.
    pub fn select_with<U, F>(&self, project: F, equality: Equality<U>) -> Stream<U>
    where
        U: Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let project = Arc::new(project);
        Stream::new(move |observer: Observer<U>| {
            let project = Arc::clone(&project);
            let equality = equality.clone();
            let last: Mutex<Option<U>> = Mutex::new(None);
            upstream.subscribe(move |value| {
                let next = project(value);
                {
                    let mut last = last.lock();
                    if let Some(previous) = last.as_ref() {
                        if equality.equals(previous, &next) {
                            return;
                        }
                    }
                    *last = Some(next.clone());
                }
                observer(&next);
            })
        })
    }

    /// Drop consecutive duplicates.
    pub fn distinct(&self) -> Stream<T>
    where
        T: PartialEq + Clone + Send,
    {
        self.select(T::clone)
    }

    /// Queue every value into a channel for pull-style consumption.
    pub fn watch(&self) -> Watcher<T>
    where
        T: Clone + Send,
    {
        let (sender, receiver) = unbounded();
        let subscription = self.subscribe(move |value: &T| {
            // Receiver gone means the watcher is being dropped.
            let _ = sender.send(value.clone());
        });
        Watcher::new(receiver, subscription)
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Stream(..)")
    }
}

/// Combine record streams into one stream of merged snapshots.
///
/// Every emission of any input produces one output: the shallow merge, in
/// input order, of the latest record seen from each input. Inputs that have
/// not emitted yet contribute nothing. There is no equality gating here.
pub fn compose<I>(streams: I) -> Stream<Record>
where
    I: IntoIterator<Item = Stream<Record>>,
{
    let streams: Vec<Stream<Record>> = streams.into_iter().collect();
    Stream::new(move |observer: Observer<Record>| {
        let latest: Arc<Mutex<Vec<Option<Record>>>> =
            Arc::new(Mutex::new(vec![None; streams.len()]));

        let subscriptions = streams
            .iter()
            .enumerate()
            .map(|(index, stream)| {
                let latest = Arc::clone(&latest);
                let observer = Arc::clone(&observer);
                stream.subscribe(move |record: &Record| {
                    let merged = {
                        let mut latest = latest.lock();
                        latest[index] = Some(record.clone());
                        latest
                            .iter()
                            .flatten()
                            .fold(Record::new(), |acc, record| acc.merge(record))
                    };
                    observer(&merged);
                })
            })
            .collect();

        Subscription::all(subscriptions)
    })
}

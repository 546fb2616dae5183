//! Equality policies used to suppress redundant notifications.

use std::fmt;
use std::sync::Arc;

/// Decides whether two consecutive values are the same for notification
/// purposes. When `equals(previous, next)` holds, `next` is not emitted.
pub struct Equality<U> {
    eq: Arc<dyn Fn(&U, &U) -> bool + Send + Sync>,
}

impl<U: 'static> Equality<U> {
    /// Use an arbitrary comparator.
    pub fn by<F>(f: F) -> Self
    where
        F: Fn(&U, &U) -> bool + Send + Sync + 'static,
    {
        Self { eq: Arc::new(f) }
    }

    /// Compare only a projection of the value, e.g. a couple of fields.
    pub fn by_key<K, F>(key: F) -> Self
    where
        K: PartialEq,
        F: Fn(&U) -> K + Send + Sync + 'static,
    {
        Self::by(move |a, b| key(a) == key(b))
    }

    /// Never treat two values as equal: every value is emitted.
    pub fn never() -> Self {
        Self::by(|_, _| false)
    }

    pub fn equals(&self, previous: &U, next: &U) -> bool {
        (self.eq)(previous, next)
    }
}

impl<U: PartialEq + 'static> Equality<U> {
    /// Deep structural equality through `PartialEq`.
    pub fn deep() -> Self {
        Self::by(|a: &U, b: &U| a == b)
    }
}

impl<U: PartialEq + 'static> Default for Equality<U> {
    fn default() -> Self {
        Self::deep()
    }
}

impl<U> Clone for Equality<U> {
    fn clone(&self) -> Self {
        Self {
            eq: Arc::clone(&self.eq),
        }
    }
}

impl<U> fmt::Debug for Equality<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Equality(..)")
    }
}

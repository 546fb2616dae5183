//! Typed patches and update requests.

use crate::error::{BoxError, Result, StateError};
use crate::types::{Record, Value};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// A partial update for a state of shape `T`.
///
/// Wraps a patch record. For a shallow merge only the top-level keys matter;
/// for a deep merge nested records may themselves be partial.
pub struct Partial<T> {
    patch: Record,
    _shape: PhantomData<fn() -> T>,
}

impl<T> Partial<T> {
    /// An empty patch. Merging it changes nothing.
    pub fn new() -> Self {
        Self::from_record(Record::new())
    }

    pub fn from_record(patch: Record) -> Self {
        Self {
            patch,
            _shape: PhantomData,
        }
    }

    /// Build a patch from a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Record::from_json(value).map(Self::from_record)
    }

    /// Build a patch from any serializable value that encodes as a map.
    ///
    /// Fields skipped during serialization are left untouched by the merge;
    /// fields serialized as `null` clear their key.
    pub fn from_serialize<S: Serialize + ?Sized>(value: &S) -> Result<Self> {
        Record::from_serialize(value).map(Self::from_record)
    }

    /// Set `key` in the patch.
    pub fn set(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::from_record(self.patch.with(key, value))
    }

    /// Clear `key`: after the merge it holds `Null`.
    pub fn clear(self, key: impl Into<String>) -> Self {
        self.set(key, Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
    }

    pub fn record(&self) -> &Record {
        &self.patch
    }

    pub fn into_record(self) -> Record {
        self.patch
    }
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Partial<T> {
    fn clone(&self) -> Self {
        Self::from_record(self.patch.clone())
    }
}

impl<T> fmt::Debug for Partial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Partial").field(&self.patch).finish()
    }
}

impl<T> From<Record> for Partial<T> {
    fn from(patch: Record) -> Self {
        Self::from_record(patch)
    }
}

impl<T> From<Partial<T>> for Value {
    fn from(partial: Partial<T>) -> Self {
        Value::Record(partial.patch)
    }
}

type ComputeFn<T> = Box<dyn FnOnce(Option<&T>) -> std::result::Result<Partial<T>, BoxError>>;

/// What a mutation applies: a literal patch, or a function of the current
/// value that produces one.
pub enum Update<T> {
    Patch(Partial<T>),
    Compute(ComputeFn<T>),
}

impl<T> Update<T> {
    /// Compute the patch from the value before the mutation.
    pub fn compute<F>(f: F) -> Self
    where
        F: FnOnce(Option<&T>) -> Partial<T> + 'static,
    {
        Update::Compute(Box::new(move |current| Ok(f(current))))
    }

    /// Like [`Update::compute`], but the function may fail. A failure aborts
    /// the mutation and is returned to the caller.
    pub fn try_compute<F, E>(f: F) -> Self
    where
        F: FnOnce(Option<&T>) -> std::result::Result<Partial<T>, E> + 'static,
        E: Into<BoxError>,
    {
        Update::Compute(Box::new(move |current| f(current).map_err(Into::into)))
    }

    pub(crate) fn resolve(self, current: Option<&T>) -> Result<Partial<T>> {
        match self {
            Update::Patch(patch) => Ok(patch),
            Update::Compute(f) => f(current).map_err(StateError::Update),
        }
    }
}

impl<T> From<Partial<T>> for Update<T> {
    fn from(patch: Partial<T>) -> Self {
        Update::Patch(patch)
    }
}

impl<T> From<Record> for Update<T> {
    fn from(patch: Record) -> Self {
        Update::Patch(Partial::from_record(patch))
    }
}

impl<T> fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Patch(patch) => f.debug_tuple("Patch").field(patch).finish(),
            Update::Compute(_) => write!(f, "Compute(..)"),
        }
    }
}

//! Change propagation for state cells.
//!
//! This module provides synchronous, in-process notification:
//! - [`SubscriptionManager`] broadcasts values to observers in subscription order
//! - [`Stream`] wraps a source with operators (`map`, `select`, `distinct`)
//! - [`compose`] merges several record streams into one view
//! - [`Watcher`] turns a stream into a channel for pull-style consumption
//!
//! Subscriptions are released when their handle drops; a
//! [`SubscriptionScope`] ties many of them to one consumer lifetime.
//!
//! # Example
//!
//! ```ignore
//! let scope = SubscriptionScope::new();
//!
//! // Only fires when the square actually changes
//! scope.add(cell.select(|st: &Counter| st.a * st.a).subscribe(|square| {
//!     println!("square: {}", square);
//! }));
//!
//! // Shared and local state as one view
//! let unified = compose([global.records(), local.records()]);
//! ```

mod manager;
mod stream;
mod types;

pub use manager::{Observer, SubscriptionManager};
pub use stream::{compose, Stream};
pub use types::{Subscription, SubscriptionId, SubscriptionScope, Watcher};

#![forbid(unsafe_code)]

//! Reactive state primitives for the storefront.
//!
//! This crate provides change-tracking primitives for reactive UI updates:
//!
//! - [`Cell`]: A shared, version-tracked value with change notification via
//!   subscriber callbacks.
//! - [`Derived`]: A memoized value computed from an explicit list of `Cell`
//!   or `Derived` sources.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Runtime`]: Owns the propagation pass and batching for a set of nodes.
//!
//! # Architecture
//!
//! All storage is `Rc`-based and single-threaded. Every node carries a rank
//! (cells are rank 0, a derived value is one above its highest source), so the
//! graph is acyclic by construction and the runtime can settle dependents in
//! topological order.
//!
//! A write to a `Cell` runs one synchronous propagation pass:
//!
//! 1. Every transitive dependent is marked dirty, so a read from anywhere
//!    (including from inside a subscriber) recomputes instead of returning a
//!    stale value.
//! 2. Dependents are visited in rank order. Those with subscribers are
//!    recomputed eagerly; the rest stay dirty until the next read.
//! 3. Subscribers of the written cell, then of every derived value whose
//!    output changed, are notified. Each node notifies at most once per pass.
//!
//! # Invariants
//!
//! 1. `get()` after `set(v)` returns `v`.
//! 2. Setting a value equal (`PartialEq`) to the current value is a no-op:
//!    no version bump, no notifications.
//! 3. `subscribe()` invokes the callback once immediately with the current
//!    value, then once per observed change.
//! 4. A derived value recomputes at most once per pass, regardless of how many
//!    paths connect it to the written cell.
//! 5. `Derived::get()` never returns a stale value.

pub mod cell;
pub mod derived;
pub mod error;
#[doc(hidden)]
pub mod graph;
pub mod runtime;
pub mod subscription;

pub use cell::{Cell, ReadOnly};
pub use derived::{Derived, Source};
pub use error::{ReactiveError, Result};
pub use graph::NodeId;
pub use runtime::{Runtime, RuntimeConfig, RuntimeId};
pub use subscription::Subscription;

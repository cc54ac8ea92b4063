#![forbid(unsafe_code)]

//! Memoized values computed from declared [`Source`]s.
//!
//! # Design
//!
//! [`Derived<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. Sources are listed up front, so the dependency
//! graph is fixed at construction and cannot contain a cycle: a derived value
//! can only be built from nodes that already exist.
//!
//! When a source changes, the runtime marks the cached value dirty. Derived
//! values with subscribers are recomputed during the propagation pass; the
//! rest recompute on the next [`get()`](Derived::get).
//!
//! # Invariants
//!
//! 1. `get()` always returns a value consistent with the current state of all
//!    sources (no stale reads after a source mutation completes).
//! 2. The compute function runs at most once per propagation pass.
//! 3. If no source has changed, `get()` returns the cached value in O(1).
//! 4. `version` increments by 1 on each recomputation that produces a value
//!    different from the cached one.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: The cached value remains from the last
//!   successful computation. The dirty flag stays set so the next `get()` will
//!   retry.
//! - **Handle dropped**: Sources only hold weak references to dependents, so
//!   a dropped `Derived` simply stops being scheduled.

use std::cell::{Cell as Flag, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{ReactiveError, Result};
use crate::graph::{Node, NodeId, Observers};
use crate::runtime::Runtime;
use crate::subscription::{Subscribers, Subscription};

/// Anything a [`Derived`] can be computed from.
pub trait Source: Clone + 'static {
    type Value: 'static;

    /// Borrow the current (fresh) value.
    fn with_value<R>(&self, f: impl FnOnce(&Self::Value) -> R) -> R;

    #[doc(hidden)]
    fn node(&self) -> Rc<dyn Node>;

    #[doc(hidden)]
    fn source_runtime(&self) -> &Runtime;
}

/// Shared interior for [`Derived<T>`].
struct DerivedInner<T> {
    id: NodeId,
    rank: u32,
    runtime: Runtime,
    compute: Box<dyn Fn() -> T>,
    /// Cached result (None only before first computation).
    cached: RefCell<Option<T>>,
    dirty: Flag<bool>,
    version: Flag<u64>,
    /// Value subscribers last received.
    delivered: RefCell<Option<T>>,
    observers: Observers,
    subscribers: Subscribers<T>,
}

impl<T: PartialEq> DerivedInner<T> {
    fn refresh(&self) {
        if !self.dirty.get() && self.cached.borrow().is_some() {
            return;
        }
        // Computed without holding a borrow: the function reads other nodes.
        let next = (self.compute)();
        {
            let mut cached = self.cached.borrow_mut();
            if cached.as_ref() != Some(&next) {
                *cached = Some(next);
                self.version.set(self.version.get() + 1);
            }
        }
        self.dirty.set(false);
    }
}

impl<T: Clone + PartialEq + 'static> Node for DerivedInner<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn attach(&self, observer: Weak<dyn Node>) {
        self.observers.push(observer);
    }

    fn observers(&self) -> Vec<Rc<dyn Node>> {
        self.observers.live()
    }

    fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    fn settle(&self) -> bool {
        if self.subscribers.is_empty() {
            // Nobody is listening: stay dirty, recompute on the next read.
            return false;
        }
        self.refresh();
        *self.delivered.borrow() != *self.cached.borrow()
    }

    fn notify(&self) {
        // A subscriber notified earlier in the pass may have written a source.
        self.refresh();
        let Some(value) = self.cached.borrow().clone() else {
            return;
        };
        if self.delivered.borrow().as_ref() == Some(&value) {
            return;
        }
        *self.delivered.borrow_mut() = Some(value.clone());
        self.subscribers.deliver(&value);
    }
}

/// A lazily-evaluated, memoized value derived from one or more [`Source`]s.
///
/// Cloning a `Derived` creates a new handle to the **same** inner state.
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.inner.id)
            .field("rank", &self.inner.rank)
            .field("cached", &*self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    /// Create a derived value from a single source.
    ///
    /// The `map` function receives a reference to the source value and
    /// returns the derived value.
    pub fn from_source<S: Source>(source: &S, map: impl Fn(&S::Value) -> T + 'static) -> Self {
        let src = source.clone();
        Self::build(
            source.source_runtime().clone(),
            &[source.node()],
            Box::new(move || src.with_value(|v| map(v))),
        )
    }

    /// Create a derived value from two sources sharing a runtime.
    pub fn from2<A, B>(
        a: &A,
        b: &B,
        map: impl Fn(&A::Value, &B::Value) -> T + 'static,
    ) -> Result<Self>
    where
        A: Source,
        B: Source,
    {
        let runtime = shared_runtime(&[a.source_runtime(), b.source_runtime()])?;
        let (a2, b2) = (a.clone(), b.clone());
        Ok(Self::build(
            runtime,
            &[a.node(), b.node()],
            Box::new(move || a2.with_value(|va| b2.with_value(|vb| map(va, vb)))),
        ))
    }

    /// Create a derived value from three sources sharing a runtime.
    pub fn from3<A, B, C>(
        a: &A,
        b: &B,
        c: &C,
        map: impl Fn(&A::Value, &B::Value, &C::Value) -> T + 'static,
    ) -> Result<Self>
    where
        A: Source,
        B: Source,
        C: Source,
    {
        let runtime = shared_runtime(&[
            a.source_runtime(),
            b.source_runtime(),
            c.source_runtime(),
        ])?;
        let (a2, b2, c2) = (a.clone(), b.clone(), c.clone());
        Ok(Self::build(
            runtime,
            &[a.node(), b.node(), c.node()],
            Box::new(move || {
                a2.with_value(|va| b2.with_value(|vb| c2.with_value(|vc| map(va, vb, vc))))
            }),
        ))
    }

    fn build(runtime: Runtime, sources: &[Rc<dyn Node>], compute: Box<dyn Fn() -> T>) -> Self {
        let rank = sources.iter().map(|s| s.rank()).max().unwrap_or(0) + 1;
        let inner = Rc::new(DerivedInner {
            id: NodeId::next(),
            rank,
            runtime,
            compute,
            cached: RefCell::new(None),
            dirty: Flag::new(true), // Computed on first get().
            version: Flag::new(0),
            delivered: RefCell::new(None),
            observers: Observers::new(),
            subscribers: Subscribers::new(),
        });

        let weak: Weak<DerivedInner<T>> = Rc::downgrade(&inner);
        let weak: Weak<dyn Node> = weak;
        for source in sources {
            source.attach(weak.clone());
        }

        Self { inner }
    }

    /// Get the current value, recomputing if any source has changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure writes to a source of this value while it has
    /// subscribers (re-entrant borrow of the cache).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.refresh();
        let cached = self.inner.cached.borrow();
        f(cached.as_ref().expect("cached is always Some after refresh"))
    }

    /// Invoke `callback` now with the current value, then whenever the
    /// computed output changes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let first = self.inner.subscribers.is_empty();
        let (subscription, callback) = self.inner.subscribers.add(callback);
        let value = self.get();
        if first {
            // Earlier changes were never announced to anyone; start from here.
            *self.inner.delivered.borrow_mut() = Some(value.clone());
        }
        callback(&value);
        subscription
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Force invalidation of the cached value and everything computed from
    /// it. The next `get()` will recompute.
    pub fn invalidate(&self) {
        self.inner.mark_dirty();
        crate::graph::mark_downstream_dirty(self.inner.as_ref());
    }

    /// Current version number. Increments by 1 on each recomputation that
    /// changes the output.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Distance from the furthest cell this value depends on.
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.inner.rank
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }
}

impl<T: Clone + PartialEq + 'static> Source for Derived<T> {
    type Value = T;

    fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.with(f)
    }

    fn node(&self) -> Rc<dyn Node> {
        self.inner.clone()
    }

    fn source_runtime(&self) -> &Runtime {
        &self.inner.runtime
    }
}

fn shared_runtime(runtimes: &[&Runtime]) -> Result<Runtime> {
    let first = runtimes[0];
    for other in &runtimes[1..] {
        if other.id() != first.id() {
            return Err(ReactiveError::ForeignSource {
                expected: first.id(),
                found: other.id(),
            });
        }
    }
    Ok(first.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

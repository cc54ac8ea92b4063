#![forbid(unsafe_code)]

//! Writable observable values.
//!
//! # Equality policy
//!
//! A write is a change when the new value is not `PartialEq`-equal to the
//! current one. Types that want identity semantics (for example a large
//! payload replaced wholesale) express it in their `PartialEq` impl, typically
//! by wrapping an `Rc` and comparing with `Rc::ptr_eq`.
//!
//! Notifications use the same comparison against the value subscribers last
//! received, so writes that cancel out inside a batch stay silent.

use std::cell::{Cell as Flag, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::derived::Source;
use crate::graph::{Node, NodeId, Observers};
use crate::runtime::Runtime;
use crate::subscription::{Subscribers, Subscription};

/// Shared interior for [`Cell<T>`].
struct CellInner<T> {
    id: NodeId,
    runtime: Runtime,
    value: RefCell<T>,
    /// Bumped once per write that changes the value.
    version: Flag<u64>,
    /// Value subscribers last received.
    delivered: RefCell<Option<T>>,
    observers: Observers,
    subscribers: Subscribers<T>,
}

impl<T: Clone + PartialEq + 'static> Node for CellInner<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn rank(&self) -> u32 {
        0
    }

    fn attach(&self, observer: Weak<dyn Node>) {
        self.observers.push(observer);
    }

    fn observers(&self) -> Vec<Rc<dyn Node>> {
        self.observers.live()
    }

    fn mark_dirty(&self) {}

    fn settle(&self) -> bool {
        !self.subscribers.is_empty()
            && self.delivered.borrow().as_ref() != Some(&*self.value.borrow())
    }

    fn notify(&self) {
        // Clone out so a subscriber may write back into this cell.
        let value = self.value.borrow().clone();
        if self.delivered.borrow().as_ref() == Some(&value) {
            return;
        }
        *self.delivered.borrow_mut() = Some(value.clone());
        self.subscribers.deliver(&value);
    }
}

/// A shared, mutable, observable value.
///
/// Cloning a `Cell` creates a new handle to the **same** value.
///
/// # Invariants
///
/// 1. `get()` returns the most recently written value, even from inside a
///    subscriber or a batch.
/// 2. `version` increments by exactly 1 per write that changes the value.
/// 3. Writing an equal value is a no-op.
pub struct Cell<T> {
    inner: Rc<CellInner<T>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("observers", &self.inner.observers.len())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Cell<T> {
    /// Create a cell owned by `runtime` holding `value`.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id: NodeId::next(),
                runtime: runtime.clone(),
                value: RefCell::new(value),
                version: Flag::new(0),
                delivered: RefCell::new(None),
                observers: Observers::new(),
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure writes to this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value, propagating if it changed.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.runtime.schedule(self.inner.clone());
    }

    /// Write `f(current)`, propagating if it changed.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.with(f);
        self.set(next);
    }

    /// Invoke `callback` now with the current value, then on every change.
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

    /// Read-only view sharing this cell's state.
    #[must_use]
    pub fn read_only(&self) -> ReadOnly<T> {
        ReadOnly { cell: self.clone() }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Number of changing writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }
}

impl<T: Clone + PartialEq + 'static> Source for Cell<T> {
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

/// A [`Cell`] handle without write access.
///
/// Hand this out to consumers that may observe a value but must go through a
/// dedicated API to change it.
pub struct ReadOnly<T> {
    cell: Cell<T>,
}

impl<T> Clone for ReadOnly<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ReadOnly<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnly").field(&self.cell).finish()
    }
}

impl<T: Clone + PartialEq + 'static> ReadOnly<T> {
    #[must_use]
    pub fn get(&self) -> T {
        self.cell.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(f)
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.cell.subscribe(callback)
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.cell.id()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.cell.version()
    }
}

impl<T: Clone + PartialEq + 'static> Source for ReadOnly<T> {
    type Value = T;

    fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(f)
    }

    fn node(&self) -> Rc<dyn Node> {
        self.cell.node()
    }

    fn source_runtime(&self) -> &Runtime {
        self.cell.source_runtime()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#![forbid(unsafe_code)]

//! Subscriber storage and the [`Subscription`] guard.
//!
//! Nodes hold their callbacks weakly; the only strong reference lives in the
//! `Subscription` returned to the caller. Dropping the guard therefore
//! unsubscribes, and dead slots are pruned lazily on the next notification.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) type Callback<T> = dyn Fn(&T);

/// RAII handle for a registered callback.
///
/// The callback stays registered for as long as this value is alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    guard: Option<Box<dyn Any>>,
}

impl Subscription {
    fn new<T: 'static>(callback: Rc<Callback<T>>) -> Self {
        Self {
            guard: Some(Box::new(callback)),
        }
    }

    /// Remove the callback now. Equivalent to dropping the guard.
    pub fn unsubscribe(mut self) {
        self.guard.take();
    }

    /// Whether the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Registration-ordered list of weakly-held callbacks.
pub(crate) struct Subscribers<T> {
    slots: RefCell<Vec<Weak<Callback<T>>>>,
}

impl<T: 'static> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }

    /// Register `callback`, returning the guard and a strong handle the caller
    /// can use for the initial delivery.
    pub(crate) fn add(&self, callback: impl Fn(&T) + 'static) -> (Subscription, Rc<Callback<T>>) {
        let strong: Rc<Callback<T>> = Rc::new(callback);
        self.slots.borrow_mut().push(Rc::downgrade(&strong));
        (Subscription::new(Rc::clone(&strong)), strong)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.borrow().iter().all(|w| w.strong_count() == 0)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Live callbacks in registration order. The borrow is released before
    /// returning so callbacks may subscribe or unsubscribe freely.
    pub(crate) fn snapshot(&self) -> Vec<Rc<Callback<T>>> {
        let mut slots = self.slots.borrow_mut();
        slots.retain(|w| w.strong_count() > 0);
        slots.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn deliver(&self, value: &T) {
        for callback in self.snapshot() {
            callback(value);
        }
    }
}

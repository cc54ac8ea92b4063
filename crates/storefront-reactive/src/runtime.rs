#![forbid(unsafe_code)]

//! Propagation passes and write batching.
//!
//! # Design
//!
//! A [`Runtime`] owns no nodes. It only holds the queue of cells written since
//! the last pass and the state needed to decide when that queue is flushed:
//!
//! - Outside a batch and outside a flush, a write flushes immediately.
//! - Inside [`Runtime::batch`], writes queue up and flush once the outermost
//!   batch returns.
//! - A write issued by a subscriber while a flush is delivering notifications
//!   is queued and handled by a follow-up round of the same flush.
//!
//! # Failure Modes
//!
//! - **Subscriber panics**: the flush guard resets the runtime so later writes
//!   still propagate. Writes still queued when the panic unwinds are dropped.
//! - **Runaway re-entrant writes**: subscribers that keep writing each other's
//!   cells are cut off after [`RuntimeConfig::max_flush_rounds`] rounds with a
//!   warning. Values stay correct; only the remaining notifications are lost.

use std::cell::{Cell as Flag, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tracing::{trace, warn};

use crate::cell::Cell;
use crate::graph::{Node, NodeId, mark_downstream_dirty};

// ─── Runtime ID generation ───────────────────────────────────────────────────

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u64);

impl RuntimeId {
    fn next() -> Self {
        Self(NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime#{}", self.0)
    }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Default bound on follow-up rounds within a single flush.
pub const DEFAULT_MAX_FLUSH_ROUNDS: usize = 64;

/// Tuning knobs for a [`Runtime`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of propagation rounds one flush may run. Every round
    /// past the first is caused by a subscriber writing to a cell.
    pub max_flush_rounds: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_rounds: DEFAULT_MAX_FLUSH_ROUNDS,
        }
    }
}

impl RuntimeConfig {
    /// Set the follow-up round bound. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_max_flush_rounds(mut self, rounds: usize) -> Self {
        self.max_flush_rounds = rounds.max(1);
        self
    }
}

// ─── Runtime ─────────────────────────────────────────────────────────────────

pub(crate) struct RuntimeInner {
    id: RuntimeId,
    config: RuntimeConfig,
    batch_depth: Flag<u32>,
    flushing: Flag<bool>,
    pending: RefCell<Vec<Rc<dyn Node>>>,
}

/// Coordinates propagation for every node created against it.
///
/// Cloning a `Runtime` creates a new handle to the **same** state.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("batch_depth", &self.inner.batch_depth.get())
            .field("flushing", &self.inner.flushing.get())
            .field("pending", &self.inner.pending.borrow().len())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                id: RuntimeId::next(),
                config,
                batch_depth: Flag::new(0),
                flushing: Flag::new(false),
                pending: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create a cell owned by this runtime.
    pub fn cell<T: Clone + PartialEq + 'static>(&self, value: T) -> Cell<T> {
        Cell::new(self, value)
    }

    /// Whether a [`batch`](Self::batch) is currently open.
    #[must_use]
    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0
    }

    /// Run `f` with propagation deferred until it returns.
    ///
    /// Values written inside the batch are visible immediately, and derived
    /// values read inside it recompute on demand. Subscribers hear about the
    /// net result once, when the outermost batch closes, and not at all if
    /// the batch leaves their value where it started.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let depth = BatchDepth::enter(&self.inner);
        let out = f();
        drop(depth);
        if !self.is_batching() && !self.inner.flushing.get() {
            self.flush();
        }
        out
    }

    /// Queue a written cell for propagation.
    pub(crate) fn schedule(&self, origin: Rc<dyn Node>) {
        mark_downstream_dirty(origin.as_ref());
        self.inner.pending.borrow_mut().push(origin);
        if !self.is_batching() && !self.inner.flushing.get() {
            self.flush();
        }
    }

    fn flush(&self) {
        let _guard = FlushGuard::enter(&self.inner);
        let max_rounds = self.inner.config.max_flush_rounds;
        let mut round = 0usize;
        loop {
            let origins = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if origins.is_empty() {
                break;
            }
            if round == max_rounds {
                warn!(
                    runtime = %self.inner.id,
                    rounds = round,
                    dropped = origins.len(),
                    "flush round limit reached; dropping remaining notifications"
                );
                break;
            }
            round += 1;
            run_pass(self.inner.id, round, origins);
        }
    }
}

/// One propagation pass: settle dependents in rank order, then notify.
fn run_pass(runtime: RuntimeId, round: usize, mut origins: Vec<Rc<dyn Node>>) {
    let mut seen = HashSet::new();
    origins.retain(|node| seen.insert(node.id()));

    let mut ordered: BTreeMap<(u32, NodeId), Rc<dyn Node>> = BTreeMap::new();
    let mut stack: Vec<Rc<dyn Node>> = origins.iter().flat_map(|o| o.observers()).collect();
    while let Some(node) = stack.pop() {
        let key = (node.rank(), node.id());
        if ordered.contains_key(&key) {
            continue;
        }
        stack.extend(node.observers());
        ordered.insert(key, node);
    }

    trace!(
        runtime = %runtime,
        round,
        origins = origins.len(),
        dependents = ordered.len(),
        "propagation pass"
    );

    let mut changed: Vec<Rc<dyn Node>> = Vec::with_capacity(origins.len() + ordered.len());
    changed.extend(origins.into_iter().filter(|node| node.settle()));
    for ((rank, id), node) in ordered {
        if node.settle() {
            trace!(node = %id, rank, "derived value changed");
            changed.push(node);
        }
    }

    for node in &changed {
        node.notify();
    }
}

struct BatchDepth<'a>(&'a RuntimeInner);

impl<'a> BatchDepth<'a> {
    fn enter(inner: &'a RuntimeInner) -> Self {
        inner.batch_depth.set(inner.batch_depth.get() + 1);
        Self(inner)
    }
}

impl Drop for BatchDepth<'_> {
    fn drop(&mut self) {
        self.0.batch_depth.set(self.0.batch_depth.get() - 1);
    }
}

struct FlushGuard<'a>(&'a RuntimeInner);

impl<'a> FlushGuard<'a> {
    fn enter(inner: &'a RuntimeInner) -> Self {
        inner.flushing.set(true);
        Self(inner)
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.pending.borrow_mut().clear();
        }
        self.0.flushing.set(false);
    }
}

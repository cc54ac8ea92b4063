//! Type-erased node bookkeeping shared by cells and derived values.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

// ─── Node ID generation ──────────────────────────────────────────────────────

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a cell or derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

// ─── Node ────────────────────────────────────────────────────────────────────

/// What the runtime needs to walk and settle the graph without knowing the
/// value types involved.
pub trait Node {
    fn id(&self) -> NodeId;

    /// 0 for cells, `1 + max(source ranks)` for derived values.
    fn rank(&self) -> u32;

    /// Register a downstream derived value.
    fn attach(&self, observer: Weak<dyn Node>);

    /// Live downstream derived values.
    fn observers(&self) -> Vec<Rc<dyn Node>>;

    /// Mark the cached value stale. Cells ignore this.
    fn mark_dirty(&self);

    /// Bring the node up to date if anyone is listening. Returns `true` when
    /// its subscribers have a change they have not been told about yet.
    fn settle(&self) -> bool;

    /// Deliver the current value to every live subscriber.
    fn notify(&self);
}

/// Weak back-references from a source to the derived values built on it.
pub(crate) struct Observers {
    slots: RefCell<Vec<Weak<dyn Node>>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, observer: Weak<dyn Node>) {
        self.slots.borrow_mut().push(observer);
    }

    /// Upgrade live observers, dropping dead slots along the way.
    pub(crate) fn live(&self) -> Vec<Rc<dyn Node>> {
        let mut slots = self.slots.borrow_mut();
        slots.retain(|w| w.strong_count() > 0);
        slots.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

/// Mark every transitive dependent of `origin` dirty.
///
/// The walk does not stop at nodes that are already dirty: an explicit
/// `invalidate()` can leave a dirty node above clean ones.
pub(crate) fn mark_downstream_dirty(origin: &dyn Node) {
    let mut visited = HashSet::new();
    let mut stack = origin.observers();
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) {
            continue;
        }
        node.mark_dirty();
        stack.extend(node.observers());
    }
}

//! Filepath: src/record.rs
//!
//! Internal tree member representation.
//!
//! A [`NodeRecord`] carries the node's identifier, an atomically swappable
//! [`ValueSlot`] with the caller's node, and a [`ChildList`] of direct
//! children.
//!
//! # Ownership
//! The tree's node index owns every record through an `Arc`. A parent's
//! child list only holds [`Weak`] references used for traversal: once a record
//! leaves the index it can no longer be reached from its parent, and a record
//! that was already unlinked is simply skipped by readers.

use std::fmt as StdFmt;
use std::mem as StdMem;
use std::ptr as StdPtr;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use seize::LocalGuard;

use crate::slot::ValueSlot;

// ============================================================================
//  NodeRecord
// ============================================================================

/// One member of a tree.
pub struct NodeRecord<N> {
    id: Arc<str>,
    value: ValueSlot<N>,
    children: ChildList<N>,
}

impl<N> NodeRecord<N> {
    /// Create a record for `id` holding `value`.
    #[must_use]
    pub fn new(id: Arc<str>, value: Arc<N>) -> Self {
        Self {
            id,
            value: ValueSlot::new(value),
            children: ChildList::new(),
        }
    }

    /// The record's identifier.
    #[must_use]
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared handle to the identifier, used to build ancestor chains
    /// without copying the string.
    #[must_use]
    #[inline]
    pub const fn shared_id(&self) -> &Arc<str> {
        &self.id
    }

    /// Current value, if the record has one.
    #[must_use]
    #[inline]
    pub fn value(&self, guard: &LocalGuard<'_>) -> Option<Arc<N>> {
        self.value.load(guard)
    }

    /// Swap in a new value, returning the previous one.
    #[inline]
    pub fn set_value(&self, value: Arc<N>, guard: &LocalGuard<'_>) -> Option<Arc<N>> {
        self.value.swap(value, guard)
    }

    /// Direct children.
    #[must_use]
    #[inline]
    pub const fn children(&self) -> &ChildList<N> {
        &self.children
    }

    /// Give a pooled record a new identity.
    pub(crate) fn reinit(&mut self, id: Arc<str>, value: Arc<N>) {
        self.id = id;
        drop(self.value.replace_mut(Some(value)));
        self.children.reset();
    }

    /// Drop the value and children so the record holds nothing of its
    /// previous life while it sits in the pool.
    pub(crate) fn clear(&mut self) {
        drop(self.value.replace_mut(None));
        self.children.reset();
    }
}

impl<N> StdFmt::Debug for NodeRecord<N> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("NodeRecord")
            .field("id", &self.id)
            .field("has_value", &!self.value.is_empty())
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
//  ChildList
// ============================================================================

/// Ordered list of a record's direct children.
///
/// Appends take the write lock briefly; reads return an upgraded snapshot.
/// Removal is by identity, not position: it rebuilds the list under a single
/// write lock, so a concurrent append is never lost and a concurrent removal
/// never shifts the target.
pub struct ChildList<N> {
    items: RwLock<Vec<Weak<NodeRecord<N>>>>,
}

impl<N> ChildList<N> {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    /// Append a child.
    pub fn append(&self, child: &Arc<NodeRecord<N>>) {
        self.items.write().push(Arc::downgrade(child));
    }

    /// Append several children, preserving their order.
    pub fn append_many<'a, I>(&self, children: I)
    where
        I: IntoIterator<Item = &'a Arc<NodeRecord<N>>>,
        N: 'a,
    {
        let mut items = self.items.write();
        items.extend(children.into_iter().map(Arc::downgrade));
    }

    /// Snapshot of the children still alive, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<Arc<NodeRecord<N>>> {
        self.items.read().iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of entries, including any whose record is already gone.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Filter `child` out of the list, pruning dead entries on the way.
    ///
    /// Returns `true` if `child` was present.
    pub fn remove(&self, child: &Arc<NodeRecord<N>>) -> bool {
        let target: *const NodeRecord<N> = Arc::as_ptr(child);
        let mut items = self.items.write();
        let mut found: bool = false;

        items.retain(|w| {
            if StdPtr::eq(w.as_ptr(), target) {
                found = true;
                return false;
            }
            w.strong_count() > 0
        });

        found
    }

    /// Drain the list, returning the children still alive.
    pub fn take(&self) -> Vec<Arc<NodeRecord<N>>> {
        let drained: Vec<Weak<NodeRecord<N>>> = StdMem::take(&mut *self.items.write());
        drained.iter().filter_map(Weak::upgrade).collect()
    }

    /// Remove every entry.
    pub fn reset(&self) {
        self.items.write().clear();
    }
}

impl<N> Default for ChildList<N> {
    fn default() -> Self {
        Self::new()
    }
}

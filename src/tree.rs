//! Filepath: src/tree.rs
//! `Tree` - a concurrently accessible hierarchy over a sharded index.
//!
//! This module provides the [`Tree`] aggregate and its [`TreeError`] type.
//!
//! # Layout
//! - `nodes`: [`ShardedIndex`] from id to the owning [`NodeRecord`] `Arc`.
//! - `ancestors`: [`AncestorIndex`] from id to its [`AncestorChain`].
//! - `root`: the single root record, behind a mutex so two concurrent root
//!   adds cannot both win.
//! - `count`: live node count.
//! - `epoch`: bumped by every `reset`.
//! - `collector`: [`seize`] collector protecting value-slot reads.
//!
//! # Cross-key ordering
//! `add` and `delete` touch several shards in separate critical sections,
//! so a concurrent reader can observe a child registered but not yet linked
//! under its parent, or a subtree partially torn down. Queries treat ids that
//! no longer resolve as already removed.
//!
//! Two orderings keep a racing `add` and `delete` from leaving an orphan:
//! 1. `delete` unregisters each node *before* draining its child list.
//! 2. `add` re-validates the parent *after* appending to its child list and
//!    rolls the child back if the parent is gone.
//!
//! Either the append lands before the drain (and the child is torn down with
//! the subtree) or after it (and the re-validation sees the parent missing).
//!
//! `reset` clears shards one at a time, so an `add` can store its child in a
//! shard that was already cleared. `reset` bumps `epoch` before clearing
//! anything, and `add` re-reads it during re-validation: a child stored after
//! its shard was cleared always sees the new epoch and is rolled back.
//!
//! # Duplicate ids
//! Adding a node whose id is already present overwrites that entry. The new
//! record adopts the previous record's children and the size is unchanged.
//! It is linked under the given parent, unless that parent is the node
//! itself or one of its descendants; then it takes the previous record's
//! place in the tree.

use std::fmt as StdFmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use seize::{Collector, LocalGuard};

use crate::alloc::{DEFAULT_POOL_CAPACITY, RecordPool};
use crate::ancestry::{AncestorChain, AncestorIndex};
use crate::index::{DEFAULT_SHARDS, ShardedIndex};
use crate::node::TreeNode;
use crate::record::NodeRecord;
use crate::tracing_helpers::{debug_log, trace_log};


// ============================================================================
//  TreeError
// ============================================================================

/// Errors returned by tree mutations.
///
/// All of them indicate misuse by the caller; none are transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeError {
    /// A root already exists and another parentless add was attempted.
    InvalidOperation,

    /// The parent passed to `add` is not in the tree.
    ParentNodeNotFound,

    /// The node is not in the tree.
    NotFound,
}

impl StdFmt::Display for TreeError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::InvalidOperation => write!(f, "invalid operation: tree already has a root"),

            Self::ParentNodeNotFound => write!(f, "parent node not found"),

            Self::NotFound => write!(f, "node not found"),
        }
    }
}

impl std::error::Error for TreeError {}

// ============================================================================
//  TreeConfig
// ============================================================================

/// Sizing knobs for a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Shards per index. Clamped to at least one.
    pub shards: usize,

    /// Idle records kept for reuse. Zero disables pooling.
    pub pool_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

// ============================================================================
//  Tree
// ============================================================================

/// A concurrent hierarchical container.
///
/// Every method takes `&self`; share a tree across threads with an [`Arc`].
///
/// # Example
///
/// ```rust
/// use shardtree::{Leaf, Tree, TreeError};
///
/// let tree: Tree<Leaf<u32>> = Tree::new();
/// let root = Leaf::new("root", 0);
/// let child = Leaf::new("child", 1);
///
/// tree.add(root.clone(), None).unwrap();
/// tree.add(child.clone(), Some(&root)).unwrap();
/// assert_eq!(tree.size(), 2);
///
/// let ancestors = tree.ancestors(&child).unwrap();
/// assert_eq!(ancestors.len(), 1);
/// assert_eq!(tree.add(Leaf::new("other", 2_u32), None), Err(TreeError::InvalidOperation));
/// ```
pub struct Tree<N> {
    /// Owning index: id -> record.
    nodes: ShardedIndex<Arc<NodeRecord<N>>>,

    /// id -> ancestor chain.
    ancestors: AncestorIndex,

    /// Free list for deleted records.
    pool: RecordPool<N>,

    /// The root record, if any.
    root: Mutex<Option<Arc<NodeRecord<N>>>>,

    /// Number of live nodes.
    count: AtomicUsize,

    /// Reset generation, checked by `add` before it commits.
    epoch: AtomicU64,

    /// Must be declared last: retired values are freed when it drops, after
    /// every record.
    collector: Collector,
}

impl<N> StdFmt::Debug for Tree<N> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Tree")
            .field("size", &self.count.load(AtomicOrdering::Relaxed))
            .field("shards", &self.nodes.shard_count())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl<N: TreeNode> Default for Tree<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: TreeNode> Tree<N> {
    /// Create an empty tree with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create an empty tree with the given configuration.
    #[must_use]
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: ShardedIndex::with_shards(config.shards),
            ancestors: AncestorIndex::with_shards(config.shards),
            pool: RecordPool::new(config.pool_capacity),
            root: Mutex::new(None),
            count: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
            collector: Collector::new(),
        }
    }

    #[inline]
    fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    // ========================================================================
    //  Mutations
    // ========================================================================

    /// Add `node` under `parent`, or as the root when `parent` is `None`.
    ///
    /// A node whose id is already present overwrites the existing entry and
    /// takes over its children (see the module docs); keeping ids unique is
    /// the caller's responsibility.
    ///
    /// # Errors
    ///
    /// - [`TreeError::InvalidOperation`] if `parent` is `None` and a root
    ///   already exists.
    /// - [`TreeError::ParentNodeNotFound`] if `parent` is not in the tree, or
    ///   was deleted while the add was in flight.
    pub fn add(&self, node: impl Into<Arc<N>>, parent: Option<&N>) -> Result<(), TreeError> {
        let node: Arc<N> = node.into();
        match parent {
            None => self.add_root(node),
            Some(parent) => self.add_child(node, parent.id()),
        }
    }

    fn add_root(&self, node: Arc<N>) -> Result<(), TreeError> {
        let mut root = self.root.lock();
        if root.is_some() {
            return Err(TreeError::InvalidOperation);
        }

        let id: Arc<str> = Arc::from(node.id());
        let record: Arc<NodeRecord<N>> = self.pool.acquire(Arc::clone(&id), node);

        self.ancestors.attach_root(&id);
        self.register(&id, &record);
        *root = Some(record);

        debug_log!(id = %id, "Tree: root installed");
        Ok(())
    }

    fn add_child(&self, node: Arc<N>, parent_id: &str) -> Result<(), TreeError> {
        let parent: Arc<NodeRecord<N>> = self
            .nodes
            .load(parent_id)
            .ok_or(TreeError::ParentNodeNotFound)?;
        // After the parent load: a reset before it already hid the parent.
        let epoch: u64 = self.epoch.load(AtomicOrdering::Acquire);

        if let Some(previous) = self.nodes.load(node.id()) {
            return self.overwrite(previous, node, &parent, epoch);
        }

        let id: Arc<str> = Arc::from(node.id());
        let record: Arc<NodeRecord<N>> = self.pool.acquire(Arc::clone(&id), node);

        // Chain first: whoever unregisters the record also drops its chain.
        self.ancestors.attach(&id, parent.shared_id());
        self.register(&id, &record);
        parent.children().append(&record);
        self.confirm_attached(&record, &parent, epoch)?;

        trace_log!(id = %id, parent = parent_id, "Tree: node attached");
        Ok(())
    }

    /// Replace `previous`, the indexed record with `node`'s id.
    fn overwrite(
        &self,
        previous: Arc<NodeRecord<N>>,
        node: Arc<N>,
        parent: &Arc<NodeRecord<N>>,
        epoch: u64,
    ) -> Result<(), TreeError> {
        let id: Arc<str> = Arc::clone(previous.shared_id());
        let old_parent: Option<Arc<NodeRecord<N>>> = self
            .ancestors
            .chain(&id)
            .and_then(|chain| chain.parent().and_then(|p| self.nodes.load(p)));

        // Linking under its own subtree would close a cycle.
        let below_previous: bool = Arc::ptr_eq(parent, &previous)
            || self
                .ancestors
                .chain(parent.id())
                .is_some_and(|chain| chain.iter().any(|ancestor| *ancestor == id));

        let record: Arc<NodeRecord<N>> = self.pool.acquire(Arc::clone(&id), node);

        if below_previous {
            // Same position: the chain stays valid.
            self.register(&id, &record);
            match old_parent {
                Some(old_parent) => {
                    old_parent.children().remove(&previous);
                    old_parent.children().append(&record);
                    self.confirm_attached(&record, &old_parent, epoch)?;
                }
                None => {
                    let mut root = self.root.lock();
                    if root.as_ref().is_some_and(|r| Arc::ptr_eq(r, &previous)) {
                        *root = Some(Arc::clone(&record));
                    }
                }
            }
        } else {
            self.ancestors.attach(&id, parent.shared_id());
            self.register(&id, &record);
            if let Some(old_parent) = old_parent {
                old_parent.children().remove(&previous);
            }
            parent.children().append(&record);
            self.rechain(&record);
            self.confirm_attached(&record, parent, epoch)?;
        }

        self.pool.recycle(previous);
        debug_log!(id = %id, "Tree: node overwritten");
        Ok(())
    }

    /// Replace the stored value of an existing node with `node`.
    ///
    /// The node is matched by id. Returns the previous value.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotFound`] if no node with that id is in the tree.
    pub fn update(&self, node: impl Into<Arc<N>>) -> Result<Option<Arc<N>>, TreeError> {
        let node: Arc<N> = node.into();
        let record: Arc<NodeRecord<N>> = self.nodes.load(node.id()).ok_or(TreeError::NotFound)?;
        let guard = self.guard();
        Ok(record.set_value(node, &guard))
    }

    /// Delete `node` and every descendant.
    ///
    /// Returns the number of nodes removed (`1 + descendants`).
    ///
    /// # Errors
    ///
    /// [`TreeError::NotFound`] if the node is not in the tree.
    pub fn delete(&self, node: &N) -> Result<usize, TreeError> {
        let id: &str = node.id();
        let record: Arc<NodeRecord<N>> = self.nodes.load(id).ok_or(TreeError::NotFound)?;

        if let Some(parent_id) = self.ancestors.at(id, 0)
            && let Some(parent) = self.nodes.load(&parent_id)
        {
            parent.children().remove(&record);
        }

        {
            let mut root = self.root.lock();
            if root.as_ref().is_some_and(|r| Arc::ptr_eq(r, &record)) {
                *root = None;
            }
        }

        let removed: usize = self.remove_subtree(record);
        if removed == 0 {
            // Lost the race to a concurrent delete of the same node.
            return Err(TreeError::NotFound);
        }

        debug_log!(id, removed, "Tree: subtree deleted");
        Ok(removed)
    }

    /// Remove every node, leaving the tree empty with no root.
    pub fn reset(&self) {
        let mut root = self.root.lock();
        self.epoch.fetch_add(1, AtomicOrdering::AcqRel);
        *root = None;
        let removed: usize = self.nodes.reset();
        self.ancestors.reset();
        // Only what was cleared: adds in flight keep their own count.
        self.count.fetch_sub(removed, AtomicOrdering::Relaxed);
        self.pool.drain();

        debug_log!("Tree: reset");
    }

    // ========================================================================
    //  Queries
    // ========================================================================

    /// Look up a node by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<Arc<N>> {
        let record: Arc<NodeRecord<N>> = self.nodes.load(id)?;
        let guard = self.guard();
        record.value(&guard)
    }

    /// Check whether a node with `id` is in the tree.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    /// Ancestors of `node`, sorted by id.
    ///
    /// Returns `None` if the node is unknown. The root has no ancestors.
    /// Ancestors removed by a concurrent delete are skipped.
    #[must_use]
    pub fn ancestors(&self, node: &N) -> Option<Vec<Arc<N>>> {
        let mut out: Vec<Arc<N>> = self.lineage(node)?;
        sort_by_id(&mut out);
        Some(out)
    }

    /// Ancestors of `node` in chain order: parent first, root last.
    #[must_use]
    pub fn lineage(&self, node: &N) -> Option<Vec<Arc<N>>> {
        let chain: AncestorChain = self.ancestors.chain(node.id())?;
        let guard = self.guard();
        Some(
            chain
                .iter()
                .filter_map(|ancestor| self.nodes.load(ancestor))
                .filter_map(|record| record.value(&guard))
                .collect(),
        )
    }

    /// Ancestor of `node` at `level` (0 is the immediate parent).
    ///
    /// Returns `None` if the node is unknown or `level` is at or beyond its
    /// depth.
    #[must_use]
    pub fn parent_at(&self, node: &N, level: usize) -> Option<Arc<N>> {
        let ancestor: Arc<str> = self.ancestors.at(node.id(), level)?;
        let record: Arc<NodeRecord<N>> = self.nodes.load(&ancestor)?;
        let guard = self.guard();
        record.value(&guard)
    }

    /// Direct children of `node`, sorted by id.
    #[must_use]
    pub fn children(&self, node: &N) -> Option<Vec<Arc<N>>> {
        let record: Arc<NodeRecord<N>> = self.nodes.load(node.id())?;
        let guard = self.guard();
        let mut out: Vec<Arc<N>> = record
            .children()
            .items()
            .iter()
            .filter_map(|child| child.value(&guard))
            .collect();
        sort_by_id(&mut out);
        Some(out)
    }

    /// Every node below `node` at any depth, sorted by id.
    ///
    /// Returns `None` if the node is unknown.
    #[must_use]
    pub fn descendants(&self, node: &N) -> Option<Vec<Arc<N>>> {
        let record: Arc<NodeRecord<N>> = self.nodes.load(node.id())?;
        let guard = self.guard();

        let mut out: Vec<Arc<N>> = Vec::new();
        let mut stack: Vec<Arc<NodeRecord<N>>> = record.children().items();
        while let Some(current) = stack.pop() {
            if let Some(value) = current.value(&guard) {
                out.push(value);
            }
            stack.extend(current.children().items());
        }

        sort_by_id(&mut out);
        Some(out)
    }

    /// The root node, if one exists.
    #[must_use]
    pub fn root(&self) -> Option<Arc<N>> {
        let record: Arc<NodeRecord<N>> = self.root.lock().clone()?;
        let guard = self.guard();
        record.value(&guard)
    }

    /// Number of nodes in the tree. O(1).
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        self.count.load(AtomicOrdering::Relaxed)
    }

    /// Check if the tree has no nodes.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Every node in the tree, in no particular order.
    #[must_use]
    pub fn nodes(&self) -> Vec<Arc<N>> {
        let guard = self.guard();
        self.nodes
            .values()
            .iter()
            .filter_map(|record| record.value(&guard))
            .collect()
    }

    // ========================================================================
    //  Internal Helpers
    // ========================================================================

    /// Check that `record` is still the indexed record for its id.
    fn is_indexed(&self, record: &Arc<NodeRecord<N>>) -> bool {
        self.nodes
            .load(record.id())
            .is_some_and(|current| Arc::ptr_eq(&current, record))
    }

    /// Store `record` in the node index.
    ///
    /// The count is raised before the record becomes visible, so whoever
    /// removes it (a delete or a reset) never decrements ahead of it. If the
    /// id was already taken (an overwrite, or a racing add of the same id)
    /// the record adopts the previous record's children and the count is
    /// taken back down.
    fn register(&self, id: &Arc<str>, record: &Arc<NodeRecord<N>>) {
        self.count.fetch_add(1, AtomicOrdering::Relaxed);
        if let Some(previous) = self.nodes.store(&**id, Arc::clone(record)) {
            self.count.fetch_sub(1, AtomicOrdering::Relaxed);
            record.children().append_many(&previous.children().take());
        }
    }

    /// Re-validate a freshly linked `record`: roll it back if `parent` was
    /// deleted or the tree was reset since `epoch` was read.
    fn confirm_attached(
        &self,
        record: &Arc<NodeRecord<N>>,
        parent: &Arc<NodeRecord<N>>,
        epoch: u64,
    ) -> Result<(), TreeError> {
        if self.is_indexed(parent) && self.epoch.load(AtomicOrdering::Acquire) == epoch {
            return Ok(());
        }

        self.remove_subtree(Arc::clone(record));
        debug_log!(
            id = record.id(),
            parent = parent.id(),
            "Tree: parent removed during add, child rolled back"
        );
        Err(TreeError::ParentNodeNotFound)
    }

    /// Rebuild the ancestor chains below `record` after it moved.
    fn rechain(&self, record: &Arc<NodeRecord<N>>) {
        let mut stack: Vec<Arc<NodeRecord<N>>> = vec![Arc::clone(record)];
        while let Some(current) = stack.pop() {
            for child in current.children().items() {
                self.ancestors.attach(child.shared_id(), current.shared_id());
                stack.push(child);
            }
        }
    }

    /// Tear down the subtree rooted at `start`.
    ///
    /// Each record is unregistered before its children are drained. Only
    /// records this call actually unregistered are counted, so two racing
    /// teardowns of overlapping subtrees never decrement twice.
    fn remove_subtree(&self, start: Arc<NodeRecord<N>>) -> usize {
        let mut removed: usize = 0;
        let mut stack: Vec<Arc<NodeRecord<N>>> = Vec::with_capacity(16);
        stack.push(start);

        while let Some(record) = stack.pop() {
            let unlinked: bool = self
                .nodes
                .remove_if(record.id(), |current| Arc::ptr_eq(current, &record))
                .is_some();

            if unlinked {
                self.ancestors.detach(record.id());
                self.count.fetch_sub(1, AtomicOrdering::Relaxed);
                removed += 1;
            }

            stack.extend(record.children().take());

            if unlinked {
                self.pool.recycle(record);
            }
        }

        removed
    }
}

fn sort_by_id<N: TreeNode>(nodes: &mut [Arc<N>]) {
    nodes.sort_by(|a, b| a.id().cmp(b.id()));
}

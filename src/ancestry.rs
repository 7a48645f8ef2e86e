//! Ancestor-chain maintenance.
//!
//! Every node in a tree has an [`AncestorChain`]: the identifiers of its
//! parent, grandparent, and so on up to the root, nearest first. A chain is
//! built once when the node is attached, as `[parent] + chain(parent)`, and is
//! never patched afterwards. Deleting a node destroys its whole subtree, so no
//! surviving chain ever needs to shift.
//!
//! Chains are immutable `Arc<[Arc<str>]>` values: cloning one out of the
//! index is a refcount bump, and building a child chain copies only the
//! parent's handles.

use std::fmt as StdFmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::index::ShardedIndex;

// ============================================================================
//  AncestorChain
// ============================================================================

/// Ordered ancestor identifiers of one node, nearest parent first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AncestorChain {
    ids: Arc<[Arc<str>]>,
}

impl AncestorChain {
    /// The chain of a root node (no ancestors).
    #[must_use]
    pub fn root() -> Self {
        Self {
            ids: Arc::from(Vec::new()),
        }
    }

    /// The chain of a child of the node owning `self`, whose id is `parent`.
    #[must_use]
    pub fn extend(&self, parent: &Arc<str>) -> Self {
        let mut ids: Vec<Arc<str>> = Vec::with_capacity(self.ids.len() + 1);
        ids.push(Arc::clone(parent));
        ids.extend(self.ids.iter().cloned());
        Self {
            ids: Arc::from(ids),
        }
    }

    /// Depth of the owning node (root is 0).
    #[must_use]
    #[inline]
    pub fn depth(&self) -> usize {
        self.ids.len()
    }

    /// Ancestor at `level` (0 is the immediate parent).
    #[must_use]
    #[inline]
    pub fn at(&self, level: usize) -> Option<&str> {
        self.ids.get(level).map(|id| &**id)
    }

    /// Immediate parent, if any.
    #[must_use]
    #[inline]
    pub fn parent(&self) -> Option<&str> {
        self.at(0)
    }
}

impl Deref for AncestorChain {
    type Target = [Arc<str>];

    fn deref(&self) -> &Self::Target {
        &self.ids
    }
}

impl StdFmt::Debug for AncestorChain {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_list().entries(self.ids.iter()).finish()
    }
}

// ============================================================================
//  AncestorIndex
// ============================================================================

/// Sharded table of ancestor chains keyed by node id.
#[derive(Debug, Default)]
pub struct AncestorIndex {
    chains: ShardedIndex<AncestorChain>,
}

impl AncestorIndex {
    /// Create an index with `shards` partitions.
    #[must_use]
    pub fn with_shards(shards: usize) -> Self {
        Self {
            chains: ShardedIndex::with_shards(shards),
        }
    }

    /// Register `id` as a root (empty chain).
    pub fn attach_root(&self, id: &Arc<str>) -> AncestorChain {
        let chain: AncestorChain = AncestorChain::root();
        self.chains.store(&**id, chain.clone());
        chain
    }

    /// Register `child` under `parent`, deriving the chain from the parent's.
    ///
    /// A parent with no registered chain is treated as a root.
    pub fn attach(&self, child: &Arc<str>, parent: &Arc<str>) -> AncestorChain {
        let chain: AncestorChain = self
            .chains
            .load(parent)
            .unwrap_or_else(AncestorChain::root)
            .extend(parent);
        self.chains.store(&**child, chain.clone());
        chain
    }

    /// Chain for `id`, if registered.
    #[must_use]
    #[inline]
    pub fn chain(&self, id: &str) -> Option<AncestorChain> {
        self.chains.load(id)
    }

    /// Identifier of the ancestor of `id` at `level`.
    #[must_use]
    pub fn at(&self, id: &str, level: usize) -> Option<Arc<str>> {
        self.chains
            .load(id)
            .and_then(|chain| chain.get(level).cloned())
    }

    /// Drop the chain for `id`.
    pub fn detach(&self, id: &str) -> Option<AncestorChain> {
        self.chains.delete(id)
    }

    /// Number of registered chains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Check whether no chain is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Drop every chain.
    pub fn reset(&self) {
        self.chains.reset();
    }
}

//! The caller-supplied node capability.
//!
//! A [`Tree`](crate::Tree) stores values of any type implementing
//! [`TreeNode`]: something with a stable string identifier and a payload.
//! The identifier must be unique within a tree and must not change while the
//! node is part of one. Neither property is checked.

/// A value that can be stored in a [`Tree`](crate::Tree).
pub trait TreeNode: Send + Sync {
    /// Payload type carried by the node.
    type Value;

    /// Stable identifier, unique within a tree.
    fn id(&self) -> &str;

    /// The node's payload.
    fn value(&self) -> &Self::Value;
}

/// A plain identifier + payload node.
///
/// ```rust
/// use shardtree::{Leaf, TreeNode};
///
/// let node = Leaf::new("root", 42u32);
/// assert_eq!(node.id(), "root");
/// assert_eq!(*node.value(), 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Leaf<V> {
    id: String,
    value: V,
}

impl<V> Leaf<V> {
    /// Create a node with the given identifier and payload.
    #[must_use]
    pub fn new(id: impl Into<String>, value: V) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    /// Consume the node, returning its payload.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V: Send + Sync> TreeNode for Leaf<V> {
    type Value = V;

    #[inline]
    fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    fn value(&self) -> &V {
        &self.value
    }
}

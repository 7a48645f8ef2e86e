//! # `shardtree`
//!
//! A concurrently accessible hierarchical container built on a sharded,
//! lock-partitioned index.
//!
//! Nodes are caller-supplied values implementing [`TreeNode`] (an id and a
//! payload). A [`Tree`] stores them in two sharded tables, one from id to
//! node record and one from id to ancestor chain, and keeps the usual tree
//! invariants: at most one root, parents registered before children, and an
//! ancestor chain per node computed once when it is attached.
//!
//! ## Thread Safety
//!
//! `Tree<N>` is `Send + Sync` when `N` is. Every operation takes `&self`:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use shardtree::{Leaf, Tree};
//!
//! let tree: Arc<Tree<Leaf<u32>>> = Arc::new(Tree::new());
//! let root = Leaf::new("root", 0);
//! tree.add(root.clone(), None).unwrap();
//!
//! let handles: Vec<_> = (0..4_u32)
//!     .map(|i| {
//!         let tree = Arc::clone(&tree);
//!         let root = root.clone();
//!         thread::spawn(move || tree.add(Leaf::new(format!("child-{i}"), i), Some(&root)))
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap().unwrap();
//! }
//!
//! assert_eq!(tree.descendants(&root).unwrap().len(), 4);
//! ```
//!
//! ## Design
//!
//! | Layer | Module | Concurrency |
//! |-------|--------|-------------|
//! | Sharded index | [`index`] | one `RwLock` per shard, FNV-1 routing |
//! | Node record | [`record`] | `seize`-protected value slot, locked child list |
//! | Ancestor chains | [`ancestry`] | immutable chains stored in a sharded index |
//! | Tree operations | [`tree`] | composes the above, no global lock |
//!
//! Operations on the same id are serialized by its shard; there is no
//! atomicity across ids. See [`tree`] for how `add` and `delete` are ordered
//! so that a racing pair never leaves an orphan behind.
//!
//! Query results from [`Tree::ancestors`], [`Tree::children`] and
//! [`Tree::descendants`] are sorted by id, not by depth.
//! [`Tree::lineage`] returns ancestors in chain order.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod alloc;
pub mod ancestry;
pub mod index;
pub mod node;
pub mod record;
pub mod slot;
pub mod tree;

mod tracing_helpers;

pub use ancestry::AncestorChain;
pub use index::ShardedIndex;
pub use node::{Leaf, TreeNode};
pub use tree::{Tree, TreeConfig, TreeError};

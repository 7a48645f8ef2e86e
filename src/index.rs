//! Filepath: src/index.rs
//!
//! Sharded, lock-partitioned key/value index.
//!
//! [`ShardedIndex`] splits the key space into a fixed number of shards. A key
//! is routed to its shard by a 64-bit FNV-1 hash modulo the shard count, and
//! every shard owns an independent [`RwLock`] around its own [`HashMap`].
//!
//! # Concurrency Model
//! 1. `load` takes the shard's shared lock.
//! 2. `store`, `delete` and `remove_if` take the shard's exclusive lock.
//! 3. `range` and `len` visit the shards one at a time under the shared lock,
//!    so they observe each shard consistently but the index as a whole is not
//!    snapshotted. No entry is visited twice.
//! 4. `reset` clears the shards one at a time under the exclusive lock.
//!
//! Operations on keys in different shards never contend.
//!
//! ```rust
//! use shardtree::index::ShardedIndex;
//!
//! let index: ShardedIndex<u64> = ShardedIndex::new();
//! index.store("a", 1);
//! assert_eq!(index.load("a"), Some(1));
//! assert_eq!(index.delete("a"), Some(1));
//! assert_eq!(index.load("a"), None);
//! ```

use std::collections::HashMap;
use std::fmt as StdFmt;

use parking_lot::RwLock;


// ============================================================================
//  Constants
// ============================================================================

/// Number of shards used by [`ShardedIndex::new`].
pub const DEFAULT_SHARDS: usize = 64;

/// FNV-1 64-bit offset basis.
const FNV64_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1 64-bit prime.
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1 hash of `key`.
///
/// Multiply-then-xor per byte (FNV-1, not FNV-1a).
#[must_use]
#[inline]
pub fn fnv64(key: &str) -> u64 {
    key.as_bytes().iter().fold(FNV64_OFFSET, |hash, &byte| {
        hash.wrapping_mul(FNV64_PRIME) ^ u64::from(byte)
    })
}

// ============================================================================
//  Shard
// ============================================================================

/// One independently locked partition of the key space.
struct Shard<V> {
    map: RwLock<HashMap<String, V>>,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

// ============================================================================
//  ShardedIndex
// ============================================================================

/// A concurrent string-keyed map partitioned into independently locked shards.
///
/// Values are returned by clone, so `V` is typically a cheap handle such as an
/// [`Arc`](std::sync::Arc).
pub struct ShardedIndex<V> {
    shards: Box<[Shard<V>]>,
}

impl<V> StdFmt::Debug for ShardedIndex<V> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("ShardedIndex")
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}

impl<V> Default for ShardedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ShardedIndex<V> {
    /// Create an index with [`DEFAULT_SHARDS`] shards.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create an index with `shards` shards (at least one).
    #[must_use]
    pub fn with_shards(shards: usize) -> Self {
        let shards: Box<[Shard<V>]> = (0..shards.max(1)).map(|_| Shard::new()).collect();
        Self { shards }
    }

    /// Number of shards.
    #[must_use]
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard `key` routes to.
    #[must_use]
    #[inline]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "result is reduced modulo the shard count, which fits in usize"
    )]
    pub fn shard_index(&self, key: &str) -> usize {
        (fnv64(key) % self.shards.len() as u64) as usize
    }

    #[inline]
    #[expect(
        clippy::indexing_slicing,
        reason = "shard_index is always < shards.len()"
    )]
    fn shard(&self, key: &str) -> &Shard<V> {
        &self.shards[self.shard_index(key)]
    }

    /// Insert or overwrite the entry for `key`, returning the previous value.
    pub fn store(&self, key: impl Into<String>, value: V) -> Option<V> {
        let key: String = key.into();
        let shard: &Shard<V> = self.shard(&key);
        shard.map.write().insert(key, value)
    }

    /// Remove the entry for `key`, returning it if present.
    pub fn delete(&self, key: &str) -> Option<V> {
        self.shard(key).map.write().remove(key)
    }

    /// Remove the entry for `key` only if `pred` accepts its current value.
    ///
    /// The check and the removal happen under one exclusive lock acquisition.
    pub fn remove_if<F>(&self, key: &str, pred: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut map = self.shard(key).map.write();
        if map.get(key).is_some_and(pred) {
            map.remove(key)
        } else {
            None
        }
    }

    /// Visit every entry, one shard at a time.
    ///
    /// The visitor runs while the shard's shared lock is held, so it must not
    /// call back into this index for a write.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &V),
    {
        for shard in &*self.shards {
            let map = shard.map.read();
            for (key, value) in map.iter() {
                visit(key, value);
            }
        }
    }

    /// Remove every entry.
    ///
    /// Returns the number of entries removed.
    pub fn reset(&self) -> usize {
        let mut removed: usize = 0;
        for shard in &*self.shards {
            let mut map = shard.map.write();
            removed += map.len();
            map.clear();
        }
        removed
    }

    /// Number of entries, summed shard by shard.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.map.read().len()).sum()
    }

    /// Check whether every shard is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.map.read().is_empty())
    }
}

impl<V: Clone> ShardedIndex<V> {
    /// Look up `key`, cloning the value out under the shared lock.
    #[must_use]
    pub fn load(&self, key: &str) -> Option<V> {
        self.shard(key).map.read().get(key).cloned()
    }

    /// Check whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.shard(key).map.read().contains_key(key)
    }

    /// Collect every value, shard by shard.
    #[must_use]
    pub fn values(&self) -> Vec<V> {
        let mut out: Vec<V> = Vec::new();
        self.range(|_, value| out.push(value.clone()));
        out
    }
}

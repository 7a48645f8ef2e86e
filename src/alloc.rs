//! Filepath: src/alloc.rs
//!
//! Record pooling.
//!
//! [`RecordPool`] keeps a bounded free list of `Arc<NodeRecord>` allocations
//! so that add/delete-heavy workloads reuse them instead of going back to
//! the global allocator every time. A pooled record is reset in place and
//! handed out again under the same `Arc`.
//!
//! A record can only be recycled when the caller holds the only reference to
//! it, strong or weak. Records still referenced elsewhere (a reader's
//! snapshot, a stale child-list entry) are left to drop normally.

use std::fmt as StdFmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::record::NodeRecord;

/// Default maximum number of idle records kept by a pool.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// A bounded free list of reset records.
pub struct RecordPool<N> {
    /// Every entry is uniquely owned, so `Arc::get_mut` succeeds on it.
    free: Mutex<Vec<Arc<NodeRecord<N>>>>,
    capacity: usize,
}

impl<N> StdFmt::Debug for RecordPool<N> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("RecordPool")
            .field("idle", &self.idle())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<N> Default for RecordPool<N> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl<N> RecordPool<N> {
    /// Create a pool keeping at most `capacity` idle records.
    ///
    /// A capacity of zero disables pooling.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Maximum number of idle records.
    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle records currently held.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Get a record for `id` holding `value`, reusing an idle one if any.
    #[must_use]
    pub fn acquire(&self, id: Arc<str>, value: Arc<N>) -> Arc<NodeRecord<N>> {
        let pooled: Option<Arc<NodeRecord<N>>> = self.free.lock().pop();
        if let Some(mut record) = pooled
            && let Some(slot) = Arc::get_mut(&mut record)
        {
            slot.reinit(id, value);
            return record;
        }
        Arc::new(NodeRecord::new(id, value))
    }

    /// Return a record to the pool.
    ///
    /// Returns `true` if the record was kept. The record is only kept when
    /// `record` is its sole reference and the pool has room.
    pub fn recycle(&self, mut record: Arc<NodeRecord<N>>) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let Some(slot) = Arc::get_mut(&mut record) else {
            return false;
        };
        slot.clear();

        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(record);
            true
        } else {
            false
        }
    }

    /// Drop every idle record.
    pub fn drain(&self) {
        self.free.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> Arc<String> {
        Arc::new(s.to_owned())
    }

    #[test]
    fn test_recycle_then_acquire_reuses() {
        let pool: RecordPool<String> = RecordPool::new(4);
        let rec = pool.acquire(Arc::from("a"), value("a"));
        assert_eq!(pool.idle(), 0);

        assert!(pool.recycle(rec));
        assert_eq!(pool.idle(), 1);

        let rec = pool.acquire(Arc::from("b"), value("b"));
        assert_eq!(pool.idle(), 0);
        assert_eq!(rec.id(), "b");
        assert!(rec.children().is_empty());
    }

    #[test]
    fn test_acquire_reuses_allocation() {
        let pool: RecordPool<String> = RecordPool::new(4);
        let first = pool.acquire(Arc::from("a"), value("a"));
        let addr = Arc::as_ptr(&first);

        assert!(pool.recycle(first));
        let reused = pool.acquire(Arc::from("b"), value("b"));
        assert_eq!(Arc::as_ptr(&reused), addr);
        assert_eq!(reused.id(), "b");
    }

    #[test]
    fn test_weakly_referenced_record_is_not_recycled() {
        let pool: RecordPool<String> = RecordPool::new(4);
        let rec = pool.acquire(Arc::from("a"), value("a"));
        let weak = Arc::downgrade(&rec);

        assert!(!pool.recycle(rec));
        assert_eq!(pool.idle(), 0);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_shared_record_is_not_recycled() {
        let pool: RecordPool<String> = RecordPool::new(4);
        let rec = pool.acquire(Arc::from("a"), value("a"));
        let other = Arc::clone(&rec);

        assert!(!pool.recycle(rec));
        assert_eq!(pool.idle(), 0);
        assert_eq!(other.id(), "a");
    }

    #[test]
    fn test_recycle_releases_value() {
        let pool: RecordPool<String> = RecordPool::new(4);
        let payload = value("payload");
        let rec = pool.acquire(Arc::from("a"), Arc::clone(&payload));
        assert_eq!(Arc::strong_count(&payload), 2);

        assert!(pool.recycle(rec));
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn test_capacity_bounds_idle_records() {
        let pool: RecordPool<String> = RecordPool::new(2);
        let recs: Vec<_> = (0..4)
            .map(|i| pool.acquire(Arc::from(i.to_string()), value("v")))
            .collect();

        let kept: usize = recs
            .into_iter()
            .map(|r| pool.recycle(r))
            .filter(|&kept| kept)
            .count();
        assert_eq!(kept, 2);
        assert_eq!(pool.idle(), 2);

        pool.drain();
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_zero_capacity_disables_pooling() {
        let pool: RecordPool<String> = RecordPool::new(0);
        let rec = pool.acquire(Arc::from("a"), value("a"));
        assert!(!pool.recycle(rec));
        assert_eq!(pool.idle(), 0);
    }
}

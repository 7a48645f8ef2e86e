//! Filepath: src/slot.rs
//!
//! Atomically swappable value slot.
//!
//! [`ValueSlot<T>`] stores an `Arc<T>` as a raw pointer inside an
//! [`AtomicPtr`]. Replacing the value is a single pointer swap, so a reader
//! sees either the old handle or the new one, never a mix.
//!
//! # Reclamation
//! A reader that loaded the old pointer must be able to bump its strong count
//! after a writer swapped it out. The writer therefore never drops the old
//! `Arc` directly: it hands the pointer to the tree's [`seize::Collector`]
//! through `guard.defer_retire()`, and the collector drops it once every guard
//! that could have observed it has been released.
//!
//! ```rust,ignore
//! let guard = collector.enter();
//! let old = slot.swap(Arc::new(v), &guard);
//! let cur = slot.load(&guard);
//! ```

use std::fmt as StdFmt;
use std::mem as StdMem;
use std::ptr as StdPtr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

use seize::{Collector, Guard, LocalGuard};

// ============================================================================
//  Reclaimer
// ============================================================================

/// Drop a retired `Arc<T>` (seize callback).
///
/// # Safety
///
/// - `ptr` must come from `Arc::into_raw` and own one strong count.
/// - Must only be called by seize once no guard can still observe `ptr`.
unsafe fn reclaim_arc<T>(ptr: *mut T, _collector: &Collector) {
    // SAFETY: Caller guarantees ptr came from Arc::into_raw and that no
    // reader can still reach it.
    unsafe { drop(Arc::from_raw(ptr.cast_const())) };
}

// ============================================================================
//  ValueSlot
// ============================================================================

/// A slot holding an optional `Arc<T>` with lock-free load and swap.
pub struct ValueSlot<T> {
    ptr: AtomicPtr<T>,
}

// SAFETY: The slot only hands out `Arc<T>` clones, which are Send + Sync when
// T is Send + Sync. The raw pointer is owned by the slot.
unsafe impl<T: Send + Sync> Send for ValueSlot<T> {}
// SAFETY: Loads and swaps go through the atomic pointer and the collector.
unsafe impl<T: Send + Sync> Sync for ValueSlot<T> {}

impl<T> ValueSlot<T> {
    /// Create an empty slot.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ptr: AtomicPtr::new(StdPtr::null_mut()),
        }
    }

    /// Create a slot holding `value`.
    #[must_use]
    pub fn new(value: Arc<T>) -> Self {
        Self {
            ptr: AtomicPtr::new(Arc::into_raw(value).cast_mut()),
        }
    }

    /// Check if the slot is currently empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr.load(Ordering::Acquire).is_null()
    }

    /// Load the current value.
    ///
    /// The guard keeps the pointer alive long enough to take a strong count.
    #[must_use]
    pub fn load(&self, guard: &LocalGuard<'_>) -> Option<Arc<T>> {
        let ptr: *mut T = guard.protect(&self.ptr, Ordering::Acquire);
        if ptr.is_null() {
            return None;
        }

        // SAFETY: ptr came from Arc::into_raw and is protected by the guard,
        // so the slot's strong count cannot be released until the guard drops.
        unsafe {
            Arc::increment_strong_count(ptr.cast_const());
            Some(Arc::from_raw(ptr.cast_const()))
        }
    }

    /// Replace the value, returning the previous one.
    ///
    /// The slot's own reference to the previous value is retired through the
    /// guard; the returned `Arc` is an independent clone.
    pub fn swap(&self, value: Arc<T>, guard: &LocalGuard<'_>) -> Option<Arc<T>> {
        let new_ptr: *mut T = Arc::into_raw(value).cast_mut();
        let old_ptr: *mut T = self.ptr.swap(new_ptr, Ordering::AcqRel);
        if old_ptr.is_null() {
            return None;
        }

        // SAFETY: old_ptr came from Arc::into_raw and still holds the slot's
        // strong count, which is only released by the deferred retirement.
        let old: Arc<T> = unsafe {
            Arc::increment_strong_count(old_ptr.cast_const());
            Arc::from_raw(old_ptr.cast_const())
        };

        // SAFETY: old_ptr is unreachable from the slot after the swap and is
        // retired exactly once.
        unsafe { guard.defer_retire(old_ptr, reclaim_arc::<T>) };

        Some(old)
    }

    /// Replace the value with exclusive access, dropping the previous one
    /// immediately.
    ///
    /// Used when recycling pooled records, where no reader can exist.
    pub fn replace_mut(&mut self, value: Option<Arc<T>>) -> Option<Arc<T>> {
        let new_ptr: *mut T = value.map_or(StdPtr::null_mut(), |v| Arc::into_raw(v).cast_mut());
        let old_ptr: *mut T = StdMem::replace(self.ptr.get_mut(), new_ptr);
        if old_ptr.is_null() {
            None
        } else {
            // SAFETY: &mut self proves no reader holds old_ptr; it came from
            // Arc::into_raw and we take over its strong count.
            Some(unsafe { Arc::from_raw(old_ptr.cast_const()) })
        }
    }
}

impl<T> Default for ValueSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Drop for ValueSlot<T> {
    fn drop(&mut self) {
        drop(self.replace_mut(None));
    }
}

impl<T> StdFmt::Debug for ValueSlot<T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("ValueSlot")
            .field("ptr", &self.ptr.load(Ordering::Relaxed))
            .finish()
    }
}

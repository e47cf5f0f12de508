//! Mutex discipline for the heap.
//!
//! [`LockedAllocator`] wraps a [`HeapAllocator`] in one process-wide mutex
//! and exposes the four public operations. Each entry point acquires the
//! lock exactly once and runs the lock-less internal operation under it;
//! `callocate` and `resize` compose `allocate` and `deallocate` *inside*
//! the heap, never through the locked surface, so the non-recursive mutex
//! is never re-entered.

use parking_lot::Mutex;

use crate::heap::{HeapAllocator, HeapStats};
use crate::os::{MemorySource, ProgramBreak};

/// A heap allocator behind a single mutex, safe to share across threads.
///
/// Operations are linearizable; their total order is the lock acquisition
/// order. The lock is held for the full duration of each operation,
/// including any break growth or mapping syscalls, which also keeps the
/// in-heap versus mapped discrimination race-free against concurrent heap
/// growth.
///
/// The constructor is `const`, so the allocator can live in a `static`:
///
/// ```rust,ignore
/// use fallocator::LockedAllocator;
///
/// static ALLOCATOR: LockedAllocator = LockedAllocator::new();
///
/// let ptr = unsafe { ALLOCATOR.allocate(64) };
/// unsafe { ALLOCATOR.deallocate(ptr) };
/// ```
pub struct LockedAllocator<S: MemorySource = ProgramBreak> {
  inner: Mutex<HeapAllocator<S>>,
}

impl LockedAllocator {
  /// Creates an uninitialized locked allocator over the real program
  /// break. No memory is acquired until the first allocation.
  pub const fn new() -> Self {
    Self::with_source(ProgramBreak)
  }
}

impl<S: MemorySource> LockedAllocator<S> {
  /// Creates an uninitialized locked allocator over the given break
  /// source.
  pub const fn with_source(os: S) -> Self {
    Self {
      inner: Mutex::new(HeapAllocator::with_source(os)),
    }
  }

  /// Allocates `size` bytes. See [`HeapAllocator::allocate`].
  ///
  /// # Safety
  ///
  /// The returned memory is uninitialized. The allocator must stay alive
  /// for as long as the returned pointer is in use.
  pub unsafe fn allocate(
    &self,
    size: usize,
  ) -> *mut u8 {
    let mut heap = self.inner.lock();
    unsafe { heap.allocate(size) }
  }

  /// Returns a block to the allocator. See [`HeapAllocator::deallocate`].
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer previously returned by this
  /// allocator; anything else is undefined behavior.
  pub unsafe fn deallocate(
    &self,
    ptr: *mut u8,
  ) {
    let mut heap = self.inner.lock();
    unsafe { heap.deallocate(ptr) }
  }

  /// Allocates zeroed memory for `count` elements of `element_size`
  /// bytes. See [`HeapAllocator::callocate`].
  ///
  /// # Safety
  ///
  /// The allocator must stay alive for as long as the returned pointer is
  /// in use.
  pub unsafe fn callocate(
    &self,
    count: usize,
    element_size: usize,
  ) -> *mut u8 {
    let mut heap = self.inner.lock();
    unsafe { heap.callocate(count, element_size) }
  }

  /// Moves the allocation at `ptr` into a block of `size` bytes. See
  /// [`HeapAllocator::resize`].
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer previously returned by this
  /// allocator. On success the old pointer is dead.
  pub unsafe fn resize(
    &self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    let mut heap = self.inner.lock();
    unsafe { heap.resize(ptr, size) }
  }

  /// Snapshot of the heap under the lock.
  pub fn stats(&self) -> HeapStats {
    self.inner.lock().stats()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::thread;

  use super::*;
  use crate::heap::test_support::arena;
  use crate::os::FixedRegion;

  fn locked() -> LockedAllocator<FixedRegion> {
    LockedAllocator::with_source(arena())
  }

  #[test]
  fn operations_compose_without_deadlocking() {
    let allocator = locked();

    unsafe {
      // callocate and resize run allocate/deallocate beneath the same
      // single lock acquisition; a recursive grab would hang right here.
      let p = allocator.callocate(16, 8);
      assert!(!p.is_null());

      for i in 0..128 {
        assert_eq!(p.add(i).read(), 0);
      }

      let q = allocator.resize(p, 512);
      assert_ne!(q, p);

      allocator.deallocate(q);
    }

    let stats = allocator.stats();
    assert_eq!(stats.free_blocks, 1);

    allocator.inner.lock().check_integrity();
  }

  #[test]
  fn zero_size_requests_release_the_lock() {
    let allocator = locked();

    unsafe {
      assert!(allocator.allocate(0).is_null());

      // A wedged lock would block every later call.
      let p = allocator.allocate(8);
      assert!(!p.is_null());
      allocator.deallocate(p);
    }
  }

  #[test]
  fn threads_share_one_allocator() {
    let allocator = Arc::new(locked());

    let workers: Vec<_> = (0..4)
      .map(|worker| {
        let allocator = Arc::clone(&allocator);

        thread::spawn(move || {
          let tag = 0x41 + worker as u8;

          for round in 1..200usize {
            let len = 1 + (round * 7 + worker * 13) % 512;

            unsafe {
              let ptr = allocator.allocate(len);
              assert!(!ptr.is_null());

              for i in 0..len {
                ptr.add(i).write(tag);
              }
              for i in 0..len {
                assert_eq!(ptr.add(i).read(), tag, "payloads must not overlap");
              }

              allocator.deallocate(ptr);
            }
          }
        })
      })
      .collect();

    for worker in workers {
      worker.join().unwrap();
    }

    // Every thread freed everything it allocated.
    let stats = allocator.stats();
    assert_eq!(stats.free_blocks, 1);

    allocator.inner.lock().check_integrity();
  }
}

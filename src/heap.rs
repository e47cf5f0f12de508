//! # Free-List Heap Allocator
//!
//! A first-fit allocator over a heap grown from a sequential program break.
//! Every block in the heap, free or allocated, starts with a [`BlockHeader`];
//! the free blocks additionally form a doubly-linked list kept in strictly
//! increasing address order.
//!
//! ## Heap Layout
//!
//! ```text
//!   start_brk                                                      end_brk
//!      │                                                              │
//!      ▼                                                              ▼
//!   ┌──────┬────────┬──────┬──────────┬──────┬────────┬──────┬───────┐
//!   │ hdr  │ data   │ hdr  │ FREE     │ hdr  │ data   │ hdr  │ FREE  │
//!   └──────┴────────┴──────┴──────────┴──────┴────────┴──────┴───────┘
//!              ▲        │        ▲                        │      ▲
//!              │        │        │                        │      │
//!      allocated      free_head ─┼─────── next ──────────┘      │
//!      (next = null)             └─────── prev ──────────┐      │
//!                                              free_tail ┘ next = heap_end
//!
//!   The heap is exactly tiled by blocks: stepping header + header_size +
//!   length from start_brk lands on every block and finally on end_brk.
//! ```
//!
//! ## Policies
//!
//! - **Placement**: first fit, walking the address-ordered free list from
//!   `free_head`. The lowest-addressed block that fits wins.
//! - **Splitting**: a chosen block is split when the leftover can hold a
//!   header plus one 8-byte quantum; smaller leftovers are donated to the
//!   allocation.
//! - **Coalescing**: eager. Deallocation merges with physically adjacent
//!   free neighbors immediately, so no two free blocks ever touch.
//! - **Growth**: the break only grows, in 4-page increments.
//! - **Large requests**: at or above 128 KiB the heap is bypassed entirely
//!   in favor of a dedicated anonymous mapping with a length prefix.
//!
//! [`HeapAllocator`] is the single-threaded core; its methods assume the
//! caller serializes access. [`crate::LockedAllocator`] provides the
//! process-wide mutex discipline on top of it.

use std::{mem, ptr};

use crate::block::BlockHeader;
use crate::os::{MemorySource, ProgramBreak};
use crate::{align, round_up_to, ALIGNMENT, HEAP_GROWTH_INCREMENT, MAX_REQUEST, MMAP_THRESHOLD};

/// Smallest leftover (header plus one quantum) that still becomes its own
/// free block when a larger block is carved up.
const SPLIT_THRESHOLD: usize = BlockHeader::SIZE + ALIGNMENT;

/// Byte width of the length prefix stored at the base of a large mapping.
///
/// One `usize` word on 64-bit hosts, two on 32-bit hosts; 8 bytes either
/// way, so the payload behind it stays 8-byte aligned.
const LARGE_PREFIX: usize = if mem::size_of::<usize>() % ALIGNMENT != 0 {
  2 * mem::size_of::<usize>()
} else {
  mem::size_of::<usize>()
};

/// Debug helper that prints an allocation together with the current
/// program break.
///
/// # Example Output
///
/// ```text
/// Allocated 64 bytes, address = 0x5555557a1040, program break = 0x5555557a2000
/// ```
pub unsafe fn print_alloc(
  size: usize,
  addr: *mut u8,
) {
  println!(
    "Allocated {} bytes, address = {:?}, program break = {:?}",
    size,
    addr,
    unsafe { libc::sbrk(0) },
  );
}

/// A point-in-time summary of the heap, computed by walking the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  /// Total bytes between the start of the heap and the current break.
  pub heap_bytes: usize,
  /// Number of blocks on the free list.
  pub free_blocks: usize,
  /// Total payload bytes across all free blocks.
  pub free_bytes: usize,
}

/// A free-list heap allocator over a [`MemorySource`].
///
/// The allocator lazily acquires its first page on the first allocation
/// and never returns break memory to the source. All state lives in this
/// value; creating two allocators over the *same* break would interleave
/// their growth and corrupt both heaps, which is why the production
/// [`ProgramBreak`] source must have exactly one allocator on it.
///
/// # Fields
///
/// * `free_head` / `free_tail` - lowest- and highest-addressed free block
/// * `start_brk` / `end_brk` - the heap's byte range; `end_brk`, cast to a
///   header pointer, doubles as the list-terminating sentinel
///
/// # Thread Safety
///
/// This type is **not** internally synchronized; methods take `&mut self`
/// and the caller must serialize access. [`crate::LockedAllocator`] wraps
/// it in the process-wide mutex.
pub struct HeapAllocator<S: MemorySource = ProgramBreak> {
  os: S,

  /// Cached page size of the break source. Set on initialization.
  page_size: usize,

  /// First byte of the heap.
  start_brk: *mut u8,

  /// One past the last byte of the heap; grows monotonically.
  end_brk: *mut u8,

  /// Lowest-addressed free block, or the sentinel when the list is empty.
  free_head: *mut BlockHeader,

  /// Highest-addressed free block.
  free_tail: *mut BlockHeader,

  initialized: bool,
}

// The allocator exclusively owns every block the raw pointers designate.
unsafe impl<S: MemorySource + Send> Send for HeapAllocator<S> {}

impl HeapAllocator {
  /// Creates an uninitialized allocator over the real program break.
  ///
  /// No memory is acquired until the first allocation.
  pub const fn new() -> Self {
    Self::with_source(ProgramBreak)
  }
}

impl<S: MemorySource> HeapAllocator<S> {
  /// Creates an uninitialized allocator over the given break source.
  pub const fn with_source(os: S) -> Self {
    Self {
      os,
      page_size: 0,
      start_brk: ptr::null_mut(),
      end_brk: ptr::null_mut(),
      free_head: ptr::null_mut(),
      free_tail: ptr::null_mut(),
      initialized: false,
    }
  }

  /// The sentinel terminating the free list: the current break, viewed as
  /// a header pointer. Recomputed on use because the break moves.
  #[inline]
  fn heap_end(&self) -> *mut BlockHeader {
    self.end_brk as *mut BlockHeader
  }

  /// True for pointers the heap did not hand out: the large-allocation
  /// path owns everything outside `[start_brk, end_brk]`.
  #[inline]
  fn is_outside_heap(
    &self,
    ptr: *mut u8,
  ) -> bool {
    ptr < self.start_brk || ptr > self.end_brk
  }

  /// Acquires the first page and installs one free block spanning it.
  ///
  /// Returns false if the break source refuses the very first growth.
  unsafe fn init_heap(&mut self) -> bool {
    let page_size = self.os.page_size();

    let base = unsafe { self.os.extend_break(page_size) };
    if base.is_null() {
      return false;
    }

    self.page_size = page_size;
    self.start_brk = base;
    self.end_brk = unsafe { base.add(page_size) };

    let head = base as *mut BlockHeader;
    unsafe {
      (*head).length = page_size - BlockHeader::SIZE;
      (*head).prev = ptr::null_mut();
      (*head).next = self.heap_end();
    }

    self.free_head = head;
    self.free_tail = head;
    self.initialized = true;

    true
  }

  /// Grows the heap by at least `amount` bytes.
  ///
  /// The byte count is rounded up to whole pages and the page count up to
  /// the growth increment, so the break always advances by a multiple of
  /// `HEAP_GROWTH_INCREMENT` pages. Returns the number of pages added, or
  /// `None` if the break source refused.
  unsafe fn grow_heap(
    &mut self,
    amount: usize,
  ) -> Option<usize> {
    let pages = round_up_to!(amount, self.page_size) / self.page_size;
    let pages = round_up_to!(pages, HEAP_GROWTH_INCREMENT);
    let delta = pages * self.page_size;

    let previous = unsafe { self.os.extend_break(delta) };
    if previous.is_null() {
      return None;
    }

    self.end_brk = unsafe { previous.add(delta) };
    Some(pages)
  }

  /// Writes a free block of `size` total bytes (header included) at `loc`
  /// and splices it into the free list between `prev` and `next`.
  ///
  /// `next` may be the sentinel, in which case the new block becomes the
  /// tail; `prev` may be null, in which case the caller is responsible for
  /// `free_head`.
  unsafe fn install_free_block(
    &mut self,
    loc: *mut BlockHeader,
    prev: *mut BlockHeader,
    next: *mut BlockHeader,
    size: usize,
  ) {
    unsafe {
      (*loc).length = size - BlockHeader::SIZE;

      (*loc).next = next;
      if next != self.heap_end() {
        (*next).prev = loc;
      } else {
        self.free_tail = loc;
      }

      (*loc).prev = prev;
      if !prev.is_null() {
        (*prev).next = loc;
      }
    }
  }

  /// Converts the free block at `loc` into an allocated block of payload
  /// size `size` and returns its payload address.
  ///
  /// `length` is the payload capacity of the free block being consumed;
  /// `prev_free` and `next_free` are its free-list neighbors.
  ///
  /// ```text
  ///   Split (leftover can host a block):
  ///
  ///   before   ┌──────┬································┐
  ///            │ hdr  │            length              │
  ///            └──────┴································┘
  ///   after    ┌──────┬─────────┬──────┬··············┐
  ///            │ hdr  │ size    │ hdr  │ remainder    │ <- takes loc's
  ///            └──────┴─────────┴──────┴··············┘    list position
  ///
  ///   Consume (leftover below the split threshold):
  ///
  ///   after    ┌──────┬────────────────────────────────┐
  ///            │ hdr  │ size + slack (donated)         │
  ///            └──────┴────────────────────────────────┘
  /// ```
  ///
  /// If consuming `loc` empties the free list, the heap is grown by one
  /// increment and a fresh free block is installed there, so a valid
  /// `free_head` survives every allocation.
  unsafe fn carve_data_block(
    &mut self,
    loc: *mut BlockHeader,
    size: usize,
    length: usize,
    prev_free: *mut BlockHeader,
    next_free: *mut BlockHeader,
  ) -> *mut u8 {
    unsafe {
      (*loc).length = size;

      let payload = BlockHeader::payload(loc);

      let mut remainder: *mut BlockHeader = ptr::null_mut();
      if length - size >= SPLIT_THRESHOLD {
        // Split: the remainder inherits loc's position in the list.
        remainder = payload.add(size) as *mut BlockHeader;
        self.install_free_block(remainder, prev_free, next_free, length - size);
      } else {
        // Donate the slack to the allocation and unlink loc.
        (*loc).length = length;

        if !(*loc).prev.is_null() {
          (*(*loc).prev).next = (*loc).next;

          if loc == self.free_tail {
            self.free_tail = (*loc).prev;
          }
        }
        if (*loc).next != self.heap_end() {
          (*(*loc).next).prev = (*loc).prev;
        }
      }

      // Mark allocated.
      (*loc).next = ptr::null_mut();

      if loc == self.free_head {
        if !remainder.is_null() {
          self.free_head = remainder;
        } else {
          self.free_head = next_free;

          // Consuming the last free block may not leave the list empty:
          // grow and seed a fresh block at the old break.
          if self.free_head == self.heap_end() {
            let seed = self.free_head;

            if self.grow_heap(1).is_some() {
              let total = self.end_brk as usize - seed as usize;
              self.install_free_block(seed, ptr::null_mut(), self.heap_end(), total);
              self.free_head = seed;
            } else {
              // Growth refused: the list stays empty, and free_tail has
              // to say so too, or it keeps pointing at the block just
              // handed out.
              self.free_tail = self.heap_end();
            }
          }

          if self.free_head != self.heap_end() {
            (*self.free_head).prev = ptr::null_mut();
          }
        }
      }

      payload
    }
  }

  /// Allocates `size` bytes and returns the payload address, or null.
  ///
  /// The size is rounded up to the 8-byte quantum. Requests of zero bytes
  /// return null without touching the heap; requests at or above the mmap
  /// threshold are served by a dedicated anonymous mapping.
  ///
  /// # Allocation Process
  ///
  /// ```text
  ///   1. round size up to a multiple of 8
  ///   2. size >= 128 KiB          -> anonymous mapping, skip the heap
  ///   3. walk the free list       -> first block with length >= size
  ///   4a. hit                     -> split or consume it
  ///   4b. miss, tail at the break -> grow, extend the tail, consume it
  ///   4c. miss otherwise          -> grow, seed a block in the new region
  /// ```
  ///
  /// # Safety
  ///
  /// The caller must serialize access to the allocator. The returned
  /// memory is uninitialized.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 || size > MAX_REQUEST {
      return ptr::null_mut();
    }

    unsafe {
      if !self.initialized && !self.init_heap() {
        return ptr::null_mut();
      }

      let size = align!(size);

      if size >= MMAP_THRESHOLD {
        return self.allocate_large(size);
      }

      // First fit over the address-ordered free list.
      let mut cursor = self.free_head;
      let mut prev_free: *mut BlockHeader = ptr::null_mut();

      while cursor != self.heap_end() {
        let length = (*cursor).length;
        let next_free = (*cursor).next;

        if length >= size {
          return self.carve_data_block(cursor, size, length, prev_free, next_free);
        }

        prev_free = cursor;
        cursor = next_free;
      }

      // No block fits; the heap has to grow.
      if !prev_free.is_null() && BlockHeader::past_end(prev_free) == self.end_brk {
        // The tail free block touches the break: extend it in place.
        let length = (*prev_free).length;
        let required = size + BlockHeader::SIZE - length;

        let Some(pages) = self.grow_heap(required) else {
          return ptr::null_mut();
        };

        let length = length + pages * self.page_size;
        (*prev_free).length = length;
        (*prev_free).next = self.heap_end();

        self.carve_data_block(prev_free, size, length, (*prev_free).prev, self.heap_end())
      } else {
        // The bytes behind the break are not adjacent to any free block:
        // seed a fresh block there. The walk left `cursor` at the old
        // break, which is exactly where the new region begins.
        let Some(pages) = self.grow_heap(size + BlockHeader::SIZE) else {
          return ptr::null_mut();
        };

        let total = pages * self.page_size;
        self.install_free_block(cursor, prev_free, self.heap_end(), total);

        self.carve_data_block(cursor, size, total - BlockHeader::SIZE, prev_free, self.heap_end())
      }
    }
  }

  /// Serves a request at or above the mmap threshold.
  ///
  /// The mapping is sized to the rounded request plus the length prefix,
  /// rounded up to whole pages. The mapping length lands in the prefix
  /// word(s) and the payload starts right behind them.
  ///
  /// ```text
  ///   mapping base        payload (returned)
  ///        │                  │
  ///        ▼                  ▼
  ///   ┌─────────────────┬──────────────────────────────────────┐
  ///   │ mapping length  │ payload ...                          │
  ///   └─────────────────┴──────────────────────────────────────┘
  ///    8 bytes: one word on 64-bit hosts, two words on 32-bit
  /// ```
  unsafe fn allocate_large(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    unsafe {
      let map_size = round_up_to!(size + LARGE_PREFIX, self.page_size);

      let base = self.os.map_anonymous(map_size);
      if base.is_null() {
        return ptr::null_mut();
      }

      let prefix = base as *mut usize;
      prefix.write(map_size);
      if LARGE_PREFIX > mem::size_of::<usize>() {
        // Two-word prefix: both words carry the mapping length.
        prefix.add(1).write(map_size);
      }

      base.add(LARGE_PREFIX)
    }
  }

  /// Returns a block to the allocator. Null pointers are a no-op.
  ///
  /// Pointers outside the heap's byte range belong to the large path and
  /// are unmapped. Heap pointers rejoin the free list in one of three
  /// positional cases, merging with physically adjacent free neighbors:
  ///
  /// ```text
  ///             free_head                free_tail
  ///                 │                        │
  ///     ┌───────────▼────────────────────────▼───────────┐
  ///     │ B         │ ....... interior ..... │          B│
  ///     │ case B    │        case C          │    case A │
  ///     └───────────┴────────────────────────┴───────────┘
  ///
  ///   A: past the tail   - absorb into the tail if adjacent, else append
  ///   B: before the head - absorb the head if adjacent, else prepend
  ///   C: interior        - merge right via the neighbor's in-band flag,
  ///                        locate list neighbors by a directional scan,
  ///                        then merge or link left
  /// ```
  ///
  /// If a refused growth has left the free list empty, the freed block
  /// becomes the whole list instead.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer previously returned by this
  /// allocator; freeing foreign pointers or double-freeing is undefined
  /// behavior. The caller must serialize access.
  pub unsafe fn deallocate(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() || !self.initialized {
      return;
    }

    unsafe {
      if self.is_outside_heap(ptr) {
        self.deallocate_large(ptr);
        return;
      }

      let block = BlockHeader::from_payload(ptr);

      // A refused growth can leave the list empty; the freed block then
      // becomes the whole list, and the positional cases never look at
      // the sentinel ends.
      if self.free_head == self.heap_end() {
        (*block).prev = ptr::null_mut();
        (*block).next = self.heap_end();

        self.free_head = block;
        self.free_tail = block;
        return;
      }

      if block > self.free_tail {
        self.free_past_tail(block);
      } else if block < self.free_head {
        self.free_before_head(block);
      } else {
        self.free_interior(block);
      }
    }
  }

  /// Case A: the block lies past the highest free block.
  unsafe fn free_past_tail(
    &mut self,
    block: *mut BlockHeader,
  ) {
    unsafe {
      let tail = self.free_tail;

      if BlockHeader::past_end(tail) == block as *mut u8 {
        // Physically adjacent: the tail swallows the block.
        (*tail).length += (*block).length + BlockHeader::SIZE;
      } else {
        (*tail).next = block;
        (*block).prev = tail;
        (*block).next = self.heap_end();

        self.free_tail = block;
      }
    }
  }

  /// Case B: the block lies before the lowest free block.
  unsafe fn free_before_head(
    &mut self,
    block: *mut BlockHeader,
  ) {
    unsafe {
      let head = self.free_head;

      if BlockHeader::past_end(block) == head as *mut u8 {
        // Adjacent: the block swallows the old head and takes its links.
        (*block).length += (*head).length + BlockHeader::SIZE;
        (*block).next = (*head).next;

        if (*head).next != self.heap_end() {
          (*(*head).next).prev = block;
        } else {
          self.free_tail = block;
        }
      } else {
        (*block).next = head;
        (*head).prev = block;
      }

      (*block).prev = ptr::null_mut();
      self.free_head = block;
    }
  }

  /// Case C: the block lies strictly between `free_head` and `free_tail`.
  unsafe fn free_interior(
    &mut self,
    block: *mut BlockHeader,
  ) {
    unsafe {
      let neighbor = BlockHeader::past_end(block) as *mut BlockHeader;
      let prev_free: *mut BlockHeader;

      if !(*neighbor).next.is_null() {
        // The physically next block is free: merge right and inherit its
        // list links.
        (*block).length += (*neighbor).length + BlockHeader::SIZE;
        (*block).next = (*neighbor).next;

        if (*neighbor).next != self.heap_end() {
          (*(*neighbor).next).prev = block;
        } else {
          self.free_tail = block;
        }

        prev_free = (*neighbor).prev;
      } else {
        // Locate the list neighbors by scanning from whichever end of the
        // heap is closer to the block.
        let midpoint = self.start_brk as usize + (self.end_brk as usize - self.start_brk as usize) / 2;

        let (prev, next) = if (block as usize) < midpoint {
          let mut prev = self.free_head;
          let mut next = (*self.free_head).next;

          while next < block {
            prev = (*prev).next;
            next = (*next).next;
          }

          (prev, next)
        } else {
          let mut next = self.free_tail;
          let mut prev = (*self.free_tail).prev;

          while prev > block {
            next = (*next).prev;
            prev = (*prev).prev;
          }

          (prev, next)
        };

        (*block).next = next;
        (*next).prev = block;

        prev_free = prev;
      }

      if BlockHeader::past_end(prev_free) == block as *mut u8 {
        // The logical predecessor is also the physical one: merge left.
        (*prev_free).length += (*block).length + BlockHeader::SIZE;
        (*prev_free).next = (*block).next;

        if (*block).next != self.heap_end() {
          (*(*block).next).prev = prev_free;
        } else {
          self.free_tail = prev_free;
        }
      } else {
        (*prev_free).next = block;
        (*block).prev = prev_free;
      }
    }
  }

  /// Unmaps a large allocation: the mapping length sits in the prefix
  /// right behind the payload, and the mapping base is one prefix before
  /// the payload.
  unsafe fn deallocate_large(
    &mut self,
    ptr: *mut u8,
  ) {
    unsafe {
      let base = ptr.sub(LARGE_PREFIX);
      let map_size = (base as *const usize).read();

      self.os.unmap(base, map_size);
    }
  }

  /// Allocates zero-initialized memory for `count` elements of
  /// `element_size` bytes each.
  ///
  /// Returns null when the product is zero or overflows. Exactly the
  /// requested bytes are zeroed; slack rounded onto the block is not.
  ///
  /// # Safety
  ///
  /// The caller must serialize access to the allocator.
  pub unsafe fn callocate(
    &mut self,
    count: usize,
    element_size: usize,
  ) -> *mut u8 {
    let Some(total) = count.checked_mul(element_size) else {
      return ptr::null_mut();
    };
    if total == 0 {
      return ptr::null_mut();
    }

    unsafe {
      let payload = self.allocate(total);

      if !payload.is_null() {
        payload.write_bytes(0, total);
      }

      payload
    }
  }

  /// Moves the allocation at `ptr` into a fresh block of `size` bytes.
  ///
  /// - null `ptr` behaves as [`allocate`](Self::allocate)
  /// - `size == 0` behaves as [`deallocate`](Self::deallocate) and
  ///   returns null
  /// - otherwise the payload prefix is copied into a new block and the
  ///   old one is freed; the result never aliases `ptr`
  ///
  /// If the new allocation cannot be made, null is returned and the old
  /// block stays live.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer previously returned by this
  /// allocator. The caller must serialize access.
  pub unsafe fn resize(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    unsafe {
      if ptr.is_null() {
        return self.allocate(size);
      }

      if size == 0 {
        self.deallocate(ptr);
        return ptr::null_mut();
      }

      if size > MAX_REQUEST {
        return ptr::null_mut();
      }

      let size = align!(size);

      let new_ptr = self.allocate(size);
      if new_ptr.is_null() {
        return ptr::null_mut();
      }

      // Usable bytes behind the old and new payloads. For mapped regions
      // the prefix word right behind the payload stores the mapping
      // length, prefix included.
      let old_size = if self.is_outside_heap(ptr) {
        (ptr.sub(mem::size_of::<usize>()) as *const usize).read() - LARGE_PREFIX
      } else {
        (*BlockHeader::from_payload(ptr)).length
      };

      let new_size = if self.is_outside_heap(new_ptr) {
        (new_ptr.sub(mem::size_of::<usize>()) as *const usize).read() - LARGE_PREFIX
      } else {
        size
      };

      ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(new_size));

      self.deallocate(ptr);

      new_ptr
    }
  }

  /// Walks the free list and summarizes the heap.
  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      heap_bytes: self.end_brk as usize - self.start_brk as usize,
      free_blocks: 0,
      free_bytes: 0,
    };

    if !self.initialized {
      return stats;
    }

    let mut cursor = self.free_head;
    while cursor != self.heap_end() {
      unsafe {
        stats.free_blocks += 1;
        stats.free_bytes += (*cursor).length;
        cursor = (*cursor).next;
      }
    }

    stats
  }

  /// Verifies every structural invariant of the heap, panicking on the
  /// first violation. Intended for tests and debugging.
  ///
  /// Checked properties:
  ///
  /// - the heap is exactly tiled by blocks from `start_brk` to `end_brk`,
  ///   every block length a multiple of 8
  /// - the heap size is a whole number of pages
  /// - the free list is strictly address-ordered with consistent back
  ///   pointers, null head `prev`, and the sentinel as the tail `next`
  /// - no two free blocks are physically adjacent
  /// - an empty free list shows the sentinel in both `free_head` and
  ///   `free_tail`
  /// - the blocks on the free list are exactly the blocks whose in-band
  ///   flag says "free" (so every allocated block has a null `next`)
  pub fn check_integrity(&self) {
    if !self.initialized {
      return;
    }

    let heap_bytes = self.end_brk as usize - self.start_brk as usize;
    assert_eq!(heap_bytes % self.page_size, 0, "heap size must be whole pages");

    unsafe {
      // Tiling walk, noting which blocks claim to be free.
      let mut tiled_free = Vec::new();
      let mut cursor = self.start_brk;

      while (cursor as usize) < self.end_brk as usize {
        let block = cursor as *mut BlockHeader;
        let length = (*block).length;

        assert_eq!(length % ALIGNMENT, 0, "block length must be a multiple of 8");
        assert_eq!(
          BlockHeader::payload(block) as usize % ALIGNMENT,
          0,
          "payload must be 8-byte aligned",
        );

        if !(*block).next.is_null() {
          tiled_free.push(block as usize);
        }

        cursor = BlockHeader::past_end(block);
      }

      assert_eq!(
        cursor as usize, self.end_brk as usize,
        "block walk must end exactly at the break",
      );

      // Free-list walk.
      let mut listed = Vec::new();
      let mut cursor = self.free_head;
      let mut prev: *mut BlockHeader = ptr::null_mut();

      while cursor != self.heap_end() {
        if prev.is_null() {
          assert!((*cursor).prev.is_null(), "head of the free list must have no prev");
        } else {
          assert!((prev as usize) < (cursor as usize), "free list must be address-ordered");
          assert_eq!((*cursor).prev, prev, "free-list back pointer mismatch");
          assert_ne!(
            BlockHeader::past_end(prev) as usize,
            cursor as usize,
            "adjacent free blocks must have been coalesced",
          );
        }

        listed.push(cursor as usize);
        prev = cursor;
        cursor = (*cursor).next;
      }

      if !prev.is_null() {
        assert_eq!(prev, self.free_tail, "free_tail must be the last listed block");
      } else {
        assert_eq!(
          self.free_tail,
          self.heap_end(),
          "an empty free list must show the sentinel in both ends",
        );
      }

      assert_eq!(
        listed, tiled_free,
        "free list must cover exactly the blocks flagged free in the heap",
      );
    }
  }
}

#[cfg(test)]
pub(crate) mod test_support {
  use std::ptr;

  use libc::{mmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

  use crate::os::FixedRegion;

  pub const ARENA_BYTES: usize = 1024 * FixedRegion::PAGE_SIZE;

  /// Maps a page-aligned arena for one test heap. The mapping is leaked
  /// deliberately: a heap never returns break memory, and tests run in
  /// parallel.
  pub fn arena() -> FixedRegion {
    arena_sized(ARENA_BYTES)
  }

  /// Maps an arena of exactly `bytes` bytes, for tests that need to pin
  /// where break growth starts failing.
  pub fn arena_sized(
    bytes: usize,
  ) -> FixedRegion {
    let base = unsafe {
      mmap(
        ptr::null_mut(),
        bytes,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };
    assert_ne!(base, MAP_FAILED);

    FixedRegion::new(base as *mut u8, bytes)
  }
}

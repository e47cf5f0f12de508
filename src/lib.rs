//! # fallocator - A Free-List Memory Allocator Library
//!
//! This crate provides a general-purpose **free-list allocator** in Rust
//! that manages a heap grown from the program break via the `sbrk` system
//! call, with an `mmap` fast path for large requests.
//!
//! ## Overview
//!
//! The allocator keeps every block's metadata in-band, right in front of
//! its payload, and threads the free blocks onto a doubly-linked list in
//! strictly increasing address order:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          HEAP MEMORY                                 │
//!   │                                                                      │
//!   │   ┌───┬─────┬───┬─────────┬───┬─────┬───┬──────────────────────┐     │
//!   │   │hdr│ A1  │hdr│  free   │hdr│ A2  │hdr│        free          │     │
//!   │   └───┴─────┴───┴─────────┴───┴─────┴───┴──────────────────────┘     │
//!   │   ▲            ▲                       ▲                      ▲      │
//!   │   │            │                       │                      │      │
//!   │  start_brk   free_head ── next ──► free_tail              Program    │
//!   │                   ◄───── prev ──────┘                      Break     │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation walks the list first-fit; deallocation splices the block
//!   back in address order and eagerly merges adjacent free neighbors.
//! ```
//!
//! Requests of 128 KiB and above skip the heap entirely: each one gets a
//! private anonymous mapping with its length stored in front of the
//! payload, and deallocation unmaps it directly.
//!
//! ## Crate Structure
//!
//! ```text
//!   fallocator
//!   ├── align      - Rounding macros (align!, round_up_to!)
//!   ├── block      - Block metadata structure (internal)
//!   ├── os         - MemorySource trait, ProgramBreak and FixedRegion
//!   ├── heap       - HeapAllocator implementation
//!   └── locked     - LockedAllocator, the thread-safe wrapper
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fallocator::LockedAllocator;
//!
//! static ALLOCATOR: LockedAllocator = LockedAllocator::new();
//!
//! fn main() {
//!     unsafe {
//!         // Allocate memory for 64 bytes
//!         let ptr = ALLOCATOR.allocate(64);
//!
//!         // Use the memory
//!         ptr.write(42);
//!         println!("Value: {}", ptr.read());
//!
//!         // Resize it, then free it
//!         let ptr = ALLOCATOR.resize(ptr, 128);
//!         ALLOCATOR.deallocate(ptr);
//!     }
//! }
//! ```
//!
//! ## How It Works
//!
//! The heap is a single contiguous range `[start_brk, end_brk)` acquired
//! from the operating system one break extension at a time:
//!
//! ```text
//!   Program Memory Layout:
//!
//!   High Address ┌─────────────────────┐
//!                │       Stack         │ ↓ grows down
//!                │         │           │
//!                │         ▼           │
//!                │                     │
//!                │   mmap mappings     │ ← large allocations (>= 128 KiB)
//!                │                     │
//!                │         ▲           │
//!                │         │           │
//!                │       Heap          │ ↑ grows up (sbrk, 4-page steps)
//!                ├─────────────────────┤ ← Program Break
//!                │   Uninitialized     │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │   Initialized       │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │       Text          │
//!   Low Address  └─────────────────────┘
//! ```
//!
//! The break never moves backwards: freed blocks return to the free list
//! for reuse, not to the operating system. Large mappings, by contrast,
//! are returned to the OS the moment they are deallocated.
//!
//! ## Features
//!
//! - **First-fit placement** over an address-ordered free list
//! - **Eager coalescing**: no two free blocks are ever adjacent
//! - **Block splitting** when the leftover can host another block
//! - **Large-allocation path**: dedicated mappings above 128 KiB
//! - **Thread safety**: one process-wide mutex around every operation
//! - **Pluggable break source**: run the same heap inside a fixed region
//!
//! ## Limitations
//!
//! - **The break is never released**: the heap only grows for the life of
//!   the process
//! - **Exclusive break ownership**: while a [`ProgramBreak`]-backed heap
//!   is live, nothing else in the process may call `sbrk`
//! - **8-byte alignment only**: stricter alignments are not supported
//! - **Unix-only**: requires `libc` with `sbrk` and `mmap`
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory
//! management. Callers must uphold the usual allocator contract: no
//! double frees, no foreign pointers, no use after free.

pub mod align;
mod block;
mod heap;
mod locked;
mod os;

pub use heap::{print_alloc, HeapAllocator, HeapStats};
pub use locked::LockedAllocator;
pub use os::{FixedRegion, MemorySource, ProgramBreak};

/// Alignment quantum: payload addresses and sizes are multiples of this.
pub const ALIGNMENT: usize = 8;

/// Requests at or above this many bytes are served by anonymous mappings
/// instead of the heap.
pub const MMAP_THRESHOLD: usize = 128 * 1024;

/// The break grows by multiples of this many pages.
pub const HEAP_GROWTH_INCREMENT: usize = 4;

/// Largest request the allocator will attempt; anything bigger returns
/// null outright.
pub const MAX_REQUEST: usize = isize::MAX as usize;

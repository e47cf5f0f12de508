use std::ptr;

use fallocator::{print_alloc, LockedAllocator};
use libc::sbrk;

/// The process-wide allocator. Nothing else in this program may move the
/// program break while it is in use.
static ALLOCATOR: LockedAllocator = LockedAllocator::new();

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  unsafe {
    // Initial heap state: nothing acquired yet, the heap is lazy.
    print_program_break("start");

    // --------------------------------------------------------------------
    // 1) Allocate space for a u64 and show it is usable.
    //    The first allocation acquires one page and installs the free list.
    // --------------------------------------------------------------------
    let first_block = ALLOCATOR.allocate(8);
    println!("\n[1] Allocate u64");
    print_alloc(8, first_block);

    let first_ptr = first_block as *mut u64;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    // --------------------------------------------------------------------
    // 2) Allocate 100 bytes (rounds up to 104) and initialize them.
    // --------------------------------------------------------------------
    let second_block = ALLOCATOR.allocate(100);
    println!("\n[2] Allocate 100 bytes");
    print_alloc(100, second_block);

    ptr::write_bytes(second_block, 0xAB, 100);
    println!("[2] Initialized second block with 0xAB");

    // --------------------------------------------------------------------
    // 3) Free the first block, then allocate the same size again.
    //    First-fit hands back the lowest free block: the one just freed.
    // --------------------------------------------------------------------
    ALLOCATOR.deallocate(first_block);
    println!("\n[3] Deallocated first_block at {:?}", first_block);

    let third_block = ALLOCATOR.allocate(8);
    println!(
      "[3] third_block == first_block? {}",
      if third_block == first_block {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    // --------------------------------------------------------------------
    // 4) Allocate 256 KiB. This is above the mmap threshold, so it comes
    //    from an anonymous mapping and the program break does not move.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    let big_block = ALLOCATOR.allocate(256 * 1024);
    println!("\n[4] Allocate large 256 KiB block");
    print_alloc(256 * 1024, big_block);

    print_program_break("after large alloc");

    ALLOCATOR.deallocate(big_block);
    println!("[4] Deallocated the large block (unmapped immediately)");

    // --------------------------------------------------------------------
    // 5) callocate: zero-initialized allocation.
    // --------------------------------------------------------------------
    let array = ALLOCATOR.callocate(16, 8);
    println!("\n[5] callocate 16 x 8 bytes");
    print_alloc(16 * 8, array);

    let all_zero = (0..128).all(|i| array.add(i).read() == 0);
    println!("[5] All 128 bytes zero? {}", all_zero);

    // --------------------------------------------------------------------
    // 6) resize: the payload prefix moves to a fresh, larger block.
    // --------------------------------------------------------------------
    array.write_bytes(0x17, 128);
    let bigger = ALLOCATOR.resize(array, 512);
    println!("\n[6] Resize 128 -> 512 bytes");
    print_alloc(512, bigger);

    let prefix_kept = (0..128).all(|i| bigger.add(i).read() == 0x17);
    println!(
      "[6] bigger != array? {}, first 128 bytes preserved? {}",
      bigger != array,
      prefix_kept,
    );

    // --------------------------------------------------------------------
    // 7) Free everything and show the heap summary. The break stays where
    //    it is: freed blocks return to the free list, not to the OS.
    // --------------------------------------------------------------------
    ALLOCATOR.deallocate(bigger);
    ALLOCATOR.deallocate(third_block);
    ALLOCATOR.deallocate(second_block);

    let stats = ALLOCATOR.stats();
    println!(
      "\n[7] Heap: {} bytes, {} free block(s), {} free payload bytes",
      stats.heap_bytes, stats.free_blocks, stats.free_bytes,
    );

    print_program_break("end");
  }
}

use std::mem;

/// Metadata at the start of every heap block, free or allocated.
///
/// `next` doubles as the free/allocated discriminator: allocated blocks have
/// `next == null`, free blocks point at the next free block or at the
/// heap-end sentinel (the current program break) when they are last.
#[repr(C)]
pub struct BlockHeader {
  /// Byte count of the payload. Always a multiple of 8; excludes the header.
  pub length: usize,
  /// Previous free block, or null for the first free block. Unread while
  /// the block is allocated.
  pub prev: *mut BlockHeader,
  /// Next free block, heap-end sentinel, or null when allocated.
  pub next: *mut BlockHeader,
  /// Keeps the header size a multiple of 8 on 32-bit hosts, so payloads
  /// stay 8-byte aligned.
  _pad: usize,
}

impl BlockHeader {
  pub const SIZE: usize = mem::size_of::<BlockHeader>();

  /// Payload address of the given block.
  #[inline]
  pub unsafe fn payload(block: *mut BlockHeader) -> *mut u8 {
    unsafe { (block as *mut u8).add(Self::SIZE) }
  }

  /// Recovers the header from a payload pointer handed out by `payload`.
  #[inline]
  pub unsafe fn from_payload(ptr: *mut u8) -> *mut BlockHeader {
    unsafe { ptr.sub(Self::SIZE) as *mut BlockHeader }
  }

  /// First byte past the block: header address + header size + length.
  #[inline]
  pub unsafe fn past_end(block: *mut BlockHeader) -> *mut u8 {
    unsafe { (block as *mut u8).add(Self::SIZE + (*block).length) }
  }
}

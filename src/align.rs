/// Rounds the given size up to the 8-byte allocation quantum.
///
/// Every payload size the allocator manages is a multiple of this quantum,
/// which keeps payload addresses 8-byte aligned for any fundamental type.
///
/// # Examples
///
/// ```rust
/// use fallocator::align;
///
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::ALIGNMENT - 1) & !($crate::ALIGNMENT - 1)
  };
}

/// Rounds the given value up to the nearest multiple of an arbitrary factor.
///
/// Used for page-size rounding and for rounding page counts up to the heap
/// growth increment. The factor does not need to be a power of two.
///
/// # Examples
///
/// ```rust
/// use fallocator::round_up_to;
///
/// assert_eq!(round_up_to!(1, 4096), 4096);
/// assert_eq!(round_up_to!(4097, 4096), 8192);
/// assert_eq!(round_up_to!(3, 4), 4);
/// assert_eq!(round_up_to!(8, 4), 8);
/// ```
#[macro_export]
macro_rules! round_up_to {
  ($value:expr, $factor:expr) => {
    ($value + ($factor - 1)) / $factor * $factor
  };
}

#[cfg(test)]
mod tests {
  use crate::ALIGNMENT;

  #[test]
  fn align_sweeps_every_quantum_bucket() {
    let mut expectations = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected = ALIGNMENT * (i + 1);

      expectations.push((sizes, expected));
    }

    for (sizes, expected) in expectations {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn align_keeps_multiples_unchanged() {
    for i in 0..64 {
      assert_eq!(i * ALIGNMENT, align!(i * ALIGNMENT));
    }
  }

  #[test]
  fn round_up_to_page_and_increment_factors() {
    assert_eq!(round_up_to!(0usize, 4096), 0);
    assert_eq!(round_up_to!(1usize, 4096), 4096);
    assert_eq!(round_up_to!(4096usize, 4096), 4096);
    assert_eq!(round_up_to!(4097usize, 4096), 8192);

    // Page counts round up to the growth increment of 4.
    assert_eq!(round_up_to!(1usize, 4), 4);
    assert_eq!(round_up_to!(4usize, 4), 4);
    assert_eq!(round_up_to!(5usize, 4), 8);
  }
}

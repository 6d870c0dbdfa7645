//! Helpers for the arithmetic every other module needs.
//! They don't belong to any concrete part of the allocator.

/// Rounds `to_be_aligned` up to the next multiple of `alignment`.
///
/// `alignment` has to be a power of two. Values that are already a multiple
/// of `alignment` are returned unchanged. Returns `None` if rounding up would
/// overflow `usize`.
///
/// This is used both for request sizes (header plus payload) and for the
/// header slot itself, so that every block boundary inside the heap ends up
/// on an alignment unit.
pub fn align(to_be_aligned: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    to_be_aligned
        .checked_add(alignment - 1)
        .map(|value| value & !(alignment - 1))
}

/// Tells whether `value` is a multiple of `alignment` (a power of two).
#[inline]
pub fn is_aligned(value: usize, alignment: usize) -> bool {
    value & (alignment - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_word_size() {
        let aligments = vec![(1..=8, 8), (9..=16, 16), (17..=24, 24), (25..=32, 32)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(Some(expected), align(size, 8));
            }
        }
    }

    #[test]
    fn exact_multiples_are_kept() {
        assert_eq!(Some(0), align(0, 8));
        assert_eq!(Some(16), align(16, 8));
        assert_eq!(Some(4096), align(4096, 16));
    }

    #[test]
    fn align_overflow_is_reported() {
        assert_eq!(None, align(usize::MAX, 8));
        assert_eq!(None, align(usize::MAX - 3, 8));
    }

    #[test]
    fn aligned_values() {
        assert!(is_aligned(0, 8));
        assert!(is_aligned(24, 8));
        assert!(!is_aligned(12, 8));
        assert!(!is_aligned(24, 16));
    }
}

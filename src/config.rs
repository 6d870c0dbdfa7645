use snafu::ensure;

use crate::{
    block::HEADER_BYTES,
    error::{HeapError, InvalidConfigSnafu},
    kernel::page_size,
    utils::{align, is_aligned},
};

/// Size in bytes of the region a heap requests from the operating system.
pub const HEAP_SIZE: usize = 4096;

/// Every block boundary and every returned address is a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Fixed parameters of a [`crate::Heap`].
///
/// Both values are hard limits: the heap requests exactly `capacity` bytes
/// once and never grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Total size of the managed region, headers included.
    pub capacity: usize,
    /// Alignment unit, a power of two not smaller than the header encoding
    /// and not larger than the page size.
    pub alignment: usize,
}

impl HeapConfig {
    pub const fn new() -> Self {
        Self {
            capacity: HEAP_SIZE,
            alignment: ALIGNMENT,
        }
    }

    pub const fn with_capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    pub const fn with_alignment(self, alignment: usize) -> Self {
        Self { alignment, ..self }
    }

    /// Bytes reserved in front of every block for its header. The raw header
    /// is padded up to the alignment unit so data regions stay aligned.
    pub const fn header_size(&self) -> usize {
        (HEADER_BYTES + self.alignment - 1) & !(self.alignment - 1)
    }

    /// Checks the invariants the block encoding relies on.
    pub fn validate(&self) -> Result<(), HeapError> {
        ensure!(
            self.alignment.is_power_of_two(),
            InvalidConfigSnafu {
                reason: "alignment must be a power of two"
            }
        );
        ensure!(
            self.alignment >= HEADER_BYTES,
            InvalidConfigSnafu {
                reason: "alignment must be at least the header size"
            }
        );
        // The region is only guaranteed to start on a page boundary.
        ensure!(
            self.alignment <= page_size(),
            InvalidConfigSnafu {
                reason: "alignment must not exceed the page size"
            }
        );
        ensure!(
            self.capacity > 0 && is_aligned(self.capacity, self.alignment),
            InvalidConfigSnafu {
                reason: "capacity must be a non-zero multiple of the alignment"
            }
        );
        // Offsets are stored as `u32` inside the headers.
        ensure!(
            u32::try_from(self.capacity).is_ok(),
            InvalidConfigSnafu {
                reason: "capacity must fit in 32 bits"
            }
        );
        ensure!(
            align(HEADER_BYTES, self.alignment)
                .and_then(|header| header.checked_mul(2))
                .is_some_and(|min| self.capacity >= min),
            InvalidConfigSnafu {
                reason: "capacity must hold at least two block headers"
            }
        );

        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

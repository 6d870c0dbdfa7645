use std::ptr::NonNull;

use crate::{
    block::{self, Header},
    config::HeapConfig,
    error::{HeapError, OutOfMemorySnafu},
    region::Region,
    utils::align,
    walk::{Blocks, HeapDump, HeapStats},
};

/// A first-fit heap over one fixed-size region.
///
/// The region is requested from the operating system the first time
/// [`Heap::allocate`] is called and is never grown afterwards. Blocks are
/// laid out back to back inside it, each one starting with its header:
///
/// ```text
///  +--------+------+--------+------------+--------+--------------------+
///  | in use | data |  free  |    data    | in use |        data        |
///  +--------+------+--------+------------+--------+--------------------+
///      |              ^ |                    ^ |
///      +--------------+ +--------------------+ +--> none (end of region)
/// ```
///
/// Free blocks are merged lazily and only forwards: freeing a block folds the
/// free blocks that follow it into it, and the allocation scan does the same
/// for every free block it visits before measuring it.
///
/// ### Accounting
///
/// `available` is decremented by every successful allocation but freeing a
/// block does not give the bytes back. Only [`Heap::reset`] restores it. A
/// request larger than `available` fails even if the chain has room for it.
///
/// ### Threads
///
/// A heap has a single owner. It is neither `Send` nor `Sync`, all operations
/// take `&mut self` and run to completion without synchronization.
pub struct Heap {
    config: HeapConfig,
    /// Header slot size, cached from `config`.
    header_size: usize,
    /// Coarse counter of bytes that may still be handed out.
    available: usize,
    /// `None` until the first allocation.
    region: Option<Region>,
}

impl Heap {
    /// Creates a heap with the default configuration: a 4096 byte region and
    /// 8 byte alignment. No memory is requested until the first allocation.
    pub const fn new() -> Self {
        let config = HeapConfig::new();

        Self {
            config,
            header_size: config.header_size(),
            available: 0,
            region: None,
        }
    }

    /// Creates a heap with a custom capacity and alignment.
    pub fn with_config(config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;

        Ok(Self {
            config,
            header_size: config.header_size(),
            available: 0,
            region: None,
        })
    }

    /// Whether the region has been requested already.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.region.is_some()
    }

    /// Start of the managed region, once initialized.
    #[inline]
    pub fn base(&self) -> Option<NonNull<u8>> {
        self.region.as_ref().map(Region::base)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.config.alignment
    }

    #[inline]
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Value of the `available` counter. See the type level docs for what it
    /// does and does not track.
    #[inline]
    pub fn available(&self) -> usize {
        self.available
    }

    /// Requests the region and writes a single free block spanning it.
    fn request_region(&mut self) -> Result<Region, HeapError> {
        let mut region = Region::request(self.config.capacity, self.config.alignment)?;
        Header::last_free().write(&mut region, 0);

        self.available = self.config.capacity;

        log::debug!(
            "heap initialized: {} bytes at {:p}, {} byte headers",
            self.config.capacity,
            region.base(),
            self.header_size,
        );

        Ok(region)
    }

    /// Finds the first block that can hold `size` bytes, splitting it if the
    /// rest is worth keeping, and returns the address of its content.
    ///
    /// The returned address is aligned to [`Heap::alignment`] and stays valid
    /// until it is passed to [`Heap::free`], the heap is [reset](Heap::reset)
    /// or dropped. `size == 0` is a valid request.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, HeapError> {
        let header_size = self.header_size;
        let alignment = self.config.alignment;

        let needed = size
            .checked_add(header_size)
            .and_then(|total| align(total, alignment));

        let region = match self.region.take() {
            Some(region) => region,
            None => self.request_region()?,
        };
        let region = self.region.insert(region);
        let available = self.available;

        let Some(needed) = needed.filter(|&needed| needed <= available) else {
            log::warn!("allocate({size}) refused: {available} bytes available");
            return OutOfMemorySnafu {
                requested: size,
                needed: needed.unwrap_or(usize::MAX),
                available,
            }
            .fail();
        };

        let Some(offset) = first_fit(region, needed) else {
            log::warn!("allocate({size}) refused: no free block of {needed} bytes");
            return OutOfMemorySnafu {
                requested: size,
                needed,
                available,
            }
            .fail();
        };

        let span = block::span(region, offset);
        if span >= needed + header_size + alignment {
            let rest = offset + needed;

            Header {
                next: block::next(region, offset),
                in_use: false,
            }
            .write(region, rest);
            block::set_next(region, offset, Some(rest));

            log::trace!("split block at {offset}: {needed} + {} bytes", span - needed);
        }

        block::set_in_use(region, offset);
        let data = region.address(offset + header_size);

        self.available -= needed;

        log::trace!("allocate({size}) -> {data:p} (block at {offset}, {needed} bytes)");
        self.check_heap();

        Ok(data)
    }

    /// Gives the block holding `ptr` back to the heap and merges it with the
    /// free blocks that follow it. A null `ptr` is ignored.
    ///
    /// The `available` counter is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an address returned by [`Heap::allocate`] on
    /// this same heap that has not been freed since (and not invalidated by a
    /// [`Heap::reset`]). Freeing anything else corrupts the block chain, and
    /// later allocations may overlap memory that is still in use.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };

        let header_size = self.header_size;
        let Some(region) = self.region.as_mut() else {
            log::warn!("free({ptr:p}) on a heap that was never used");
            return;
        };

        let Some(offset) = region
            .offset_of(ptr)
            .and_then(|data| data.checked_sub(header_size))
        else {
            log::warn!("free({ptr:p}) outside of the heap region");
            return;
        };

        log::trace!(
            "free({ptr:p}): block at {offset}, {} bytes",
            block::usable_size(region, offset, header_size)
        );

        block::clear_in_use(region, offset);
        compact(region, offset);

        self.check_heap();
    }

    /// Marks every block as free and merges the whole chain back into one
    /// block, as it was right after initialization. The region is kept and
    /// `available` is restored to the full capacity.
    ///
    /// Every address handed out before the reset becomes invalid. Resetting a
    /// heap that was never used does nothing.
    pub fn reset(&mut self) {
        let Some(region) = self.region.as_mut() else {
            return;
        };

        let mut current = Some(0);
        while let Some(offset) = current {
            block::clear_in_use(region, offset);
            current = block::next(region, offset);
        }

        compact(region, 0);
        self.available = self.config.capacity;

        log::debug!("heap reset: {} bytes available", self.available);
        self.check_heap();
    }

    /// Usable bytes of the block whose content starts at `ptr`, or `None` if
    /// `ptr` doesn't point into this heap.
    ///
    /// This is the size of the whole block, which may be larger than what was
    /// requested because of alignment or an unsplit remainder.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        let region = self.region.as_ref()?;
        let offset = region.offset_of(ptr)?.checked_sub(self.header_size)?;

        Some(block::usable_size(region, offset, self.header_size))
    }

    /// Read-only walk over the block chain, from the start of the region.
    /// Yields nothing before the first allocation.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks::new(self.region.as_ref(), self.header_size)
    }

    /// Summary of the current block chain.
    pub fn stats(&self) -> HeapStats {
        HeapStats::collect(self)
    }

    /// Printable report of the heap and every block in it.
    pub fn dump(&self) -> HeapDump<'_> {
        HeapDump::new(self)
    }

    /// Verifies the chain is contiguous, ascending, aligned and covers the
    /// whole region. Only runs in debug builds.
    #[cfg(debug_assertions)]
    fn check_heap(&self) {
        let mut expected = 0;

        for block in self.blocks() {
            debug_assert_eq!(block.offset, expected, "block chain has a gap");
            debug_assert!(crate::utils::is_aligned(block.offset, self.config.alignment));
            expected = block.offset + self.header_size + block.size;
        }

        debug_assert!(self.region.is_none() || expected == self.config.capacity);

        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", self.dump());
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn check_heap(&self) {}
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges the run of free blocks following `start` into it. Stops at the
/// first block in use or at the end of the chain. `start` itself must be free.
fn compact(region: &mut Region, start: usize) {
    let mut last = block::next(region, start);
    let mut merged = 0;

    while let Some(offset) = last {
        if block::is_in_use(region, offset) {
            break;
        }

        last = block::next(region, offset);
        merged += 1;
    }

    if merged > 0 {
        block::set_next(region, start, last);
        log::trace!("compacted {merged} free blocks into block at {start}");
    }
}

/// Returns the lowest block whose span, after merging its free successors,
/// holds `needed` bytes. The span counts the header, so a block fits when its
/// usable size is at least `needed - header_size`.
fn first_fit(region: &mut Region, needed: usize) -> Option<usize> {
    let mut current = Some(0);

    while let Some(offset) = current {
        if !block::is_in_use(region, offset) {
            compact(region, offset);

            if block::span(region, offset) >= needed {
                return Some(offset);
            }
        }

        current = block::next(region, offset);
    }

    None
}

use std::ptr::NonNull;

use snafu::OptionExt;

use crate::{
    error::{HeapError, RegionUnavailableSnafu},
    kernel::{page_size, request_memory, return_memory},
    utils::{align, is_aligned},
};

/// The single contiguous piece of memory a [`crate::Heap`] manages.
///
/// Everything inside the region is addressed by byte offsets from its start,
/// so the heap never does pointer arithmetic of its own: it asks the region
/// to read or write a word at an offset, or to turn an offset into an address
/// for the user.
///
/// ```text
///  base                                                   base + capacity
///  +--------+-----------+--------+-----------+--------+----------------+
///  | Header |   data    | Header |   data    | Header |      data      |
///  +--------+-----------+--------+-----------+--------+----------------+
///  0        8           32       40          64       72
/// ```
///
/// The mapping is rounded up to whole pages, but only the first `capacity`
/// bytes are ever handed out. The memory goes back to the kernel on drop.
pub(crate) struct Region {
    /// Start of the mapping returned by the kernel.
    base: NonNull<u8>,
    /// Usable size of the region.
    capacity: usize,
    /// Size of the mapping, a multiple of the page size.
    mapped: usize,
}

impl Region {
    /// Requests `capacity` bytes from the operating system. The start of the
    /// region is checked against `alignment` so that every aligned offset is
    /// also an aligned address.
    pub fn request(capacity: usize, alignment: usize) -> Result<Self, HeapError> {
        let mapped = align(capacity, page_size()).context(RegionUnavailableSnafu { capacity })?;
        let base = unsafe { request_memory(mapped) }.context(RegionUnavailableSnafu { capacity })?;

        if !is_aligned(base.as_ptr() as usize, alignment) {
            log::warn!("region at {base:p} is not aligned to {alignment} bytes");
            unsafe { return_memory(base, mapped) };
            return RegionUnavailableSnafu { capacity }.fail();
        }

        log::debug!("requested {capacity} byte region at {base:p} ({mapped} bytes mapped)");

        Ok(Self {
            base,
            capacity,
            mapped,
        })
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Address of the byte at `offset`. `offset == capacity` is allowed and
    /// gives the one-past-the-end address.
    #[inline]
    pub fn address(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.capacity, "offset {offset} outside of region");
        unsafe { self.base.add(offset) }
    }

    /// Inverse of [`Region::address`]: offset of `addr` inside the region, or
    /// `None` if it lies outside of it.
    pub fn offset_of(&self, addr: NonNull<u8>) -> Option<usize> {
        let offset = (addr.as_ptr() as usize).checked_sub(self.base.as_ptr() as usize)?;

        (offset < self.capacity).then_some(offset)
    }

    /// Reads the native-endian `u32` stored at `offset`.
    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset + size_of::<u32>() <= self.capacity);
        unsafe { self.base.add(offset).cast::<u32>().read_unaligned() }
    }

    /// Writes `value` at `offset` as a native-endian `u32`.
    #[inline]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        assert!(offset + size_of::<u32>() <= self.capacity);
        unsafe { self.base.add(offset).cast::<u32>().write_unaligned(value) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        log::debug!("returning region at {:p} to the kernel", self.base);
        unsafe { return_memory(self.base, self.mapped) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_round_trip_at_offsets() {
        let mut region = Region::request(4096, 8).unwrap();

        region.write_u32(0, 0xDEAD_BEEF);
        region.write_u32(4092, 7);

        assert_eq!(region.read_u32(0), 0xDEAD_BEEF);
        assert_eq!(region.read_u32(4092), 7);
        assert_eq!(region.capacity(), 4096);
    }

    #[test]
    fn offsets_and_addresses() {
        let region = Region::request(1024, 8).unwrap();
        let addr = region.address(24);

        assert_eq!(region.offset_of(addr), Some(24));
        assert_eq!(region.offset_of(region.base()), Some(0));
        assert_eq!(region.offset_of(region.address(1024)), None);
        assert_eq!(region.address(1024).as_ptr() as usize - region.base().as_ptr() as usize, 1024);
    }

    #[test]
    #[should_panic]
    fn reads_past_capacity_panic() {
        let region = Region::request(64, 8).unwrap();
        region.read_u32(64);
    }
}

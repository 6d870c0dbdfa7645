//! Read-only views over a heap: the block walker, the textual dump and the
//! summary statistics. None of this is needed to allocate or free memory, it
//! exists to look at the heap from tests and tools.

use std::{fmt, ptr::NonNull};

use crate::{block::Header, heap::Heap, region::Region};

/// One block of the chain as seen by [`Blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the header from the start of the region.
    pub offset: usize,
    /// Address of the header.
    pub header: NonNull<u8>,
    /// Address of the content, what [`Heap::allocate`] returned for it.
    pub data: NonNull<u8>,
    pub in_use: bool,
    /// Usable bytes, derived from the position of the next header.
    pub size: usize,
    /// Offset of the next header, `None` for the last block.
    pub next: Option<usize>,
}

/// Iterator over the blocks of a heap, in address order.
pub struct Blocks<'a> {
    region: Option<&'a Region>,
    current: Option<usize>,
    header_size: usize,
}

impl<'a> Blocks<'a> {
    pub(crate) fn new(region: Option<&'a Region>, header_size: usize) -> Self {
        Self {
            region,
            current: region.map(|_| 0),
            header_size,
        }
    }
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let region = self.region?;
        let offset = self.current?;

        let Header { next, in_use } = Header::read(region, offset);
        let end = next.unwrap_or(region.capacity());
        self.current = next;

        Some(BlockInfo {
            offset,
            header: region.address(offset),
            data: region.address(offset + self.header_size),
            in_use,
            size: end - offset - self.header_size,
            next,
        })
    }
}

/// Counts over the block chain at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    pub capacity: usize,
    /// The heap's `available` counter, not the sum of free blocks.
    pub available: usize,
    pub blocks: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    /// Usable size of the biggest free block as the chain is right now,
    /// before any pending merge.
    pub largest_free: usize,
}

impl HeapStats {
    pub(crate) fn collect(heap: &Heap) -> Self {
        heap.blocks().fold(
            Self {
                capacity: heap.capacity(),
                available: heap.available(),
                ..Self::default()
            },
            |mut stats, block| {
                stats.blocks += 1;
                if block.in_use {
                    stats.used_blocks += 1;
                } else {
                    stats.free_blocks += 1;
                    stats.largest_free = stats.largest_free.max(block.size);
                }
                stats
            },
        )
    }
}

/// Report of a heap and all of its blocks, see [`Heap::dump`].
///
/// ```text
/// Size of heap: 4096
/// Size of allocation metadata: 8
/// Available size: 4072
/// Start of heap: 0x7f0c1a2b3000
///     [0x7f0c1a2b3000] {in_use: 1, alloc_size: 16, user_address: 0x7f0c1a2b3008, next: 0x7f0c1a2b3018}
///     [0x7f0c1a2b3018] {in_use: 0, alloc_size: 4064, user_address: 0x7f0c1a2b3020, next: 0x0}
/// Allocated blocks: 2
/// ```
pub struct HeapDump<'a> {
    heap: &'a Heap,
}

impl<'a> HeapDump<'a> {
    pub(crate) fn new(heap: &'a Heap) -> Self {
        Self { heap }
    }
}

impl fmt::Display for HeapDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.heap;

        writeln!(f, "Size of heap: {}", heap.capacity())?;
        writeln!(f, "Size of allocation metadata: {}", heap.header_size())?;
        writeln!(f, "Available size: {}", heap.available())?;

        let Some(base) = heap.base() else {
            return writeln!(f, "Start of heap: (not initialized)");
        };
        writeln!(f, "Start of heap: {base:p}")?;

        let mut count = 0;
        for block in heap.blocks() {
            let next = block.next.map_or(std::ptr::null_mut(), |_| {
                block.data.as_ptr().wrapping_add(block.size)
            });

            writeln!(
                f,
                "\t[{:p}] {{in_use: {}, alloc_size: {}, user_address: {:p}, next: {:p}}}",
                block.header,
                u8::from(block.in_use),
                block.size,
                block.data,
                next,
            )?;
            count += 1;
        }

        writeln!(f, "Allocated blocks: {count}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walker_is_empty_before_first_allocation() {
        let heap = Heap::new();

        assert_eq!(heap.blocks().next(), None);
        assert_eq!(heap.stats(), HeapStats {
            capacity: 4096,
            ..HeapStats::default()
        });
    }

    #[test]
    fn walker_follows_the_chain() {
        let mut heap = Heap::new();
        let a = heap.allocate(10).unwrap();
        let b = heap.allocate(100).unwrap();
        unsafe { heap.free(a.as_ptr()) };

        let blocks: Vec<_> = heap.blocks().collect();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].data, a);
        assert_eq!(blocks[1].data, b);
        assert_eq!(blocks[0].next, Some(blocks[1].offset));
        assert_eq!(blocks[1].next, Some(blocks[2].offset));
        assert_eq!(blocks[2].next, None);
        assert_eq!(
            blocks.iter().map(|block| (block.in_use, block.size)).collect::<Vec<_>>(),
            vec![(false, 16), (true, 104), (false, 4096 - 136 - 8)]
        );
        assert_eq!(blocks[0].header, heap.base().unwrap());
    }

    #[test]
    fn walking_does_not_merge() {
        let mut heap = Heap::new();
        let a = heap.allocate(10).unwrap();
        let b = heap.allocate(10).unwrap();
        heap.allocate(10).unwrap();
        unsafe {
            heap.free(a.as_ptr());
            heap.free(b.as_ptr());
        }

        // `a` was freed first, so `b` was not yet free to be merged into it.
        let before: Vec<_> = heap.blocks().collect();
        let again: Vec<_> = heap.blocks().collect();

        assert_eq!(before, again);
        assert_eq!(before.len(), 4);
        assert!(!before[0].in_use && !before[1].in_use);
    }

    #[test]
    fn stats_summarize_blocks() {
        let mut heap = Heap::new();
        let a = heap.allocate(10).unwrap();
        heap.allocate(10).unwrap();
        unsafe { heap.free(a.as_ptr()) };

        let stats = heap.stats();

        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.used_blocks, 1);
        assert_eq!(stats.free_blocks, 2);
        assert_eq!(stats.largest_free, 4096 - 48 - 8);
        assert_eq!(stats.available, 4096 - 48);
    }

    #[test]
    fn dump_lists_every_block() {
        let mut heap = Heap::new();
        assert!(heap.dump().to_string().contains("not initialized"));

        heap.allocate(10).unwrap();
        let dump = heap.dump().to_string();

        assert!(dump.starts_with("Size of heap: 4096\n"));
        assert!(dump.contains("Size of allocation metadata: 8\n"));
        assert!(dump.contains("Available size: 4072\n"));
        assert!(dump.contains("{in_use: 1, alloc_size: 16,"));
        assert!(dump.contains("{in_use: 0, alloc_size: 4064,"));
        assert!(dump.ends_with("Allocated blocks: 2\n"));
    }
}

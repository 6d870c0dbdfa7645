//! # mymalloc - a first-fit allocator over one fixed region
//!
//! This crate manages a single contiguous region of memory, requested once
//! from the operating system, and serves allocate / free requests from it.
//!
//! ```text
//!   Heap region (4096 bytes by default):
//!
//!   ┌────┬──────────┬────┬──────┬────┬────────────────────────────────────┐
//!   │ H  │  in use  │ H  │ free │ H  │               free                 │
//!   └────┴──────────┴────┴──────┴────┴────────────────────────────────────┘
//!   0    8          32   40     56   64                                4096
//!     │               ▲ │         ▲ │
//!     └───────────────┘ └─────────┘ └──> none
//! ```
//!
//! Every block starts with a header `H` holding the offset of the next block
//! and an in-use flag. Block sizes are never stored: a block ends where the
//! next header starts. Allocation walks the chain and takes the first free
//! block large enough, merging free neighbours on the way and splitting off
//! whatever is left over. Freeing clears the flag and merges the block with
//! the free blocks that follow it.
//!
//! ## Crate Structure
//!
//! ```text
//!   mymalloc
//!   ├── config   - HeapConfig, HEAP_SIZE, ALIGNMENT
//!   ├── error    - HeapError
//!   ├── heap     - Heap: allocate, free, reset
//!   ├── walk     - block walker, dump and stats
//!   ├── global   - per-thread ambient heap (mymalloc, myfree, reset_heap)
//!   ├── block    - header encoding (internal)
//!   ├── region   - the OS region, addressed by offsets (internal)
//!   └── kernel   - mmap / VirtualAlloc (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mymalloc::Heap;
//!
//! let mut heap = Heap::new();
//!
//! let ptr = heap.allocate(10).unwrap();
//! unsafe {
//!     ptr.as_ptr().write_bytes(0xAA, 10);
//!     heap.free(ptr.as_ptr());
//! }
//!
//! heap.reset();
//! assert_eq!(heap.blocks().count(), 1);
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded**: a [`Heap`] is neither `Send` nor `Sync`.
//! - **Fixed size**: the region never grows past its capacity.
//! - **Coarse accounting**: freeing does not give bytes back to the
//!   `available` counter, only [`Heap::reset`] does.
//! - **No validation of freed pointers**: passing [`Heap::free`] anything that
//!   did not come from [`Heap::allocate`] is undefined behaviour.

mod block;
mod config;
mod error;
pub mod global;
mod heap;
mod kernel;
mod region;
mod utils;
mod walk;

pub use config::{ALIGNMENT, HEAP_SIZE, HeapConfig};
pub use error::HeapError;
pub use global::{myfree, mymalloc, reset_heap};
pub use heap::Heap;
pub use utils::align;
pub use walk::{BlockInfo, Blocks, HeapDump, HeapStats};

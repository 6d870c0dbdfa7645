use snafu::Snafu;

/// Errors reported by [`crate::Heap`].
///
/// None of them is fatal: the heap is left exactly as it was before the
/// failing call (apart from free blocks that a scan may already have merged,
/// which doesn't change what can be allocated).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HeapError {
    /// No block can hold the request, or the request is bigger than what the
    /// heap's `available` counter still allows.
    #[snafu(display(
        "out of memory: requested {requested} bytes ({needed} with header), {available} available"
    ))]
    OutOfMemory {
        requested: usize,
        needed: usize,
        available: usize,
    },

    /// The operating system refused to hand out the heap region.
    #[snafu(display("failed to request a {capacity} byte region from the operating system"))]
    RegionUnavailable { capacity: usize },

    #[snafu(display("invalid heap configuration: {reason}"))]
    InvalidConfig { reason: &'static str },
}

impl HeapError {
    #[inline]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

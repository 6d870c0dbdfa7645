//! A heap that is just there, without having to create and pass one around.
//!
//! Every thread gets its own [`Heap`] with the default configuration, created
//! the first time the thread calls into this module and released when the
//! thread exits. Within a thread the heap has a single owner, the functions
//! below borrow it for the duration of one call.

use std::{cell::RefCell, ptr::NonNull};

use crate::{error::HeapError, heap::Heap};

thread_local! {
    static HEAP: RefCell<Heap> = const { RefCell::new(Heap::new()) };
}

/// Runs `f` with this thread's heap.
///
/// # Panics
///
/// If called again from inside `f`.
pub fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> R {
    HEAP.with_borrow_mut(f)
}

/// [`Heap::allocate`] on this thread's heap.
pub fn mymalloc(size: usize) -> Result<NonNull<u8>, HeapError> {
    with_heap(|heap| heap.allocate(size))
}

/// [`Heap::free`] on this thread's heap.
///
/// # Safety
///
/// `ptr` must be null or an address returned by [`mymalloc`] on this same
/// thread that hasn't been freed or invalidated by [`reset_heap`] since.
pub unsafe fn myfree(ptr: *mut u8) {
    with_heap(|heap| unsafe { heap.free(ptr) })
}

/// [`Heap::reset`] on this thread's heap.
pub fn reset_heap() {
    with_heap(Heap::reset)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn ambient_heap_allocates_and_frees() {
        let a = mymalloc(10).unwrap();
        let b = mymalloc(10).unwrap();
        assert_ne!(a, b);

        unsafe {
            myfree(a.as_ptr());
            myfree(b.as_ptr());
            myfree(std::ptr::null_mut());
        }

        assert_eq!(mymalloc(10).unwrap(), a);
        assert_eq!(with_heap(|heap| heap.available()), 4096 - 72);
    }

    #[test]
    fn reset_reclaims_everything() {
        while mymalloc(100).is_ok() {}
        assert!(mymalloc(100).unwrap_err().is_out_of_memory());

        reset_heap();

        let stats = with_heap(|heap| heap.stats());
        assert_eq!(stats.blocks, 1);
        assert_eq!(stats.available, 4096);
        assert!(mymalloc(100).is_ok());
    }

    #[test]
    fn each_thread_has_its_own_heap() {
        let here = mymalloc(10).unwrap().as_ptr() as usize;

        let there = thread::spawn(|| {
            assert!(!with_heap(|heap| heap.is_initialized()));
            mymalloc(10).unwrap().as_ptr() as usize
        })
        .join()
        .unwrap();

        assert_ne!(here, there);
    }
}

//! Platform-dependant memory requests.
//!
//! The heap asks the operating system for memory exactly once, when it is
//! first used, and gives it back when the [`crate::Heap`] is dropped. Nothing
//! above this module knows which syscall does the work.

use std::ptr::NonNull;

/// Zero-sized handle to the operating system's memory API.
pub(crate) struct Kernel;

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. The heap itself has nothing to do with the concrete APIs
/// offered by each kernel.
trait PlatformMemory {
    /// Request a zeroed, read-write region of `len` bytes. Returns `None` if
    /// the underlying syscall fails. The region starts on a page boundary.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the region of size `len` starting at `addr` back to the kernel.
    unsafe fn return_memory(addr: NonNull<u8>, len: usize);

    /// Returns the virtual memory page size of the computer in bytes.
    fn page_size() -> usize;
}

/// Wrapper to use [`PlatformMemory::request_memory`].
///
/// **SAFETY**: the caller owns the returned region and must release it with
/// [`return_memory`] using the same `len`.
#[inline]
pub(crate) unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
    unsafe { <Kernel as PlatformMemory>::request_memory(len) }
}

/// Wrapper to use [`PlatformMemory::return_memory`].
///
/// **SAFETY**: `addr` and `len` must describe a region obtained from
/// [`request_memory`] that is not used afterwards.
#[inline]
pub(crate) unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
    unsafe { <Kernel as PlatformMemory>::return_memory(addr, len) }
}

/// Wrapper to use [`PlatformMemory::page_size`].
#[inline]
pub(crate) fn page_size() -> usize {
    <Kernel as PlatformMemory>::page_size()
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use libc::{mmap, munmap, off_t, size_t};

    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                match mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET) {
                    libc::MAP_FAILED => None,
                    addr => NonNull::new(addr.cast::<u8>()),
                }
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
            let result = unsafe { munmap(addr.as_ptr().cast::<c_void>(), len as size_t) };

            if result != 0 {
                log::warn!("munmap({addr:p}, {len}) failed");
            }
        }

        fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

    use super::{Kernel, PlatformMemory};

    use windows::Win32::System::{Memory, SystemInformation};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            let protection = Memory::PAGE_READWRITE;
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, _len: usize) {
            let result = unsafe {
                Memory::VirtualFree(addr.as_ptr().cast::<c_void>(), 0, Memory::MEM_RELEASE)
            };

            if result.is_err() {
                log::warn!("VirtualFree({addr:p}) failed");
            }
        }

        fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_memory_is_page_aligned_and_writable() {
        let len = 4096;

        unsafe {
            let addr = request_memory(len).expect("region request failed");
            assert_eq!(addr.as_ptr() as usize % page_size(), 0);

            addr.as_ptr().write(0xAB);
            addr.as_ptr().add(len - 1).write(0xCD);
            assert_eq!(*addr.as_ptr(), 0xAB);
            assert_eq!(*addr.as_ptr().add(len - 1), 0xCD);

            return_memory(addr, len);
        }
    }
}

//! Raw native memory
//!
//! Buffers live outside any managed heap and are never reclaimed implicitly.
//! A `Buffer` is a plain address and length; copying it does not copy the
//! memory, and freeing one copy invalidates all of them.

use crate::error::BridgeError;
use crate::value::RawPointer;
use std::ptr::NonNull;
use tracing::debug;

/// Address and byte length of a native allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    address: NonNull<u8>,
    len: usize,
}

// Safety: a buffer is only an address; synchronizing access is the caller's job
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Rebuild a buffer from an address and length
    ///
    /// Returns `None` for a null address.
    ///
    /// # Safety
    ///
    /// `address` must come from `RawMemory` and not have been freed, and `len`
    /// must not exceed the allocation.
    pub unsafe fn from_raw_parts(address: *mut u8, len: usize) -> Option<Buffer> {
        NonNull::new(address).map(|address| Buffer { address, len })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.address.as_ptr()
    }

    pub fn address(&self) -> RawPointer {
        RawPointer::from_ptr(self.address.as_ptr())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the contents
    ///
    /// # Safety
    ///
    /// The buffer must not have been freed, and no one may write to it while
    /// the slice is alive.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        std::slice::from_raw_parts(self.address.as_ptr(), self.len)
    }

    /// Mutable view of the contents
    ///
    /// # Safety
    ///
    /// The buffer must not have been freed, and the slice must be the only
    /// access to it while alive.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        std::slice::from_raw_parts_mut(self.address.as_ptr(), self.len)
    }
}

/// Allocator for native buffers, backed by the C allocator
#[derive(Debug, Default, Clone, Copy)]
pub struct RawMemory;

impl RawMemory {
    pub fn new() -> Self {
        Self
    }

    /// Allocate `size` bytes of uninitialized memory
    ///
    /// A zero size yields a valid, freeable buffer of length 0. Returns
    /// `Ok(None)` when the allocator is exhausted.
    pub fn allocate(&self, size: i64) -> Result<Option<Buffer>, BridgeError> {
        let len = checked_size(size)?;
        let address = unsafe { libc::malloc(len.max(1)) } as *mut u8;

        let buffer = NonNull::new(address).map(|address| Buffer { address, len });
        if buffer.is_none() {
            debug!(size, "native allocation failed");
        }
        Ok(buffer)
    }

    /// Resize `buffer` to `new_size` bytes, preserving the common prefix
    ///
    /// On `Ok(None)` the original buffer is untouched and still valid. On
    /// success the original must no longer be used.
    ///
    /// # Safety
    ///
    /// `buffer` must be live and come from this allocator.
    pub unsafe fn reallocate(
        &self,
        buffer: Buffer,
        new_size: i64,
    ) -> Result<Option<Buffer>, BridgeError> {
        let len = checked_size(new_size)?;
        let address = libc::realloc(buffer.as_ptr().cast(), len.max(1)) as *mut u8;

        let resized = NonNull::new(address).map(|address| Buffer { address, len });
        if resized.is_none() {
            debug!(size = new_size, "native reallocation failed");
        }
        Ok(resized)
    }

    /// Release `buffer`
    ///
    /// # Safety
    ///
    /// `buffer` must be live and come from this allocator. It, and every copy
    /// of it, is dangling afterwards.
    pub unsafe fn free(&self, buffer: Buffer) {
        libc::free(buffer.as_ptr().cast());
    }
}

/// Convert a requested size to the platform's range
fn checked_size(size: i64) -> Result<usize, BridgeError> {
    usize::try_from(size)
        .ok()
        .filter(|len| *len <= isize::MAX as usize)
        .ok_or(BridgeError::SizeOutOfRange { size })
}

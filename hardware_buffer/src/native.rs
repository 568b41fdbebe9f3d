/// Native allocator traits
///
/// Implemented by platform backends (e.g. `AndroidAllocator`) and by the
/// in-memory `MockAllocator`. The core never touches platform handles
/// directly; everything goes through these two traits.

use std::os::fd::OwnedFd;
use std::ptr::NonNull;

use crate::error::NativeStatus;
use crate::format::{BufferUsage, NativeFormat, Rect};

/// Description of a native buffer, used both as the allocation request and
/// as the allocator's report of what it actually allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeBufferDesc {
    pub width: u32,
    pub height: u32,
    /// Number of image layers
    pub layers: u32,
    pub format: NativeFormat,
    pub usage: BufferUsage,
    /// Bytes per row; ignored in requests, filled in by the allocator
    pub stride: u32,
}

/// Native buffer allocator
pub trait NativeAllocator: Send + Sync {
    /// Allocate a native buffer
    ///
    /// Returns None on failure. Allocators do not reliably report why an
    /// allocation failed, so no reason is carried.
    fn allocate(&self, desc: &NativeBufferDesc) -> Option<Box<dyn NativeBuffer>>;
}

/// One native buffer allocation
///
/// The allocation is released when the value is dropped.
pub trait NativeBuffer: Send + Sync {
    /// What the allocator actually allocated (stride may exceed width * bpp)
    fn describe(&self) -> NativeBufferDesc;

    /// Map the buffer for CPU access
    ///
    /// `fence`, when present, must signal before the mapping is usable; the
    /// implementation waits on it (or has the driver wait) and closes it.
    /// `rect` of None means the whole buffer.
    fn lock(
        &self,
        usage: BufferUsage,
        fence: Option<OwnedFd>,
        rect: Option<&Rect>,
    ) -> std::result::Result<NonNull<u8>, NativeStatus>;

    /// Unmap the buffer
    ///
    /// On success returns the fence signaled once the CPU writes are
    /// visible, if the platform produced one.
    fn unlock(&self) -> std::result::Result<Option<OwnedFd>, NativeStatus>;
}

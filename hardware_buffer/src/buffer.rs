/// Hardware buffer - one native graphics buffer shared with the compositor
///
/// A `HardwareBuffer` owns a native allocation plus two fence slots:
/// - the release fence, set by the consumer once it is done reading, waited
///   on by the next `lock`
/// - the acquire fence, captured by `unlock`, handed to the consumer which
///   waits on it before sampling
///
/// Buffers are created through `HardwareBuffer::create` only, which assigns
/// the process-unique id and registers the buffer with the `BufferManager`.

use std::os::fd::OwnedFd;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::{Error, Result};
use crate::format::{BufferUsage, Rect, Size, SurfaceFormat};
use crate::manager::BufferManager;
use crate::native::{NativeAllocator, NativeBuffer, NativeBufferDesc};
use crate::{hwbuf_err, hwbuf_error, hwbuf_trace};

/// Process-unique buffer identifier, never reused
pub type BufferId = u64;

const SOURCE: &str = "hwbuf::Buffer";

fn next_id() -> BufferId {
    static NEXT_ID: AtomicU64 = AtomicU64::new(0);
    NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1
}

#[derive(Default)]
struct Fences {
    acquire: Option<OwnedFd>,
    release: Option<OwnedFd>,
}

pub struct HardwareBuffer {
    id: BufferId,
    size: Size,
    stride: u32,
    format: SurfaceFormat,
    fences: Mutex<Fences>,
    /// Registry this buffer is currently registered with
    registration: Mutex<Option<Weak<BufferManager>>>,
    native: Box<dyn NativeBuffer>,
}

impl HardwareBuffer {
    /// Allocate a buffer and register it with the process-wide registry
    ///
    /// When the registry is not initialized the buffer is still returned,
    /// just unregistered (it cannot be resolved by id).
    ///
    /// # Errors
    ///
    /// `Error::AllocationFailed` for an unsupported format or when the
    /// allocator returns nothing.
    pub fn create(
        allocator: &dyn NativeAllocator,
        size: Size,
        format: SurfaceFormat,
    ) -> Result<Arc<HardwareBuffer>> {
        let buffer = Self::allocate(allocator, size, format)?;
        if let Some(manager) = BufferManager::get() {
            manager.register(&buffer);
        }
        Ok(buffer)
    }

    /// Same as `create`, registering with an explicit registry instead of
    /// the process-wide one
    pub fn create_with_manager(
        allocator: &dyn NativeAllocator,
        size: Size,
        format: SurfaceFormat,
        manager: &Arc<BufferManager>,
    ) -> Result<Arc<HardwareBuffer>> {
        let buffer = Self::allocate(allocator, size, format)?;
        manager.register(&buffer);
        Ok(buffer)
    }

    fn allocate(
        allocator: &dyn NativeAllocator,
        size: Size,
        format: SurfaceFormat,
    ) -> Result<Arc<HardwareBuffer>> {
        let native_format = format.to_native().ok_or_else(|| {
            hwbuf_err!(SOURCE, Error::AllocationFailed(format!("unsupported format {:?}", format)))
        })?;

        let request = NativeBufferDesc {
            width: size.width,
            height: size.height,
            layers: 1,
            format: native_format,
            usage: BufferUsage::ALLOCATION,
            stride: 0,
        };
        let native = allocator.allocate(&request).ok_or_else(|| {
            hwbuf_err!(
                SOURCE,
                Error::AllocationFailed(format!(
                    "native allocation of {}x{} {:?} failed",
                    size.width, size.height, format
                ))
            )
        })?;

        let info = native.describe();
        debug_assert_eq!(info.width, size.width);
        debug_assert_eq!(info.height, size.height);
        debug_assert_eq!(info.format, native_format);

        let buffer = Arc::new(HardwareBuffer {
            id: next_id(),
            size,
            stride: info.stride,
            format,
            fences: Mutex::new(Fences::default()),
            registration: Mutex::new(None),
            native,
        });
        hwbuf_trace!(
            SOURCE,
            "Created buffer {} ({}x{} {:?}, stride {})",
            buffer.id, size.width, size.height, format, buffer.stride
        );
        Ok(buffer)
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// Bytes per row as reported by the allocator
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    /// Size of the CPU mapping returned by `lock` with no region
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.size.height as usize
    }

    /// Platform buffer, for backends that need to hand it to other APIs
    pub fn native_buffer(&self) -> &dyn NativeBuffer {
        self.native.as_ref()
    }

    /// Whether the buffer sits in a registry that is still alive
    pub fn is_registered(&self) -> bool {
        self.lock_registration()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Map the buffer for CPU access
    ///
    /// Consumes the pending release fence and passes it to the native lock,
    /// so this may block until the previous reader is done.
    ///
    /// # Errors
    ///
    /// `Error::NativeStatus` with the native status, unchanged. The lock is
    /// not retried.
    pub fn lock(&self, usage: BufferUsage, rect: Option<&Rect>) -> Result<NonNull<u8>> {
        let fence = self.get_and_reset_release_fence();
        self.native.lock(usage, fence, rect).map_err(Error::NativeStatus)
    }

    /// Unmap the buffer and capture the acquire fence
    ///
    /// A missing fence is not an error: most devices never produce one.
    pub fn unlock(&self) -> Result<()> {
        let fence = self.native.unlock().map_err(Error::NativeStatus)?;
        self.set_acquire_fence(fence);
        Ok(())
    }

    pub fn set_acquire_fence(&self, fence: Option<OwnedFd>) {
        self.lock_fences().acquire = fence;
    }

    pub fn set_release_fence(&self, fence: Option<OwnedFd>) {
        self.lock_fences().release = fence;
    }

    pub fn get_and_reset_acquire_fence(&self) -> Option<OwnedFd> {
        self.lock_fences().acquire.take()
    }

    pub fn get_and_reset_release_fence(&self) -> Option<OwnedFd> {
        self.lock_fences().release.take()
    }

    /// Duplicate of the acquire fence, which stays in place
    ///
    /// Returns None when no fence is set or the handle cannot be duplicated.
    pub fn get_acquire_fence(&self) -> Option<OwnedFd> {
        let fences = self.lock_fences();
        let fence = fences.acquire.as_ref()?;
        match fence.try_clone() {
            Ok(duplicate) => Some(duplicate),
            Err(err) => {
                hwbuf_error!(SOURCE, "Failed to duplicate acquire fence of buffer {}: {}", self.id, err);
                None
            }
        }
    }

    fn lock_fences(&self) -> MutexGuard<'_, Fences> {
        self.fences.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_registration(&self) -> MutexGuard<'_, Option<Weak<BufferManager>>> {
        self.registration.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for HardwareBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Drop for HardwareBuffer {
    fn drop(&mut self) {
        // Leave the registry before `native` is released.
        let manager = self.lock_registration().take();
        if let Some(manager) = manager.and_then(|weak| weak.upgrade()) {
            manager.unregister_id(self.id);
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;

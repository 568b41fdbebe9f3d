/// AndroidAllocator - `NativeAllocator` over the NDK AHardwareBuffer API

use std::os::fd::{FromRawFd, IntoRawFd, OwnedFd};
use std::ptr::{self, NonNull};

use hardware_buffer::hwbuf::{
    BufferUsage, NativeAllocator, NativeBuffer, NativeBufferDesc, NativeFormat, NativeStatus, Rect,
};
use hardware_buffer::{hwbuf_debug, hwbuf_error};

use crate::ffi;

const SOURCE: &str = "hwbuf::android";

/// android::BAD_VALUE
const BAD_VALUE: NativeStatus = -22;

/// Allocator backed by `AHardwareBuffer_allocate`
#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidAllocator;

impl AndroidAllocator {
    pub fn new() -> Self {
        Self
    }
}

impl NativeAllocator for AndroidAllocator {
    fn allocate(&self, desc: &NativeBufferDesc) -> Option<Box<dyn NativeBuffer>> {
        let request = ffi::AHardwareBuffer_Desc {
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            format: desc.format.as_raw(),
            usage: desc.usage.bits(),
            ..Default::default()
        };

        let mut raw: *mut ffi::AHardwareBuffer = ptr::null_mut();
        let status = unsafe { ffi::AHardwareBuffer_allocate(&request, &mut raw) };
        let Some(raw) = NonNull::new(raw) else {
            hwbuf_debug!(SOURCE, "AHardwareBuffer_allocate failed with status {}", status);
            return None;
        };

        // Owned from here on: early returns release the allocation.
        let mut buffer = AndroidNativeBuffer { raw, format: desc.format };
        let info = buffer.raw_describe();
        let Some(format) = NativeFormat::from_raw(info.format) else {
            hwbuf_error!(SOURCE, "Allocator returned unexpected format {:#x}", info.format);
            return None;
        };
        if format != desc.format {
            hwbuf_debug!(SOURCE, "Requested {:?}, allocator picked {:?}", desc.format, format);
        }
        buffer.format = format;
        Some(Box::new(buffer))
    }
}

struct AndroidNativeBuffer {
    raw: NonNull<ffi::AHardwareBuffer>,
    /// Validated at allocation, fixed for the buffer's lifetime
    format: NativeFormat,
}

// AHardwareBuffer objects are internally reference counted and may be used
// from any thread; lock/unlock serialization is the caller's concern.
unsafe impl Send for AndroidNativeBuffer {}
unsafe impl Sync for AndroidNativeBuffer {}

impl AndroidNativeBuffer {
    fn raw_describe(&self) -> ffi::AHardwareBuffer_Desc {
        let mut info = ffi::AHardwareBuffer_Desc::default();
        unsafe { ffi::AHardwareBuffer_describe(self.raw.as_ptr(), &mut info) };
        info
    }
}

impl NativeBuffer for AndroidNativeBuffer {
    fn describe(&self) -> NativeBufferDesc {
        let info = self.raw_describe();
        let format = self.format;
        NativeBufferDesc {
            width: info.width,
            height: info.height,
            layers: info.layers,
            format,
            usage: BufferUsage::from_bits_retain(info.usage),
            // The NDK reports pixels per row
            stride: info.stride * format.bytes_per_pixel(),
        }
    }

    fn lock(
        &self,
        usage: BufferUsage,
        fence: Option<OwnedFd>,
        rect: Option<&Rect>,
    ) -> Result<NonNull<u8>, NativeStatus> {
        let region = rect.map(|r| ffi::ARect {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        });
        let region_ptr = region.as_ref().map_or(ptr::null(), |r| r as *const ffi::ARect);
        let fence_fd = fence.map_or(-1, IntoRawFd::into_raw_fd);

        let mut address: *mut std::ffi::c_void = ptr::null_mut();
        let status = unsafe {
            ffi::AHardwareBuffer_lock(self.raw.as_ptr(), usage.bits(), fence_fd, region_ptr, &mut address)
        };
        if status != 0 {
            return Err(status);
        }
        NonNull::new(address.cast::<u8>()).ok_or(BAD_VALUE)
    }

    fn unlock(&self) -> Result<Option<OwnedFd>, NativeStatus> {
        let mut fence_fd: i32 = -1;
        let status = unsafe { ffi::AHardwareBuffer_unlock(self.raw.as_ptr(), &mut fence_fd) };
        if status != 0 {
            return Err(status);
        }
        if fence_fd < 0 {
            return Ok(None);
        }
        // The unlock fence belongs to the caller.
        Ok(Some(unsafe { OwnedFd::from_raw_fd(fence_fd) }))
    }
}

impl Drop for AndroidNativeBuffer {
    fn drop(&mut self) {
        unsafe { ffi::AHardwareBuffer_release(self.raw.as_ptr()) };
    }
}

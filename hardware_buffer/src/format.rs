/// Pixel formats, usage flags and geometry shared by the core and backends

use bitflags::bitflags;

/// Caller-facing pixel format
///
/// Only the 8-bit RGBA/RGBX variants (both channel orders) and RGB565 can
/// back a hardware buffer; the remaining values exist so that callers can
/// pass whatever their surface uses and get a clean allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum SurfaceFormat {
    R8G8B8A8,
    B8G8R8A8,
    R8G8B8X8,
    B8G8R8X8,
    R5G6B5_UINT16,

    // Not backed by hardware buffers
    A8,
    R16G16B16A16F,
    YUV420,
    NV12,
}

impl SurfaceFormat {
    /// Native format this surface format is allocated with
    ///
    /// Both channel orders of the 8-bit formats share one native format;
    /// swizzling is left to whoever samples the buffer.
    pub fn to_native(&self) -> Option<NativeFormat> {
        match self {
            SurfaceFormat::R8G8B8A8 | SurfaceFormat::B8G8R8A8 => Some(NativeFormat::R8G8B8A8_UNORM),
            SurfaceFormat::R8G8B8X8 | SurfaceFormat::B8G8R8X8 => Some(NativeFormat::R8G8B8X8_UNORM),
            SurfaceFormat::R5G6B5_UINT16 => Some(NativeFormat::R5G6B5_UNORM),
            _ => None,
        }
    }

    /// Whether a hardware buffer can be created with this format
    pub fn is_supported(&self) -> bool {
        self.to_native().is_some()
    }

    /// Bytes per pixel, None for planar/YUV formats
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            SurfaceFormat::R8G8B8A8
            | SurfaceFormat::B8G8R8A8
            | SurfaceFormat::R8G8B8X8
            | SurfaceFormat::B8G8R8X8 => Some(4),
            SurfaceFormat::R5G6B5_UINT16 => Some(2),
            SurfaceFormat::A8 => Some(1),
            SurfaceFormat::R16G16B16A16F => Some(8),
            SurfaceFormat::YUV420 | SurfaceFormat::NV12 => None,
        }
    }
}

/// Allocator-side pixel format (values match `AHARDWAREBUFFER_FORMAT_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
#[repr(u32)]
pub enum NativeFormat {
    R8G8B8A8_UNORM = 1,
    R8G8B8X8_UNORM = 2,
    R5G6B5_UNORM = 4,
}

impl NativeFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(NativeFormat::R8G8B8A8_UNORM),
            2 => Some(NativeFormat::R8G8B8X8_UNORM),
            4 => Some(NativeFormat::R5G6B5_UNORM),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> u32 {
        *self as u32
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            NativeFormat::R8G8B8A8_UNORM | NativeFormat::R8G8B8X8_UNORM => 4,
            NativeFormat::R5G6B5_UNORM => 2,
        }
    }
}

bitflags! {
    /// Buffer usage bits (values match `AHARDWAREBUFFER_USAGE_*`)
    ///
    /// Used both for the allocation request and for `lock`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u64 {
        const CPU_READ_RARELY = 0x2;
        const CPU_READ_OFTEN = 0x3;
        const CPU_WRITE_RARELY = 0x20;
        const CPU_WRITE_OFTEN = 0x30;
        const GPU_SAMPLED_IMAGE = 0x100;
        const GPU_COLOR_OUTPUT = 0x200;
    }
}

impl BufferUsage {
    /// Usage requested for every hardware buffer allocation
    pub const ALLOCATION: BufferUsage = BufferUsage::CPU_READ_OFTEN
        .union(BufferUsage::CPU_WRITE_OFTEN)
        .union(BufferUsage::GPU_SAMPLED_IMAGE)
        .union(BufferUsage::GPU_COLOR_OUTPUT);
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Lock region in pixels, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Whether the region is non-empty and lies inside a buffer of the given size
    pub fn fits_within(&self, size: Size) -> bool {
        !self.is_empty()
            && self.left >= 0
            && self.top >= 0
            && i64::from(self.right) <= i64::from(size.width)
            && i64::from(self.bottom) <= i64::from(size.height)
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;

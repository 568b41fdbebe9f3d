//! Device tests for the Android backend
//!
//! Only built for Android targets; run on a device or emulator (API 26+) with:
//! cargo test -p hardware_buffer_android --target aarch64-linux-android

#![cfg(target_os = "android")]

use hardware_buffer::hwbuf::{BufferManager, BufferUsage, HardwareBuffer, Size, SurfaceFormat};
use hardware_buffer_android::AndroidAllocator;
use serial_test::serial;

#[test]
#[serial]
fn test_android_rgba_lock_unlock() {
    let _ = BufferManager::init();
    let allocator = AndroidAllocator::new();

    let buffer = HardwareBuffer::create(&allocator, Size::new(64, 64), SurfaceFormat::R8G8B8A8).unwrap();
    assert!(buffer.stride() >= 64 * 4);

    let ptr = buffer.lock(BufferUsage::CPU_WRITE_OFTEN, None).unwrap();
    let pixels = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), buffer.byte_len()) };
    pixels[..4].copy_from_slice(&[1, 2, 3, 4]);
    assert!(buffer.unlock().is_ok());

    let id = buffer.id();
    let manager = BufferManager::instance().unwrap();
    assert!(manager.get_buffer(id).is_some());
    drop(buffer);
    assert!(manager.get_buffer(id).is_none());
    BufferManager::shutdown();
}

#[test]
#[serial]
fn test_android_all_supported_formats_allocate() {
    let allocator = AndroidAllocator::new();
    for format in [
        SurfaceFormat::R8G8B8A8,
        SurfaceFormat::B8G8R8A8,
        SurfaceFormat::R8G8B8X8,
        SurfaceFormat::B8G8R8X8,
        SurfaceFormat::R5G6B5_UINT16,
    ] {
        let buffer = HardwareBuffer::create(&allocator, Size::new(32, 16), format).unwrap();
        assert_eq!(buffer.width(), 32);
        assert_eq!(buffer.height(), 16);

        let desc = buffer.native_buffer().describe();
        let native = format.to_native().unwrap();
        assert_eq!(desc.format, native);
        assert_eq!(desc.stride % native.bytes_per_pixel(), 0);
        assert!(desc.stride >= 32 * native.bytes_per_pixel());
    }
}

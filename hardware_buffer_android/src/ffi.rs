//! Declarations for the NDK `AHardwareBuffer` API (`<android/hardware_buffer.h>`, API 26+)

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_int, c_void};

/// Opaque native buffer
#[repr(C)]
pub struct AHardwareBuffer {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct AHardwareBuffer_Desc {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: u32,
    pub usage: u64,
    /// Row stride in pixels
    pub stride: u32,
    pub rfu0: u32,
    pub rfu1: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ARect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[link(name = "android")]
extern "C" {
    pub fn AHardwareBuffer_allocate(
        desc: *const AHardwareBuffer_Desc,
        out_buffer: *mut *mut AHardwareBuffer,
    ) -> c_int;

    pub fn AHardwareBuffer_describe(
        buffer: *const AHardwareBuffer,
        out_desc: *mut AHardwareBuffer_Desc,
    );

    /// Takes ownership of `fence` (closed even on error)
    pub fn AHardwareBuffer_lock(
        buffer: *mut AHardwareBuffer,
        usage: u64,
        fence: i32,
        rect: *const ARect,
        out_virtual_address: *mut *mut c_void,
    ) -> c_int;

    /// `fence` receives a fence owned by the caller, or -1
    pub fn AHardwareBuffer_unlock(buffer: *mut AHardwareBuffer, fence: *mut i32) -> c_int;

    pub fn AHardwareBuffer_release(buffer: *mut AHardwareBuffer);
}

/*!
# Hardware Buffer - Android Backend

Implements the `hardware_buffer` native allocator traits on top of the NDK
`AHardwareBuffer` API (Android 8.0 / API 26 and later).

On other targets this crate is empty.

```no_run
# #[cfg(target_os = "android")]
# fn main() -> hardware_buffer::hwbuf::Result<()> {
use hardware_buffer::hwbuf::{BufferManager, HardwareBuffer, Size, SurfaceFormat};
use hardware_buffer_android::AndroidAllocator;

BufferManager::init()?;
let buffer = HardwareBuffer::create(&AndroidAllocator::new(), Size::new(256, 256), SurfaceFormat::R8G8B8A8)?;
# Ok(())
# }
# #[cfg(not(target_os = "android"))]
# fn main() {}
```
*/

#[cfg(target_os = "android")]
mod ffi;
#[cfg(target_os = "android")]
mod android_allocator;

#[cfg(target_os = "android")]
pub use android_allocator::AndroidAllocator;

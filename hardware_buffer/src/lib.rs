/*!
# Hardware Buffer

Lifecycle management for native graphics buffers shared between a
producer (content/rendering thread) and a compositor.

## Architecture

- **HardwareBuffer**: reference-counted wrapper around one native buffer,
  with lock/unlock for CPU access and acquire/release fence slots
- **BufferManager**: process-wide registry resolving buffer ids received
  over IPC back to live buffers, through weak references
- **NativeAllocator / NativeBuffer**: the platform seam, implemented by
  backend crates (Android) and by the in-memory `MockAllocator`

## Fence protocol

1. Producer: `lock()` waits on the pending release fence, writes pixels,
   `unlock()` captures the acquire fence
2. Producer: sends `id()` and `get_acquire_fence()` to the compositor
3. Compositor: `BufferManager::get_buffer(id)`, waits on the acquire fence,
   samples, then `set_release_fence()` for the next writer
*/

// Internal modules
mod error;
mod manager;
mod buffer;
pub mod log;
pub mod format;
pub mod native;
pub mod mock_allocator;

// Main hwbuf namespace module
pub mod hwbuf {
    // Error types
    pub use crate::error::{Error, Result, NativeStatus};

    // Registry singleton
    pub use crate::manager::BufferManager;

    // Buffer
    pub use crate::buffer::{BufferId, HardwareBuffer};

    // Formats and geometry
    pub use crate::format::{BufferUsage, NativeFormat, Rect, Size, SurfaceFormat};

    // Platform seam
    pub use crate::native::{NativeAllocator, NativeBuffer, NativeBufferDesc};

    // In-memory allocator
    pub use crate::mock_allocator::{mock_fence, MockAllocator, MockAllocatorConfig, MOCK_INVALID_OPERATION};

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }
}

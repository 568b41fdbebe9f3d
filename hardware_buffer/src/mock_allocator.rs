/// Mock native allocator (no GPU required)
///
/// Backs buffers with heap memory so the buffer lifecycle, fence protocol
/// and registry can run on any host. Fences are real file descriptors (one
/// end of a Unix socket pair): they can be duplicated and compared, but
/// they never "signal" and nothing waits on them.

use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::NativeStatus;
use crate::format::{BufferUsage, Rect};
use crate::native::{NativeAllocator, NativeBuffer, NativeBufferDesc};
use crate::{hwbuf_debug, hwbuf_warn};

const SOURCE: &str = "hwbuf::mock";

/// Status returned for invalid lock/unlock sequences (-EINVAL)
pub const MOCK_INVALID_OPERATION: NativeStatus = -22;

/// Create a standalone fence handle
pub fn mock_fence() -> io::Result<OwnedFd> {
    let (ours, _theirs) = UnixStream::pair()?;
    Ok(OwnedFd::from(ours))
}

/// Behavior knobs for `MockAllocator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAllocatorConfig {
    /// Row pitch alignment in bytes
    pub row_alignment: u32,
    /// Return a fence from unlock (real devices mostly do not)
    pub produce_unlock_fence: bool,
    /// Make every allocation fail
    pub fail_allocations: bool,
    /// Status forced on lock (0 = normal behavior)
    pub lock_status: NativeStatus,
    /// Status forced on unlock (0 = normal behavior)
    pub unlock_status: NativeStatus,
}

impl Default for MockAllocatorConfig {
    fn default() -> Self {
        Self {
            row_alignment: 64,
            produce_unlock_fence: false,
            fail_allocations: false,
            lock_status: 0,
            unlock_status: 0,
        }
    }
}

#[derive(Debug, Default)]
struct MockCounters {
    total_allocations: AtomicUsize,
    live_allocations: AtomicUsize,
    fenced_locks: AtomicUsize,
}

/// In-memory `NativeAllocator`
///
/// The configuration is read at allocation time and shared with every
/// buffer allocated afterwards, so tests can flip lock/unlock behavior on
/// live buffers with `set_config`.
pub struct MockAllocator {
    config: Arc<Mutex<MockAllocatorConfig>>,
    counters: Arc<MockCounters>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self::with_config(MockAllocatorConfig::default())
    }

    pub fn with_config(config: MockAllocatorConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            counters: Arc::new(MockCounters::default()),
        }
    }

    pub fn config(&self) -> MockAllocatorConfig {
        self.config.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_config(&self, config: MockAllocatorConfig) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Successful allocations so far
    pub fn total_allocations(&self) -> usize {
        self.counters.total_allocations.load(Ordering::SeqCst)
    }

    /// Allocations not yet released
    pub fn live_allocations(&self) -> usize {
        self.counters.live_allocations.load(Ordering::SeqCst)
    }

    /// Number of lock calls that received a release fence
    pub fn fenced_locks(&self) -> usize {
        self.counters.fenced_locks.load(Ordering::SeqCst)
    }
}

impl Default for MockAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeAllocator for MockAllocator {
    fn allocate(&self, desc: &NativeBufferDesc) -> Option<Box<dyn NativeBuffer>> {
        let config = self.config();
        if config.fail_allocations || desc.width == 0 || desc.height == 0 || desc.layers != 1 {
            hwbuf_debug!(SOURCE, "Refusing allocation {}x{} (layers {})", desc.width, desc.height, desc.layers);
            return None;
        }

        let alignment = config.row_alignment.max(1);
        let row_bytes = desc.width.checked_mul(desc.format.bytes_per_pixel())?;
        let stride = row_bytes.checked_next_multiple_of(alignment)?;
        let len = (stride as usize).checked_mul(desc.height as usize)?;

        self.counters.total_allocations.fetch_add(1, Ordering::SeqCst);
        self.counters.live_allocations.fetch_add(1, Ordering::SeqCst);

        Some(Box::new(MockNativeBuffer {
            desc: NativeBufferDesc { stride, ..*desc },
            storage: Mutex::new(vec![0u8; len]),
            locked: AtomicBool::new(false),
            config: Arc::clone(&self.config),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct MockNativeBuffer {
    desc: NativeBufferDesc,
    /// Never resized after allocation, so its data pointer is stable
    storage: Mutex<Vec<u8>>,
    locked: AtomicBool,
    config: Arc<Mutex<MockAllocatorConfig>>,
    counters: Arc<MockCounters>,
}

impl MockNativeBuffer {
    fn config(&self) -> MockAllocatorConfig {
        self.config.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl NativeBuffer for MockNativeBuffer {
    fn describe(&self) -> NativeBufferDesc {
        self.desc
    }

    fn lock(
        &self,
        _usage: BufferUsage,
        fence: Option<OwnedFd>,
        rect: Option<&Rect>,
    ) -> std::result::Result<NonNull<u8>, NativeStatus> {
        if fence.is_some() {
            self.counters.fenced_locks.fetch_add(1, Ordering::SeqCst);
        }
        // The fence is closed here, as a driver would after waiting on it.
        drop(fence);

        let config = self.config();
        if config.lock_status != 0 {
            return Err(config.lock_status);
        }

        let offset = match rect {
            None => 0,
            Some(rect) => {
                let bounds = crate::format::Size::new(self.desc.width, self.desc.height);
                if !rect.fits_within(bounds) {
                    return Err(MOCK_INVALID_OPERATION);
                }
                rect.top as usize * self.desc.stride as usize
                    + rect.left as usize * self.desc.format.bytes_per_pixel() as usize
            }
        };

        if self.locked.swap(true, Ordering::SeqCst) {
            hwbuf_warn!(SOURCE, "Lock of an already locked buffer");
            return Err(MOCK_INVALID_OPERATION);
        }

        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        // `offset` is inside the allocation: `rect` fits the buffer bounds.
        let ptr = storage.as_mut_ptr().wrapping_add(offset);
        NonNull::new(ptr).ok_or(MOCK_INVALID_OPERATION)
    }

    fn unlock(&self) -> std::result::Result<Option<OwnedFd>, NativeStatus> {
        let config = self.config();
        if config.unlock_status != 0 {
            return Err(config.unlock_status);
        }
        if !self.locked.swap(false, Ordering::SeqCst) {
            return Err(MOCK_INVALID_OPERATION);
        }
        if config.produce_unlock_fence {
            // A fence that cannot be created is reported as "no fence".
            Ok(mock_fence().ok())
        } else {
            Ok(None)
        }
    }
}

impl Drop for MockNativeBuffer {
    fn drop(&mut self) {
        self.counters.live_allocations.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "mock_allocator_tests.rs"]
mod tests;

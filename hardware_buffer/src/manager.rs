/// Buffer manager - process-wide registry of live hardware buffers
///
/// The compositor side only receives buffer ids over IPC. The manager maps
/// those ids back to the `HardwareBuffer` objects through weak references,
/// so it never keeps a buffer alive: once the producer drops its last
/// reference, `get_buffer` reports the id as unknown.
///
/// The process-wide instance exists between `BufferManager::init()` and
/// `BufferManager::shutdown()`. The manager also owns the global logger used
/// by the `hwbuf_*!` macros.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};
use std::time::SystemTime;

use rustc_hash::FxHashMap;

use crate::buffer::{BufferId, HardwareBuffer};
use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::{hwbuf_err, hwbuf_error, hwbuf_info, hwbuf_warn};

// ===== INTERNAL STATE =====

const SOURCE: &str = "hwbuf::Manager";

/// Process-wide manager, Some between init() and shutdown()
static INSTANCE: RwLock<Option<Arc<BufferManager>>> = RwLock::new(None);

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Registry bookkeeping bug: loud in debug builds, logged in release builds
fn report_anomaly(message: String) {
    hwbuf_error!(SOURCE, "{}", message);
    debug_assert!(false, "{}", message);
}

// ===== PUBLIC API =====

/// Registry of live hardware buffers, keyed by buffer id
///
/// # Example
///
/// ```no_run
/// use hardware_buffer::hwbuf::{BufferManager, HardwareBuffer, MockAllocator, Size, SurfaceFormat};
///
/// BufferManager::init()?;
///
/// let allocator = MockAllocator::new();
/// let buffer = HardwareBuffer::create(&allocator, Size::new(64, 64), SurfaceFormat::R8G8B8A8)?;
///
/// // Compositor side, after receiving buffer.id() over IPC
/// let resolved = BufferManager::instance()?.get_buffer(buffer.id());
/// assert!(resolved.is_some());
///
/// BufferManager::shutdown();
/// # Ok::<(), hardware_buffer::hwbuf::Error>(())
/// ```
pub struct BufferManager {
    buffers: Mutex<FxHashMap<BufferId, Weak<HardwareBuffer>>>,
}

impl BufferManager {
    /// Create a standalone registry
    ///
    /// Most code uses the process-wide instance; a standalone registry is
    /// handed to `HardwareBuffer::create_with_manager` explicitly.
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(FxHashMap::default()),
        }
    }

    // ===== PROCESS-WIDE INSTANCE =====

    /// Create the process-wide registry
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if the registry is already initialized.
    pub fn init() -> Result<()> {
        let mut instance = INSTANCE.write().unwrap_or_else(PoisonError::into_inner);
        if instance.is_some() {
            return Err(hwbuf_err!(
                SOURCE,
                Error::InitializationFailed(
                    "BufferManager already initialized. Call BufferManager::shutdown() first.".to_string()
                )
            ));
        }
        *instance = Some(Arc::new(BufferManager::new()));
        hwbuf_info!(SOURCE, "BufferManager initialized");
        Ok(())
    }

    /// Destroy the process-wide registry
    ///
    /// Buffers still registered with it stay valid; dropping them later no
    /// longer touches any registry.
    pub fn shutdown() {
        let previous = INSTANCE.write().unwrap_or_else(PoisonError::into_inner).take();
        match previous {
            Some(manager) => {
                let live = manager.live_count();
                if live > 0 {
                    hwbuf_warn!(SOURCE, "BufferManager shut down with {} live buffers", live);
                }
                hwbuf_info!(SOURCE, "BufferManager shut down");
            }
            None => {
                hwbuf_warn!(SOURCE, "BufferManager::shutdown() called without init()");
            }
        }
    }

    /// Process-wide registry, None outside the init/shutdown window
    pub fn get() -> Option<Arc<BufferManager>> {
        INSTANCE.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Process-wide registry
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` outside the init/shutdown window.
    pub fn instance() -> Result<Arc<BufferManager>> {
        Self::get().ok_or_else(|| {
            hwbuf_err!(
                SOURCE,
                Error::InitializationFailed(
                    "BufferManager not initialized. Call BufferManager::init() first.".to_string()
                )
            )
        })
    }

    #[cfg(test)]
    pub(crate) fn reset_for_testing() {
        INSTANCE.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    // ===== REGISTRY =====

    /// Track `buffer` under its id and mark it registered
    ///
    /// Registering a buffer twice, or an id that is still live, is a caller
    /// bug: it is reported and the registry is left unchanged.
    pub fn register(self: &Arc<Self>, buffer: &Arc<HardwareBuffer>) {
        let anomaly = {
            let mut buffers = self.lock_buffers();
            let mut registration = buffer.lock_registration();

            // A registration into a registry that was shut down no longer counts
            if registration.as_ref().is_some_and(|weak| weak.strong_count() > 0) {
                Some(format!("HardwareBuffer {} is already registered", buffer.id()))
            } else if buffers.get(&buffer.id()).is_some_and(|weak| weak.strong_count() > 0) {
                Some(format!("HardwareBuffer id {} registered twice", buffer.id()))
            } else {
                *registration = Some(Arc::downgrade(self));
                buffers.insert(buffer.id(), Arc::downgrade(buffer));
                None
            }
        };

        if let Some(message) = anomaly {
            report_anomaly(message);
        }
    }

    /// Forget `buffer` and clear its registered mark
    ///
    /// Returns false (after reporting the mismatch) if the id is unknown.
    pub fn unregister(&self, buffer: &HardwareBuffer) -> bool {
        let removed = self.unregister_id(buffer.id());

        let mut registration = buffer.lock_registration();
        let registered_here = registration
            .as_ref()
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), self));
        if registered_here {
            *registration = None;
        }
        removed
    }

    pub(crate) fn unregister_id(&self, id: BufferId) -> bool {
        let removed = self.lock_buffers().remove(&id).is_some();
        if !removed {
            report_anomaly(format!("HardwareBuffer id mismatch happened (id {})", id));
        }
        removed
    }

    /// Resolve an id to a live buffer
    ///
    /// None if the id was never registered, was unregistered, or its buffer
    /// has already been destroyed.
    pub fn get_buffer(&self, id: BufferId) -> Option<Arc<HardwareBuffer>> {
        self.lock_buffers().get(&id)?.upgrade()
    }

    /// Number of registry entries
    pub fn len(&self) -> usize {
        self.lock_buffers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_buffers().is_empty()
    }

    /// Number of entries whose buffer is still alive
    pub fn live_count(&self) -> usize {
        self.lock_buffers()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn lock_buffers(&self) -> MutexGuard<'_, FxHashMap<BufferId, Weak<HardwareBuffer>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== LOGGING API =====

    /// Replace the global logger
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hardware_buffer::hwbuf::{BufferManager, log::{Logger, LogEntry}};
    ///
    /// struct QuietLogger;
    /// impl Logger for QuietLogger {
    ///     fn log(&self, _entry: &LogEntry) {}
    /// }
    ///
    /// BufferManager::set_logger(QuietLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())));
        *logger_lock.write().unwrap_or_else(PoisonError::into_inner) = Box::new(logger);
    }

    /// Reset the global logger to `DefaultLogger`
    pub fn reset_logger() {
        Self::set_logger(DefaultLogger::default());
    }

    /// Log without file:line (used by `hwbuf_trace!` .. `hwbuf_warn!`)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Log with file:line (used by `hwbuf_error!`)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }

    fn dispatch(entry: LogEntry) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())));
        logger_lock.read().unwrap_or_else(PoisonError::into_inner).log(&entry);
    }
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

//! Unit tests for the BufferManager registry
//!
//! Registry behavior is tested on standalone managers. Tests touching the
//! process-wide instance or the global logger are marked #[serial].

use super::*;
use crate::format::{Size, SurfaceFormat};
use crate::mock_allocator::MockAllocator;
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Logger capturing messages for verification
struct CaptureLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String)>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push((entry.severity, entry.message.clone()));
    }
}

fn capture_logs() -> Arc<Mutex<Vec<(LogSeverity, String)>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    BufferManager::set_logger(CaptureLogger { entries: Arc::clone(&entries) });
    entries
}

fn new_buffer(allocator: &MockAllocator, manager: &Arc<BufferManager>) -> Arc<HardwareBuffer> {
    HardwareBuffer::create_with_manager(allocator, Size::new(64, 64), SurfaceFormat::R8G8B8A8, manager).unwrap()
}

// ============================================================================
// INIT / SHUTDOWN TESTS
// ============================================================================

#[test]
#[serial]
fn test_init_and_shutdown() {
    BufferManager::reset_for_testing();
    assert!(BufferManager::get().is_none());

    BufferManager::init().unwrap();
    assert!(BufferManager::get().is_some());
    assert!(BufferManager::instance().is_ok());

    BufferManager::shutdown();
    assert!(BufferManager::get().is_none());
}

#[test]
#[serial]
fn test_init_twice_fails() {
    BufferManager::reset_for_testing();
    BufferManager::init().unwrap();

    let result = BufferManager::init();
    assert!(matches!(result, Err(Error::InitializationFailed(_))));

    BufferManager::shutdown();
}

#[test]
#[serial]
fn test_instance_outside_window_fails() {
    BufferManager::reset_for_testing();
    assert!(matches!(BufferManager::instance(), Err(Error::InitializationFailed(_))));

    BufferManager::init().unwrap();
    BufferManager::shutdown();
    assert!(matches!(BufferManager::instance(), Err(Error::InitializationFailed(_))));
}

#[test]
#[serial]
fn test_reinit_after_shutdown_gives_fresh_registry() {
    BufferManager::reset_for_testing();
    let allocator = MockAllocator::new();

    BufferManager::init().unwrap();
    let buffer = HardwareBuffer::create(&allocator, Size::new(4, 4), SurfaceFormat::R8G8B8A8).unwrap();
    BufferManager::shutdown();

    BufferManager::init().unwrap();
    let manager = BufferManager::instance().unwrap();
    assert!(manager.get_buffer(buffer.id()).is_none());

    // Buffer registered with the old registry drops without touching the new one
    drop(buffer);
    assert!(manager.is_empty());
    BufferManager::shutdown();
}

#[test]
#[serial]
fn test_register_buffer_from_previous_registry() {
    BufferManager::reset_for_testing();
    let allocator = MockAllocator::new();

    BufferManager::init().unwrap();
    let buffer = HardwareBuffer::create(&allocator, Size::new(4, 4), SurfaceFormat::R8G8B8A8).unwrap();
    BufferManager::shutdown();
    assert!(!buffer.is_registered());

    BufferManager::init().unwrap();
    let manager = BufferManager::instance().unwrap();
    manager.register(&buffer);
    assert!(buffer.is_registered());
    assert!(manager.get_buffer(buffer.id()).is_some());

    drop(buffer);
    assert!(manager.is_empty());
    BufferManager::shutdown();
}

#[test]
#[serial]
fn test_shutdown_without_init_warns() {
    BufferManager::reset_for_testing();
    let entries = capture_logs();

    BufferManager::shutdown();

    let entries = entries.lock().unwrap().clone();
    BufferManager::reset_logger();
    assert!(entries.iter().any(|(severity, _)| *severity == LogSeverity::Warn));
}

// ============================================================================
// REGISTRY TESTS
// ============================================================================

#[test]
fn test_get_buffer_resolves_live_buffer() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);

    let resolved = manager.get_buffer(buffer.id()).unwrap();
    assert_eq!(resolved.id(), buffer.id());
    assert!(Arc::ptr_eq(&resolved, &buffer));
}

#[test]
fn test_get_buffer_unknown_id() {
    let manager = BufferManager::new();
    assert!(manager.get_buffer(u64::MAX).is_none());
}

#[test]
fn test_registry_does_not_extend_lifetime() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);
    let id = buffer.id();

    assert_eq!(Arc::strong_count(&buffer), 1);
    drop(buffer);

    assert!(manager.get_buffer(id).is_none());
    assert_eq!(allocator.live_allocations(), 0);
}

#[test]
fn test_expired_entry_is_not_resolvable() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);
    let id = buffer.id();

    // Simulate a missed unregistration: an expired weak reference left behind
    let stale = Arc::downgrade(&buffer);
    assert!(manager.unregister(&buffer));
    manager.lock_buffers().insert(id, stale);
    drop(buffer);

    assert_eq!(manager.len(), 1);
    assert_eq!(manager.live_count(), 0);
    assert!(manager.get_buffer(id).is_none());
}

#[test]
fn test_unregister_removes_entry() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);

    assert!(manager.unregister(&buffer));
    assert!(manager.get_buffer(buffer.id()).is_none());
    assert!(!buffer.is_registered());
    assert!(manager.is_empty());
}

#[test]
fn test_register_again_after_unregister() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);

    manager.unregister(&buffer);
    manager.register(&buffer);
    assert!(buffer.is_registered());
    assert!(manager.get_buffer(buffer.id()).is_some());
}

#[test]
fn test_len_and_live_count() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    assert!(manager.is_empty());

    let a = new_buffer(&allocator, &manager);
    let b = new_buffer(&allocator, &manager);
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.live_count(), 2);

    drop(a);
    assert_eq!(manager.len(), 1);
    drop(b);
    assert!(manager.is_empty());
}

#[test]
fn test_concurrent_lookup_while_dropping() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffers: Vec<_> = (0..64).map(|_| new_buffer(&allocator, &manager)).collect();
    let ids: Vec<_> = buffers.iter().map(|b| b.id()).collect();

    let lookup = {
        let manager = Arc::clone(&manager);
        std::thread::spawn(move || {
            for _ in 0..100 {
                for id in &ids {
                    if let Some(buffer) = manager.get_buffer(*id) {
                        assert_eq!(buffer.id(), *id);
                    }
                }
            }
        })
    };
    drop(buffers);
    lookup.join().unwrap();

    assert!(manager.is_empty());
    assert_eq!(allocator.live_allocations(), 0);
}

// ============================================================================
// ANOMALY TESTS
// ============================================================================

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "id mismatch")]
fn test_double_unregister_asserts_in_debug() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);

    manager.unregister(&buffer);
    manager.unregister(&buffer);
}

#[test]
#[cfg(not(debug_assertions))]
fn test_double_unregister_reports_false_in_release() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);

    assert!(manager.unregister(&buffer));
    assert!(!manager.unregister(&buffer));
    assert!(manager.is_empty());
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "already registered")]
fn test_register_twice_asserts_in_debug() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);

    manager.register(&buffer);
}

#[test]
#[cfg(not(debug_assertions))]
fn test_register_twice_leaves_registry_unchanged_in_release() {
    let allocator = MockAllocator::new();
    let manager = Arc::new(BufferManager::new());
    let buffer = new_buffer(&allocator, &manager);

    manager.register(&buffer);
    assert_eq!(manager.len(), 1);
    assert!(manager.get_buffer(buffer.id()).is_some());
}

// ============================================================================
// LOGGING API TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_captures_macros() {
    let entries = capture_logs();

    crate::hwbuf_info!("hwbuf::test", "info {}", 1);
    crate::hwbuf_error!("hwbuf::test", "error {}", 2);

    let captured = entries.lock().unwrap().clone();
    BufferManager::reset_logger();

    assert!(captured.contains(&(LogSeverity::Info, "info 1".to_string())));
    assert!(captured.contains(&(LogSeverity::Error, "error 2".to_string())));
}

#[test]
#[serial]
fn test_init_twice_is_logged_as_error() {
    BufferManager::reset_for_testing();
    BufferManager::init().unwrap();
    let entries = capture_logs();

    let _ = BufferManager::init();

    let captured = entries.lock().unwrap().clone();
    BufferManager::reset_logger();
    BufferManager::shutdown();

    assert!(captured
        .iter()
        .any(|(severity, message)| *severity == LogSeverity::Error && message.contains("already initialized")));
}

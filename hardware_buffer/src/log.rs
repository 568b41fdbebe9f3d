//! Internal logging system for the hardware buffer core
//!
//! This module provides:
//! - A replaceable logger via the `Logger` trait (see `BufferManager::set_logger`)
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - File and line information for ERROR logs

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// Implement this trait to forward buffer lifecycle diagnostics somewhere
/// else (crash reporter annotations, a file, a test capture buffer...).
///
/// # Example
///
/// ```no_run
/// use hardware_buffer::hwbuf::log::{Logger, LogEntry};
///
/// struct CrashNoteLogger;
///
/// impl Logger for CrashNoteLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Append entry.message to the crash annotations...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "hwbuf::Manager", "hwbuf::android")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-buffer chatter
    Trace,

    /// Development information
    Debug,

    /// Lifecycle events (registry init/shutdown)
    Info,

    /// Suspicious but recoverable situations
    Warn,

    /// Bookkeeping bugs and native failures
    Error,
}

impl LogSeverity {
    /// Fixed-width label used by `DefaultLogger`
    pub fn label(&self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
///
/// Entries below `min_severity` (Info unless configured) are dropped.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLogger {
    min_severity: LogSeverity,
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self { min_severity: LogSeverity::Info }
    }
}

impl DefaultLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger printing everything at or above `min_severity`
    pub fn with_min_severity(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }

    /// Whether an entry of this severity would be printed
    pub fn enabled(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity
    }

    /// Render an entry as a single console line
    pub fn format_entry(entry: &LogEntry) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let label = entry.severity.label();
        let severity = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };
        let source = entry.source.bright_blue();

        match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity, source, entry.message, file, line
            ),
            _ => format!("[{}] [{}] [{}] {}", timestamp, severity, source, entry.message),
        }
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if !self.enabled(entry.severity) {
            return;
        }
        let line = Self::format_entry(entry);
        if entry.severity >= LogSeverity::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
#[macro_export]
macro_rules! hwbuf_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::hwbuf::BufferManager::log(
            $crate::hwbuf::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! hwbuf_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::hwbuf::BufferManager::log(
            $crate::hwbuf::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
///
/// # Example
///
/// ```no_run
/// hardware_buffer::hwbuf_info!("hwbuf::Manager", "Registry initialized");
/// ```
#[macro_export]
macro_rules! hwbuf_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::hwbuf::BufferManager::log(
            $crate::hwbuf::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! hwbuf_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::hwbuf::BufferManager::log(
            $crate::hwbuf::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// hardware_buffer::hwbuf_error!("hwbuf::Manager", "id {} mismatch", 42);
/// ```
#[macro_export]
macro_rules! hwbuf_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::hwbuf::BufferManager::log_detailed(
            $crate::hwbuf::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and evaluate to the given `Error`
///
/// ```no_run
/// use hardware_buffer::hwbuf::Error;
///
/// fn fail() -> hardware_buffer::hwbuf::Result<()> {
///     Err(hardware_buffer::hwbuf_err!(
///         "hwbuf::Buffer",
///         Error::AllocationFailed("no memory".to_string())
///     ))
/// }
/// ```
#[macro_export]
macro_rules! hwbuf_err {
    ($source:expr, $error:expr) => {{
        let error = $error;
        $crate::hwbuf_error!($source, "{}", error);
        error
    }};
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;

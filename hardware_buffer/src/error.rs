//! Error types for the hardware buffer core
//!
//! Allocation and native lock/unlock failures are reported through these
//! values. Registry bookkeeping bugs are not: they are logged and asserted
//! in debug builds (see `manager.rs`).

use std::fmt;

/// Result type for hardware buffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Raw status code reported by the native buffer API (0 is success)
pub type NativeStatus = i32;

/// Hardware buffer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No buffer was produced (unsupported format or native allocation failure)
    AllocationFailed(String),

    /// Native lock/unlock reported a non-zero status, passed through verbatim
    NativeStatus(NativeStatus),

    /// Registry used outside its init/shutdown window, or initialized twice
    InitializationFailed(String),
}

impl Error {
    /// Native status code carried by this error, if any
    pub fn native_status(&self) -> Option<NativeStatus> {
        match self {
            Error::NativeStatus(status) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailed(msg) => write!(f, "Allocation failed: {}", msg),
            Error::NativeStatus(status) => write!(f, "Native call failed with status {}", status),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

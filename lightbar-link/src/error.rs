//! Link error types

use thiserror::Error;

/// Errors that can occur while driving the LED strip
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Bus not available: {0}")]
    BusUnavailable(String),

    #[error("Bus permission denied: {0}")]
    PermissionDenied(String),

    #[error("Bus write failed: {0}")]
    Bus(String),

    #[error("Bus timeout")]
    Timeout,

    #[error("Invalid LED index: {0}")]
    InvalidIndex(usize),

    #[error("Link closed")]
    Closed,

    #[error("Write failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl LinkError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Shared-bus contention shows up as `Bus`/`Timeout`; everything else is
    /// a programming or setup error and will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, LinkError::Bus(_) | LinkError::Timeout)
    }
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => LinkError::PermissionDenied(e.to_string()),
            std::io::ErrorKind::NotFound => LinkError::BusUnavailable(e.to_string()),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => LinkError::Timeout,
            _ => LinkError::Bus(e.to_string()),
        }
    }
}

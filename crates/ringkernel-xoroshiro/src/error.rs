//! Error types for state creation and device transfers.
//!
//! Generator advance, jumps and the distribution transforms are total over
//! valid states and never produce an error. Everything here originates at
//! initialization or transfer time.

use thiserror::Error;

/// Errors raised while creating or transferring generator states.
#[derive(Debug, Error)]
pub enum RngError {
    /// Invalid configuration (zero count, bad device settings, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The execution queue is closed or belongs to another device.
    #[error("Invalid queue: {0}")]
    InvalidQueue(String),

    /// Device memory exhausted.
    #[error("Out of device memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory {
        /// Requested size in bytes.
        requested: usize,
        /// Available size in bytes.
        available: usize,
    },

    /// Host-side allocation failed.
    #[error("Host allocation failed: {size} bytes")]
    HostAllocationFailed {
        /// Requested size in bytes.
        size: usize,
    },

    /// Host/device copy failed.
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Backend-specific failure.
    #[error("Backend error: {0}")]
    BackendError(String),
}

impl RngError {
    /// Whether the caller may reasonably retry the operation later.
    ///
    /// Only resource exhaustion qualifies; configuration errors fail the same
    /// way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RngError::OutOfMemory { .. } | RngError::HostAllocationFailed { .. }
        )
    }
}

/// Result type for state creation and transfers.
pub type Result<T> = std::result::Result<T, RngError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RngError::OutOfMemory {
            requested: 1024,
            available: 512,
        };
        assert_eq!(
            err.to_string(),
            "Out of device memory: requested 1024 bytes, available 512 bytes"
        );

        let err = RngError::InvalidConfig("count must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: count must be positive");
    }

    #[test]
    fn test_retryable() {
        assert!(RngError::OutOfMemory {
            requested: 1,
            available: 0
        }
        .is_retryable());
        assert!(RngError::HostAllocationFailed { size: 16 }.is_retryable());
        assert!(!RngError::InvalidConfig("x".into()).is_retryable());
        assert!(!RngError::InvalidQueue("closed".into()).is_retryable());
    }
}

//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                         │
//! │  ├── CoreError        - Parsing/domain errors                          │
//! │  └── ValidationError  - Operation rejected before it is queued         │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                      │
//! │  └── StoreError       - Local persistence failures                     │
//! │                                                                         │
//! │  depot-sync errors (separate crate)                                    │
//! │  ├── TransportError   - No usable response from the remote service     │
//! │  └── SyncError        - Config, refresh and orchestration failures     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// HTTP method string is not one the queue understands.
    #[error("Unknown HTTP method: '{0}'. Valid options: GET, POST, PUT, DELETE")]
    UnknownMethod(String),

    /// Log level string is not one of info/success/error.
    #[error("Unknown log level: '{0}'")]
    UnknownLogLevel(String),

    /// Operation failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised when a caller tries to queue an operation that could never be
/// replayed successfully.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., invalid UUID, relative URL without leading slash).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not allowed in this combination.
    #[error("{field} is not allowed: {reason}")]
    NotAllowed { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "targetUrl".to_string(),
        };
        assert_eq!(err.to_string(), "targetUrl is required");

        let err = ValidationError::TooLong {
            field: "targetUrl".to_string(),
            max: 2048,
        };
        assert_eq!(err.to_string(), "targetUrl must be at most 2048 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "targetUrl".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}

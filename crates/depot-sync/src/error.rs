//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  TransportError │  │   FetchError    │  │     RefreshError        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Unreachable    │  │  Transport      │  │  Fetch                  │ │
//! │  │  Timeout        │  │  Status         │  │  MissingField           │ │
//! │  │  Malformed      │  │  Parse          │  │  Parse / Store          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │   entry stays queued                         mirrors left untouched     │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │  SyncError: configuration, store, validation, refresh, lifecycle   │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A server rejection is not an error here: it is a
//! [`RemoteReply::Rejected`](crate::remote::RemoteReply) and ends in quarantine.

use thiserror::Error;

use depot_core::ValidationError;
use depot_db::StoreError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Transport Error
// =============================================================================

/// No usable response was obtained for a queued operation.
///
/// Always recoverable: the entry stays in the queue for a later cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure, dropped connection.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// No response within the per-call timeout.
    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// A failure response whose body could not be read as JSON.
    #[error("malformed response (HTTP {status}): {reason}")]
    MalformedResponse { status: u16, reason: String },
}

// =============================================================================
// Fetch Error
// =============================================================================

/// A bulk refresh `GET` failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Server answered with a non-2xx status.
    #[error("server returned HTTP {status}")]
    Status { status: u16 },

    /// Body was not valid JSON.
    #[error("response is not valid JSON: {0}")]
    Parse(String),
}

// =============================================================================
// Refresh Error
// =============================================================================

/// Bulk refresh failed; the local mirrors were not modified.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("failed to fetch {collection}: {source}")]
    Fetch {
        collection: &'static str,
        #[source]
        source: FetchError,
    },

    /// Response body lacks the `{ "<collection>": [...] }` array.
    #[error("response for {collection} has no '{collection}' array")]
    MissingField { collection: &'static str },

    #[error("failed to parse {collection}: {reason}")]
    Parse {
        collection: &'static str,
        reason: String,
    },

    #[error("failed to store mirrors: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering configuration, lifecycle and I/O failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid server URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// Local Store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Operation refused before queuing.
    #[error("Invalid operation: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    #[error("Refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal sync error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if trying again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Refresh(RefreshError::Fetch { source, .. }) => {
                matches!(source, FetchError::Transport(_))
                    || matches!(source, FetchError::Status { status } if *status >= 500)
            }
            SyncError::Store(StoreError::PoolExhausted) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

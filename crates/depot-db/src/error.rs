//! # Store Error Types
//!
//! Error types for Local Store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / serde_json::Error                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ├──► SyncEngine: traced, cycle continues with next entry          │
//! │       │                                                                 │
//! │       └──► SyncError::Store (enqueue, refresh, agent startup)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::collection::Collection;

/// Local Store errors.
///
/// A failed write never leaves partial state behind: single writes are one
/// statement and batches run inside one SQLite transaction.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database could not be opened.
    ///
    /// ## When This Occurs
    /// - Parent directory doesn't exist or isn't writable
    /// - File is not a SQLite database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Statement execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Begin or commit failed; nothing from the batch was applied.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A record could not be encoded or a stored body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A batch staged a write against a collection it did not declare.
    #[error("Collection '{collection}' is not part of this transaction")]
    CollectionNotInScope { collection: Collection },

    /// The store was closed.
    #[error("Store is closed")]
    Closed,

    /// All connections are in use.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → StoreError::QueryFailed
/// sqlx::Error::PoolTimedOut   → StoreError::PoolExhausted
/// sqlx::Error::PoolClosed     → StoreError::Closed
/// sqlx::Error::ColumnDecode   → StoreError::Serialization
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => StoreError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::PoolClosed => StoreError::Closed,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Serialization(err.to_string())
            }
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

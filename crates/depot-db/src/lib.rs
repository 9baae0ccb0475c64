//! # depot-db: Local Store for Depot
//!
//! Keyed record collections on top of SQLite, with atomic multi-collection
//! write batches and a revision counter for live queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Data Flow                                │
//! │                                                                         │
//! │  SyncEngine / BulkRefresh / SyncAgent::enqueue                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     depot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalStore   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │ (queue.rs ..) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ put / all     │    │ QueueRepo     │    │ 001_local_   │  │   │
//! │  │   │ delete        │◄───│ QuarantineRepo│    │   store.sql  │  │   │
//! │  │   │ transaction   │    │ LogRepo ...   │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │           └── WriteBatch (batch.rs): staged puts/deletes/clears │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SQLite: records(seq, collection, key, body, updated_at)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `LocalStore` handle and `StoreConfig`
//! - [`batch`] - Atomic write batches
//! - [`collection`] - Collection names and the `Record` trait
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store error types
//! - [`repository`] - Typed repositories over the collections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{LocalStore, StoreConfig};
//!
//! let store = LocalStore::open(StoreConfig::new("depot.db")).await?;
//! let entry = store.queue().enqueue(operation).await?;
//! let pending = store.queue().pending().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod batch;
pub mod collection;
pub mod error;
pub mod migrations;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use batch::WriteBatch;
pub use collection::{Collection, Record};
pub use error::{StoreError, StoreResult};
pub use store::{LocalStore, StoreConfig};

pub use repository::log::LogRepository;
pub use repository::mirror::MirrorRepository;
pub use repository::quarantine::QuarantineRepository;
pub use repository::queue::QueueRepository;
pub use repository::retry::RetryRepository;

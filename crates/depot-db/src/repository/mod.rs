//! # Repository Module
//!
//! Typed views over the Local Store's collections.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories over LocalStore                         │
//! │                                                                         │
//! │  SyncAgent / SyncEngine / StatusProjector                              │
//! │       │                                                                 │
//! │       │  store.queue().pending()                                       │
//! │       ▼                                                                 │
//! │  QueueRepository                                                       │
//! │  ├── enqueue(&self, operation)                                         │
//! │  ├── pending(&self)                                                    │
//! │  └── count(&self)                                                      │
//! │       │                                                                 │
//! │       │  LocalStore::put / all / count                                 │
//! │       ▼                                                                 │
//! │  records table, collection = 'sync_queue'                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-collection writes (quarantine, success, refresh) don't go through
//! repositories; they use [`LocalStore::transaction`](crate::LocalStore::transaction)
//! directly so they stay atomic.
//!
//! ## Available Repositories
//!
//! - [`QueueRepository`](queue::QueueRepository) - Pending operations
//! - [`QuarantineRepository`](quarantine::QuarantineRepository) - Rejected operations
//! - [`LogRepository`](log::LogRepository) - Sync trail
//! - [`MirrorRepository`](mirror::MirrorRepository) - Product and movement mirrors
//! - [`RetryRepository`](retry::RetryRepository) - Backoff bookkeeping

pub mod log;
pub mod mirror;
pub mod quarantine;
pub mod queue;
pub mod retry;

//! # Pending Queue Repository
//!
//! The persistent FIFO of operations recorded while offline.
//!
//! ## Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SyncAgent::enqueue(op)                                                │
//! │       │  validate, assign UUID + enqueuedAt                             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  sync_queue   [#1] [#2] [#3] ...   (insertion order = FIFO)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼  SyncEngine cycle, one entry at a time                         │
//! │  ┌──────────────┬─────────────────────┬──────────────────────────┐     │
//! │  │   success    │     rejected        │     transport error      │     │
//! │  │  delete      │  move to quarantine │  leave as is, note retry │     │
//! │  └──────────────┴─────────────────────┴──────────────────────────┘     │
//! │                                                                         │
//! │  Entries are never edited in place.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::debug;

use depot_core::{Operation, QueueEntry};

use crate::collection::{Collection, Record};
use crate::error::StoreResult;
use crate::store::LocalStore;

/// Repository for the pending queue.
#[derive(Debug, Clone)]
pub struct QueueRepository {
    store: LocalStore,
}

impl QueueRepository {
    /// Creates a new QueueRepository.
    pub fn new(store: LocalStore) -> Self {
        QueueRepository { store }
    }

    /// Appends an operation to the back of the queue.
    ///
    /// The caller is expected to have validated the operation.
    pub async fn enqueue(&self, operation: Operation) -> StoreResult<QueueEntry> {
        let entry = QueueEntry::new(operation);
        self.push(&entry).await?;
        Ok(entry)
    }

    /// Stores an already-built entry.
    pub async fn push(&self, entry: &QueueEntry) -> StoreResult<()> {
        debug!(
            entry_id = %entry.id,
            method = %entry.operation.method,
            target_url = %entry.operation.target_url,
            "Queuing operation"
        );
        self.store
            .put(QueueEntry::COLLECTION, &entry.id, entry)
            .await
    }

    /// Snapshot of the whole queue, oldest first.
    pub async fn pending(&self) -> StoreResult<Vec<QueueEntry>> {
        self.store.all(Collection::SyncQueue).await
    }

    /// Looks up one entry.
    pub async fn get(&self, id: &str) -> StoreResult<Option<QueueEntry>> {
        self.store.get(Collection::SyncQueue, id).await
    }

    /// Number of pending entries.
    pub async fn count(&self) -> StoreResult<u64> {
        self.store.count(Collection::SyncQueue).await
    }
}

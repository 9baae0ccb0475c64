//! Append-only sync trail shown to the user.

use depot_core::LogEntry;

use crate::collection::{Collection, Record};
use crate::error::StoreResult;
use crate::store::LocalStore;

/// Repository for the sync log.
///
/// There is no update or delete: the trail only grows.
#[derive(Debug, Clone)]
pub struct LogRepository {
    store: LocalStore,
}

impl LogRepository {
    pub fn new(store: LocalStore) -> Self {
        LogRepository { store }
    }

    /// Appends one entry.
    pub async fn append(&self, entry: &LogEntry) -> StoreResult<()> {
        self.store.put(LogEntry::COLLECTION, &entry.id, entry).await
    }

    /// Every entry, oldest first.
    pub async fn list(&self) -> StoreResult<Vec<LogEntry>> {
        self.store.all(Collection::Logs).await
    }

    /// The newest `limit` entries, oldest first.
    pub async fn recent(&self, limit: usize) -> StoreResult<Vec<LogEntry>> {
        let mut entries = self.list().await?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }

    pub async fn count(&self) -> StoreResult<u64> {
        self.store.count(Collection::Logs).await
    }
}

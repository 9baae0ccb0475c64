//! Quarantined operations: kept for inspection, never retried automatically.

use depot_core::QuarantineEntry;

use crate::collection::Collection;
use crate::error::StoreResult;
use crate::store::LocalStore;

/// Read access to the quarantine collection.
///
/// Entries are written only by the sync engine, inside the same transaction
/// that removes them from the pending queue.
#[derive(Debug, Clone)]
pub struct QuarantineRepository {
    store: LocalStore,
}

impl QuarantineRepository {
    pub fn new(store: LocalStore) -> Self {
        QuarantineRepository { store }
    }

    /// All quarantined entries, in the order they were quarantined.
    pub async fn list(&self) -> StoreResult<Vec<QuarantineEntry>> {
        self.store.all(Collection::Quarantine).await
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<QuarantineEntry>> {
        self.store.get(Collection::Quarantine, id).await
    }

    pub async fn count(&self) -> StoreResult<u64> {
        self.store.count(Collection::Quarantine).await
    }
}

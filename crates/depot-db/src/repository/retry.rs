//! Backoff bookkeeping for entries that hit transport errors.

use depot_core::RetryState;

use crate::collection::Collection;
use crate::error::StoreResult;
use crate::store::LocalStore;

/// Read access to retry state. The sync engine writes it inside its
/// per-entry transactions.
#[derive(Debug, Clone)]
pub struct RetryRepository {
    store: LocalStore,
}

impl RetryRepository {
    pub fn new(store: LocalStore) -> Self {
        RetryRepository { store }
    }

    /// Retry state for a queue entry, if it has failed before.
    pub async fn get(&self, entry_id: &str) -> StoreResult<Option<RetryState>> {
        self.store.get(Collection::RetryState, entry_id).await
    }

    pub async fn list(&self) -> StoreResult<Vec<RetryState>> {
        self.store.all(Collection::RetryState).await
    }
}

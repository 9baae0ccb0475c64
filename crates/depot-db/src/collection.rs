//! Collection names and the trait tying each record type to its collection.

use serde::de::DeserializeOwned;
use serde::Serialize;

use depot_core::{Keyed, LogEntry, Movement, Product, QuarantineEntry, QueueEntry, RetryState};

/// A named collection inside the Local Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Mirror of server products.
    Products,
    /// Mirror of server stock movements.
    Movements,
    /// Pending operations, FIFO.
    SyncQueue,
    /// Operations the server rejected.
    Quarantine,
    /// Append-only sync trail.
    Logs,
    /// Transport-failure bookkeeping per queue entry.
    RetryState,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Products,
        Collection::Movements,
        Collection::SyncQueue,
        Collection::Quarantine,
        Collection::Logs,
        Collection::RetryState,
    ];

    /// Name stored in the `collection` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Movements => "movements",
            Collection::SyncQueue => "sync_queue",
            Collection::Quarantine => "quarantine",
            Collection::Logs => "logs",
            Collection::RetryState => "retry_state",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type with a home collection.
pub trait Record: Keyed + Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
}

impl Record for QueueEntry {
    const COLLECTION: Collection = Collection::SyncQueue;
}

impl Record for QuarantineEntry {
    const COLLECTION: Collection = Collection::Quarantine;
}

impl Record for LogEntry {
    const COLLECTION: Collection = Collection::Logs;
}

impl Record for RetryState {
    const COLLECTION: Collection = Collection::RetryState;
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;
}

impl Record for Movement {
    const COLLECTION: Collection = Collection::Movements;
}

//! Read access to the server mirrors (products, movements).
//!
//! Mirrors are replaced wholesale by a bulk refresh; nothing else writes them.

use std::marker::PhantomData;

use crate::collection::Record;
use crate::error::StoreResult;
use crate::store::LocalStore;

/// Repository over one mirror collection.
#[derive(Debug)]
pub struct MirrorRepository<T> {
    store: LocalStore,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for MirrorRepository<T> {
    fn clone(&self) -> Self {
        MirrorRepository {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> MirrorRepository<T> {
    pub fn new(store: LocalStore) -> Self {
        MirrorRepository {
            store,
            _record: PhantomData,
        }
    }

    /// Every mirrored record, in the order the server sent them.
    pub async fn list(&self) -> StoreResult<Vec<T>> {
        self.store.all(T::COLLECTION).await
    }

    /// Looks up a record by its server id.
    pub async fn get(&self, id: &str) -> StoreResult<Option<T>> {
        self.store.get(T::COLLECTION, id).await
    }

    pub async fn count(&self) -> StoreResult<u64> {
        self.store.count(T::COLLECTION).await
    }
}

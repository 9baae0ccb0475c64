//! # Write Batches
//!
//! Staged writes applied by [`LocalStore::transaction`](crate::LocalStore::transaction)
//! inside one SQLite transaction.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  store.transaction(&[SyncQueue, Quarantine, Logs], |batch| {          │
//! │      batch.put_record(&quarantined)?;    ── staged, checked in scope  │
//! │      batch.delete_record::<QueueEntry>(&id)?;                         │
//! │      batch.put_record(&log)?;                                         │
//! │      Ok(())                                                           │
//! │  })                                                                   │
//! │       │                                                               │
//! │       ▼                                                               │
//! │  BEGIN → apply ops in order → COMMIT → revision += 1                  │
//! │  (any error: ROLLBACK, nothing visible)                               │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use depot_core::Keyed;

use crate::collection::{Collection, Record};
use crate::error::{StoreError, StoreResult};

/// One staged write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BatchOp {
    Put {
        collection: Collection,
        key: String,
        body: String,
    },
    Delete {
        collection: Collection,
        key: String,
    },
    Clear {
        collection: Collection,
    },
}

/// Writes staged for one transaction.
///
/// Records are serialized while staging, so an encoding failure aborts the
/// transaction before anything touches the database.
#[derive(Debug)]
pub struct WriteBatch {
    scope: Vec<Collection>,
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub(crate) fn new(scope: &[Collection]) -> Self {
        WriteBatch {
            scope: scope.to_vec(),
            ops: Vec::new(),
        }
    }

    fn check_scope(&self, collection: Collection) -> StoreResult<()> {
        if self.scope.contains(&collection) {
            Ok(())
        } else {
            Err(StoreError::CollectionNotInScope { collection })
        }
    }

    /// Stages an insert-or-replace of `record` under `key`.
    pub fn put<T: Serialize + ?Sized>(
        &mut self,
        collection: Collection,
        key: &str,
        record: &T,
    ) -> StoreResult<()> {
        self.check_scope(collection)?;
        let body = serde_json::to_string(record)?;
        self.ops.push(BatchOp::Put {
            collection,
            key: key.to_string(),
            body,
        });
        Ok(())
    }

    /// Stages puts for every record, keyed by [`Keyed::key`].
    pub fn bulk_put<T: Serialize + Keyed>(
        &mut self,
        collection: Collection,
        records: &[T],
    ) -> StoreResult<()> {
        for record in records {
            self.put(collection, record.key(), record)?;
        }
        Ok(())
    }

    /// Stages a delete. Deleting a missing key is not an error.
    pub fn delete(&mut self, collection: Collection, key: &str) -> StoreResult<()> {
        self.check_scope(collection)?;
        self.ops.push(BatchOp::Delete {
            collection,
            key: key.to_string(),
        });
        Ok(())
    }

    /// Stages removal of every record in `collection`.
    pub fn clear(&mut self, collection: Collection) -> StoreResult<()> {
        self.check_scope(collection)?;
        self.ops.push(BatchOp::Clear { collection });
        Ok(())
    }

    /// Stages a put into the record type's home collection.
    pub fn put_record<T: Record>(&mut self, record: &T) -> StoreResult<()> {
        self.put(T::COLLECTION, record.key(), record)
    }

    /// Stages a delete from the record type's home collection.
    pub fn delete_record<T: Record>(&mut self, key: &str) -> StoreResult<()> {
        self.delete(T::COLLECTION, key)
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

//! # Local Store
//!
//! Connection pool, keyed collection access and atomic write batches.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Local Store                                    │
//! │                                                                         │
//! │  Agent Startup                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreConfig::new(path) ← Configure pool settings                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LocalStore::open(config).await ← Create pool + run migrations         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐    ┌──────────────────┐   │
//! │  │            SqlitePool                    │    │ watch::Sender    │   │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │    │   revision: u64  │   │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │───►│   bumped after   │   │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │    │   every commit   │   │
//! │  └─────────────────────────────────────────┘    └────────┬─────────┘   │
//! │       │                                                  │             │
//! │       │ SyncEngine, BulkRefresh, enqueue                 ▼             │
//! │       ▼                                         StatusProjector        │
//! │  put / bulk_put / delete / transaction          (recomputes count)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File-backed stores run in WAL mode so the status projector's reads never
//! wait on a sync cycle's writes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use depot_core::{Keyed, Movement, Product};

use crate::batch::{BatchOp, WriteBatch};
use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::migrations;
use crate::repository::log::LogRepository;
use crate::repository::mirror::MirrorRepository;
use crate::repository::quarantine::QuarantineRepository;
use crate::repository::queue::QueueRepository;
use crate::repository::retry::RetryRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Local Store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::new("/path/to/depot.db")
///     .max_connections(4);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections
    /// forever.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Whether to run migrations on open.
    /// Default: true
    pub run_migrations: bool,
}

impl StoreConfig {
    /// Creates a configuration for a file-backed store. The file is created if
    /// it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on open.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory store configuration (for testing).
    ///
    /// The single connection is never recycled; closing it would drop the
    /// database.
    pub fn in_memory() -> Self {
        StoreConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
        }
    }

    /// Returns true for `:memory:` stores.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Local Store
// =============================================================================

/// Handle to the Local Store.
///
/// Cheap to clone; clones share the pool and the revision counter.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    revision: Arc<watch::Sender<u64>>,
}

impl LocalStore {
    /// Opens the store.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite (WAL, NORMAL synchronous) for file-backed stores
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening local store"
        );

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);

        if config.is_in_memory() {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Store pool created"
        );

        let (revision, _) = watch::channel(0u64);
        let store = LocalStore {
            pool,
            revision: Arc::new(revision),
        };

        if config.run_migrations {
            store.run_migrations().await?;
        }

        Ok(store)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the pool. Every later operation fails with [`StoreError::Closed`].
    pub async fn close(&self) {
        info!("Closing local store");
        self.pool.close().await;
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Checks that the database answers queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.pool.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Change Notification
    // =========================================================================

    /// Subscribes to the revision counter.
    ///
    /// The value increases after every committed write; receivers recompute
    /// whatever they derive from the store when it changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    // =========================================================================
    // Keyed Access
    // =========================================================================

    /// Inserts or replaces the record stored under `key`.
    ///
    /// Replacing keeps the record's original position in insertion order.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        key: &str,
        record: &T,
    ) -> StoreResult<()> {
        self.transaction(&[collection], |batch| batch.put(collection, key, record))
            .await
    }

    /// Puts every record in one transaction, keyed by [`Keyed::key`].
    pub async fn bulk_put<T: Serialize + Keyed + Sync>(
        &self,
        collection: Collection,
        records: &[T],
    ) -> StoreResult<()> {
        self.transaction(&[collection], |batch| batch.bulk_put(collection, records))
            .await
    }

    /// Returns every record in `collection`, in insertion order.
    pub async fn all<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<Vec<T>> {
        self.ensure_open()?;

        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT body FROM records WHERE collection = ?1 ORDER BY seq ASC",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    /// Returns the record stored under `key`, if any.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> StoreResult<Option<T>> {
        self.ensure_open()?;

        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ?1 AND key = ?2")
                .bind(collection.as_str())
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    /// Number of records in `collection`.
    pub async fn count(&self, collection: Collection) -> StoreResult<u64> {
        self.ensure_open()?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?1")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    /// Removes the record stored under `key`. Missing keys are ignored.
    pub async fn delete(&self, collection: Collection, key: &str) -> StoreResult<()> {
        self.transaction(&[collection], |batch| batch.delete(collection, key))
            .await
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Runs `stage` to collect writes against `collections`, then applies them
    /// atomically.
    ///
    /// If staging fails (including a write to an undeclared collection) nothing
    /// is applied. If any statement fails the SQLite transaction is rolled
    /// back.
    ///
    /// ## Example
    /// ```rust,ignore
    /// store.transaction(&[Collection::Products, Collection::Movements], |batch| {
    ///     batch.clear(Collection::Products)?;
    ///     batch.bulk_put(Collection::Products, &products)?;
    ///     batch.clear(Collection::Movements)?;
    ///     batch.bulk_put(Collection::Movements, &movements)
    /// }).await?;
    /// ```
    pub async fn transaction<F, R>(&self, collections: &[Collection], stage: F) -> StoreResult<R>
    where
        F: FnOnce(&mut WriteBatch) -> StoreResult<R>,
    {
        self.ensure_open()?;

        let mut batch = WriteBatch::new(collections);
        let result = stage(&mut batch)?;
        let ops = batch.into_ops();

        if ops.is_empty() {
            return Ok(result);
        }

        let op_count = ops.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        for op in &ops {
            apply_op(&mut tx, op).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(ops = op_count, "Store transaction committed");
        self.bump_revision();

        Ok(result)
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Returns the pending queue repository.
    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.clone())
    }

    /// Returns the quarantine repository.
    pub fn quarantine(&self) -> QuarantineRepository {
        QuarantineRepository::new(self.clone())
    }

    /// Returns the sync log repository.
    pub fn logs(&self) -> LogRepository {
        LogRepository::new(self.clone())
    }

    /// Returns the product mirror.
    pub fn products(&self) -> MirrorRepository<Product> {
        MirrorRepository::new(self.clone())
    }

    /// Returns the movement mirror.
    pub fn movements(&self) -> MirrorRepository<Movement> {
        MirrorRepository::new(self.clone())
    }

    /// Returns the retry bookkeeping repository.
    pub fn retries(&self) -> RetryRepository {
        RetryRepository::new(self.clone())
    }
}

async fn apply_op(conn: &mut SqliteConnection, op: &BatchOp) -> StoreResult<()> {
    match op {
        BatchOp::Put {
            collection,
            key,
            body,
        } => {
            sqlx::query(
                r#"
                INSERT INTO records (collection, key, body, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (collection, key) DO UPDATE SET
                    body = excluded.body,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(collection.as_str())
            .bind(key)
            .bind(body)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *conn)
            .await?;
        }
        BatchOp::Delete { collection, key } => {
            sqlx::query("DELETE FROM records WHERE collection = ?1 AND key = ?2")
                .bind(collection.as_str())
                .bind(key)
                .execute(&mut *conn)
                .await?;
        }
        BatchOp::Clear { collection } => {
            sqlx::query("DELETE FROM records WHERE collection = ?1")
                .bind(collection.as_str())
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::{LogEntry, Operation, QueueEntry};
    use serde_json::json;

    async fn store() -> LocalStore {
        LocalStore::open(StoreConfig::in_memory()).await.unwrap()
    }

    fn entry(name: &str) -> QueueEntry {
        QueueEntry::new(Operation::post("/api/products", json!({ "name": name })))
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = store().await;
        assert!(store.health_check().await);
        assert_eq!(store.count(Collection::SyncQueue).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = StoreConfig::new("/tmp/depot.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(StoreConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_all_returns_insertion_order() {
        let store = store().await;
        let (a, b, c) = (entry("a"), entry("b"), entry("c"));

        store.put(Collection::SyncQueue, &a.id, &a).await.unwrap();
        store.put(Collection::SyncQueue, &b.id, &b).await.unwrap();
        store.put(Collection::SyncQueue, &c.id, &c).await.unwrap();

        // Overwriting `a` must not move it to the back.
        store.put(Collection::SyncQueue, &a.id, &a).await.unwrap();

        let all: Vec<QueueEntry> = store.all(Collection::SyncQueue).await.unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);
    }

    #[tokio::test]
    async fn test_get_count_delete() {
        let store = store().await;
        let a = entry("a");
        store.bulk_put(Collection::SyncQueue, &[a.clone(), entry("b")]).await.unwrap();

        assert_eq!(store.count(Collection::SyncQueue).await.unwrap(), 2);
        let fetched: Option<QueueEntry> = store.get(Collection::SyncQueue, &a.id).await.unwrap();
        assert_eq!(fetched, Some(a.clone()));

        store.delete(Collection::SyncQueue, &a.id).await.unwrap();
        store.delete(Collection::SyncQueue, "missing").await.unwrap();
        assert_eq!(store.count(Collection::SyncQueue).await.unwrap(), 1);
        let gone: Option<QueueEntry> = store.get(Collection::SyncQueue, &a.id).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = store().await;
        let a = entry("a");
        store.put(Collection::SyncQueue, &a.id, &a).await.unwrap();

        assert_eq!(store.count(Collection::Quarantine).await.unwrap(), 0);
        let other: Option<QueueEntry> = store.get(Collection::Quarantine, &a.id).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_transaction_out_of_scope_applies_nothing() {
        let store = store().await;
        let a = entry("a");

        let result = store
            .transaction(&[Collection::SyncQueue], |batch| {
                batch.put_record(&a)?;
                batch.put_record(&LogEntry::info("not allowed here"))
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::CollectionNotInScope { .. })
        ));
        assert_eq!(store.count(Collection::SyncQueue).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Logs).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transaction_spans_collections() {
        let store = store().await;
        let a = entry("a");
        store.put(Collection::SyncQueue, &a.id, &a).await.unwrap();

        store
            .transaction(&[Collection::SyncQueue, Collection::Logs], |batch| {
                batch.delete_record::<QueueEntry>(&a.id)?;
                batch.put_record(&LogEntry::success(format!("Synced item #{}", a.id)))
            })
            .await
            .unwrap();

        assert_eq!(store.count(Collection::SyncQueue).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Logs).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revision_bumps_on_commit_only() {
        let store = store().await;
        let mut rx = store.subscribe();
        let before = *rx.borrow_and_update();

        let a = entry("a");
        store.put(Collection::SyncQueue, &a.id, &a).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), before + 1);

        // Reads and empty batches don't count as writes.
        let _: Vec<QueueEntry> = store.all(Collection::SyncQueue).await.unwrap();
        store.transaction(&[Collection::Logs], |_| Ok(())).await.unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_closed_store_errors() {
        let store = store().await;
        store.close().await;
        assert!(store.is_closed());

        let result: StoreResult<Vec<QueueEntry>> = store.all(Collection::SyncQueue).await;
        assert!(matches!(result, Err(StoreError::Closed)));
        let a = entry("a");
        assert!(matches!(
            store.put(Collection::SyncQueue, &a.id, &a).await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.db");
        let a = entry("persisted");

        let store = LocalStore::open(StoreConfig::new(&path)).await.unwrap();
        store.put(Collection::SyncQueue, &a.id, &a).await.unwrap();
        store.close().await;

        let reopened = LocalStore::open(StoreConfig::new(&path)).await.unwrap();
        let all: Vec<QueueEntry> = reopened.all(Collection::SyncQueue).await.unwrap();
        assert_eq!(all, vec![a]);
        reopened.close().await;
    }
}

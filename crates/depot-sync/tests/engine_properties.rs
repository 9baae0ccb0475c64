//! End-to-end behavior of the sync engine, bulk refresh and agent against an
//! in-memory store.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use depot_core::{
    project, EngineState, ErrorKind, LogEntry, LogLevel, Movement, Operation, Product,
    QueueEntry, SyncStatus,
};
use depot_db::{Collection, LocalStore, StoreConfig, StoreError};
use depot_sync::{
    BulkRefresh, CycleOutcome, CycleReport, EngineConfig, FetchError, NetworkMonitor, NoOpEmitter,
    RefreshEndpoints, RefreshError, RemoteReply, RemoteService, RetryPolicy, ScriptedRemote,
    SkipReason, SyncAgentBuilder, SyncConfig, SyncEngine, TransportError,
};

// =============================================================================
// Helpers
// =============================================================================

async fn open_store() -> LocalStore {
    LocalStore::open(StoreConfig::in_memory()).await.unwrap()
}

fn engine_with(
    store: &LocalStore,
    remote: Arc<dyn RemoteService>,
    online: bool,
    retry: RetryPolicy,
) -> SyncEngine {
    SyncEngine::new(
        store.clone(),
        remote,
        NetworkMonitor::new(online),
        EngineConfig {
            request_timeout: Duration::from_secs(5),
            retry,
        },
    )
}

async fn enqueue_n(store: &LocalStore, n: usize) -> Vec<QueueEntry> {
    let mut entries = Vec::with_capacity(n);
    for i in 1..=n {
        let entry = store
            .queue()
            .enqueue(Operation::post(
                "/api/inventory/movement",
                json!({ "productId": format!("p{}", i), "type": "out", "quantity": i }),
            ))
            .await
            .unwrap();
        entries.push(entry);
    }
    entries
}

async fn logs_at(store: &LocalStore, level: LogLevel) -> Vec<LogEntry> {
    store
        .logs()
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter(|log| log.level == level)
        .collect()
}

/// Blocks inside `execute` until released.
#[derive(Default)]
struct GatedRemote {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteService for GatedRemote {
    async fn execute(&self, _operation: &Operation) -> Result<RemoteReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(RemoteReply::Accepted { status: 200 })
    }

    async fn fetch(&self, _path: &str) -> Result<Value, FetchError> {
        Err(FetchError::Status { status: 404 })
    }
}

/// Never answers `execute`.
struct HangingRemote;

#[async_trait]
impl RemoteService for HangingRemote {
    async fn execute(&self, _operation: &Operation) -> Result<RemoteReply, TransportError> {
        std::future::pending().await
    }

    async fn fetch(&self, _path: &str) -> Result<Value, FetchError> {
        std::future::pending().await
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

#[tokio::test]
async fn test_empty_cycle_is_idempotent() {
    let store = open_store().await;
    let remote = Arc::new(ScriptedRemote::new());
    let engine = engine_with(&store, remote.clone(), true, RetryPolicy::default());

    for run in 1..=2u64 {
        assert_eq!(engine.run_cycle().await.unwrap(), CycleOutcome::Empty);
        assert_eq!(store.queue().count().await.unwrap(), 0);
        assert_eq!(store.quarantine().count().await.unwrap(), 0);

        let logs = store.logs().list().await.unwrap();
        assert_eq!(logs.len() as u64, run);
        assert!(logs.iter().all(|log| log.level == LogLevel::Info));
    }
    assert_eq!(remote.execute_count(), 0);
}

#[tokio::test]
async fn test_second_cycle_while_running_is_dropped() {
    let store = open_store().await;
    enqueue_n(&store, 1).await;
    let remote = Arc::new(GatedRemote::default());
    let engine = engine_with(&store, remote.clone(), true, RetryPolicy::default());

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run_cycle().await }
    });

    remote.entered.notified().await;
    assert_eq!(engine.state(), EngineState::Running);
    assert_eq!(
        engine.run_cycle().await.unwrap(),
        CycleOutcome::Skipped(SkipReason::AlreadyRunning)
    );

    remote.release.notify_one();
    let outcome = first.await.unwrap().unwrap();

    assert!(matches!(
        outcome,
        CycleOutcome::Completed(CycleReport { succeeded: 1, .. })
    ));
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.state(), EngineState::Idle);
}

#[tokio::test]
async fn test_all_accepted_empties_queue() {
    let store = open_store().await;
    let entries = enqueue_n(&store, 3).await;
    let remote = Arc::new(ScriptedRemote::new());
    remote.accept().accept().accept();
    let engine = engine_with(&store, remote.clone(), true, RetryPolicy::default());

    let outcome = engine.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed(CycleReport {
            attempted: 3,
            succeeded: 3,
            ..CycleReport::default()
        })
    );
    assert_eq!(store.queue().count().await.unwrap(), 0);
    assert_eq!(store.quarantine().count().await.unwrap(), 0);

    let successes = logs_at(&store, LogLevel::Success).await;
    let messages: Vec<String> = successes.into_iter().map(|log| log.message).collect();
    let expected: Vec<String> = entries
        .iter()
        .map(|entry| format!("Synced item #{}", entry.id))
        .collect();
    assert_eq!(messages, expected);

    let info = logs_at(&store, LogLevel::Info).await;
    assert_eq!(info[0].message, "Starting sync for 3 items.");
}

#[tokio::test]
async fn test_rejected_entry_is_quarantined_others_synced() {
    let store = open_store().await;
    let entries = enqueue_n(&store, 3).await;
    let remote = Arc::new(ScriptedRemote::new());
    remote
        .accept()
        .accept()
        .reject(422, json!({ "message": "Insufficient stock" }));
    let engine = engine_with(&store, remote.clone(), true, RetryPolicy::default());

    engine.run_cycle().await.unwrap();

    assert_eq!(store.queue().count().await.unwrap(), 0);

    let quarantined = store.quarantine().list().await.unwrap();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].entry(), entries[2]);
    assert_eq!(quarantined[0].error_detail.message, "Insufficient stock");
    assert_eq!(quarantined[0].error_detail.status, Some(422));

    assert_eq!(logs_at(&store, LogLevel::Success).await.len(), 2);
    let errors = logs_at(&store, LogLevel::Error).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        format!("Sync failed for item #{}: Insufficient stock", entries[2].id)
    );
}

#[tokio::test]
async fn test_transport_failure_retains_entry() {
    let store = open_store().await;
    let entries = enqueue_n(&store, 2).await;
    let remote = Arc::new(ScriptedRemote::new());
    remote
        .fail(TransportError::Timeout { after_ms: 5_000 })
        .accept();
    let engine = engine_with(&store, remote.clone(), true, RetryPolicy::default());

    engine.run_cycle().await.unwrap();

    // First entry kept verbatim, second one still went through.
    let pending = store.queue().pending().await.unwrap();
    assert_eq!(pending, vec![entries[0].clone()]);
    assert_eq!(store.quarantine().count().await.unwrap(), 0);

    let errors = logs_at(&store, LogLevel::Error).await;
    assert_eq!(
        errors[0].message,
        format!(
            "Network error for item #{}: request timed out after 5000 ms",
            entries[0].id
        )
    );
}

#[tokio::test]
async fn test_request_timeout_retains_entry() {
    let store = open_store().await;
    let entries = enqueue_n(&store, 1).await;
    let engine = SyncEngine::new(
        store.clone(),
        Arc::new(HangingRemote),
        NetworkMonitor::new(true),
        EngineConfig {
            request_timeout: Duration::from_millis(50),
            retry: RetryPolicy::default(),
        },
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), engine.run_cycle())
        .await
        .expect("cycle should finish once the request times out")
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed(CycleReport {
            attempted: 1,
            retained: 1,
            ..CycleReport::default()
        })
    );
    assert_eq!(store.queue().pending().await.unwrap(), entries);
    assert_eq!(store.quarantine().count().await.unwrap(), 0);

    let errors = logs_at(&store, LogLevel::Error).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        format!(
            "Network error for item #{}: request timed out after 50 ms",
            entries[0].id
        )
    );
}

#[tokio::test]
async fn test_offline_cycle_has_no_effect() {
    let store = open_store().await;
    enqueue_n(&store, 2).await;
    let revision = store.revision();
    let remote = Arc::new(ScriptedRemote::new());
    let engine = engine_with(&store, remote.clone(), false, RetryPolicy::default());

    assert_eq!(
        engine.schedule_cycle().await.unwrap(),
        CycleOutcome::Skipped(SkipReason::Offline)
    );

    assert_eq!(remote.execute_count(), 0);
    assert_eq!(store.revision(), revision);
    assert_eq!(store.logs().count().await.unwrap(), 0);
    assert_eq!(store.queue().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_retry_budget_exhaustion_quarantines() {
    let store = open_store().await;
    let entries = enqueue_n(&store, 1).await;
    let remote = Arc::new(ScriptedRemote::new());
    remote
        .fail(TransportError::Unreachable("connection refused".into()))
        .fail(TransportError::Unreachable("connection refused".into()));
    // No backoff delay so the second cycle retries right away.
    let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
    let engine = engine_with(&store, remote.clone(), true, policy);

    engine.run_cycle().await.unwrap();
    assert_eq!(store.queue().count().await.unwrap(), 1);
    assert_eq!(
        store.retries().get(&entries[0].id).await.unwrap().unwrap().attempts,
        1
    );

    engine.run_cycle().await.unwrap();
    assert_eq!(store.queue().count().await.unwrap(), 0);
    assert!(store.retries().get(&entries[0].id).await.unwrap().is_none());

    let quarantined = store.quarantine().get(&entries[0].id).await.unwrap().unwrap();
    assert_eq!(quarantined.error_detail.kind, ErrorKind::RetriesExhausted);
    assert_eq!(quarantined.error_detail.status, None);
    assert_eq!(remote.execute_count(), 2);
}

#[tokio::test]
async fn test_entry_in_backoff_is_deferred() {
    let store = open_store().await;
    enqueue_n(&store, 2).await;
    let remote = Arc::new(ScriptedRemote::new());
    remote.fail(TransportError::Unreachable("reset".into()));
    let policy = RetryPolicy::new(5, Duration::from_secs(60), Duration::from_secs(60));
    let engine = engine_with(&store, remote.clone(), true, policy);

    engine.run_cycle().await.unwrap();
    let outcome = engine.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed(CycleReport {
            deferred: 1,
            ..CycleReport::default()
        })
    );
    assert_eq!(remote.execute_count(), 2);
    assert_eq!(store.queue().count().await.unwrap(), 1);
}

// =============================================================================
// Local Store
// =============================================================================

#[tokio::test]
async fn test_failed_transaction_writes_nothing() {
    let store = open_store().await;
    let entry = QueueEntry::new(Operation::delete("/api/products/1"));
    let revision = store.revision();

    let result = store
        .transaction(&[Collection::SyncQueue], |batch| {
            batch.put_record(&entry)?;
            batch.put_record(&LogEntry::info("outside the declared scope"))
        })
        .await;

    assert!(matches!(
        result,
        Err(StoreError::CollectionNotInScope {
            collection: Collection::Logs
        })
    ));
    assert_eq!(store.queue().count().await.unwrap(), 0);
    assert_eq!(store.revision(), revision);
}

// =============================================================================
// Bulk Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_failure_keeps_both_mirrors() {
    let store = open_store().await;
    let endpoints = RefreshEndpoints::default();

    let old_product: Product =
        serde_json::from_value(json!({ "_id": "old-p", "name": "Old" })).unwrap();
    let old_movement: Movement =
        serde_json::from_value(json!({ "_id": "old-m", "type": "in" })).unwrap();
    store
        .bulk_put(Collection::Products, &[old_product.clone()])
        .await
        .unwrap();
    store
        .bulk_put(Collection::Movements, &[old_movement.clone()])
        .await
        .unwrap();
    enqueue_n(&store, 1).await;

    let remote = Arc::new(ScriptedRemote::new());
    remote.set_document(
        endpoints.products.clone(),
        Ok(json!({ "products": [{ "_id": "new-p", "name": "New" }] })),
    );
    remote.set_document(endpoints.movements.clone(), Err(FetchError::Status { status: 503 }));

    let refresh = BulkRefresh::new(store.clone(), remote, endpoints, Arc::new(NoOpEmitter));
    let err = refresh.refresh().await.unwrap_err();

    assert!(matches!(
        err,
        RefreshError::Fetch {
            collection: "movements",
            source: FetchError::Status { status: 503 }
        }
    ));
    assert_eq!(store.products().list().await.unwrap(), vec![old_product]);
    assert_eq!(store.movements().list().await.unwrap(), vec![old_movement]);
    assert_eq!(store.queue().count().await.unwrap(), 1);
}

// =============================================================================
// Status Projection
// =============================================================================

#[test]
fn test_status_precedence_table() {
    use EngineState::{Idle, Running};

    let cases = [
        (false, 0, Idle, SyncStatus::Offline { pending: 0 }),
        (false, 4, Running, SyncStatus::Offline { pending: 4 }),
        (true, 0, Running, SyncStatus::Syncing),
        (true, 4, Running, SyncStatus::Syncing),
        (true, 4, Idle, SyncStatus::Pending { pending: 4 }),
        (true, 0, Idle, SyncStatus::OnlineIdle),
    ];

    for (online, pending, engine, expected) in cases {
        assert_eq!(
            project(online, pending, engine),
            expected,
            "online={} pending={} engine={:?}",
            online,
            pending,
            engine
        );
    }
}

// =============================================================================
// Agent
// =============================================================================

#[tokio::test]
async fn test_agent_syncs_after_reconnect() {
    let store = open_store().await;
    let remote = Arc::new(ScriptedRemote::new());
    let network = NetworkMonitor::new(false);

    let mut config = SyncConfig::default();
    config.sync.interval_ms = 3_600_000;

    let mut agent = SyncAgentBuilder::new(config)
        .with_store(store.clone())
        .with_remote(remote.clone())
        .with_network(network.clone())
        .build()
        .unwrap();
    agent.start().await.unwrap();

    agent
        .enqueue(Operation::put("/api/products/p1", json!({ "name": "Bolt" })))
        .await
        .unwrap();

    let mut status = agent.watch_status();
    let offline = tokio::time::timeout(
        Duration::from_secs(2),
        status.wait_for(|view| view.label == "Offline (1 pending)"),
    )
    .await
    .map_or(false, |seen| seen.is_ok());
    assert!(offline);
    assert_eq!(remote.execute_count(), 0);

    network.set_online(true);

    let online = tokio::time::timeout(
        Duration::from_secs(2),
        status.wait_for(|view| view.label == "Online"),
    )
    .await
    .map_or(false, |seen| seen.is_ok());
    assert!(online);
    assert_eq!(remote.execute_count(), 1);
    assert_eq!(store.queue().count().await.unwrap(), 0);

    agent.shutdown().await.unwrap();
}

//! # Sync Engine
//!
//! Drains the pending queue against the remote service, one entry at a time.
//!
//! ## Cycle Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Cycle                                      │
//! │                                                                         │
//! │  schedule_cycle()                                                       │
//! │       │                                                                 │
//! │       ├── offline ───────────────────────► Skipped(Offline)             │
//! │       ▼                                    (no store access)            │
//! │  run_cycle()                                                            │
//! │       │                                                                 │
//! │       ├── in-flight flag already set ────► Skipped(AlreadyRunning)      │
//! │       ▼                                                                 │
//! │  snapshot = queue.pending()  (FIFO)                                     │
//! │       │                                                                 │
//! │       ├── empty ─────────────────────────► log "Nothing to sync."       │
//! │       ▼                                                                 │
//! │  for entry in snapshot:                                                 │
//! │       ├── in backoff ──► deferred                                       │
//! │       ├── execute (timeout) ──► classify                                │
//! │       │       Success     ──► delete entry + success log    (1 txn)     │
//! │       │       Quarantine  ──► move to quarantine + error log (1 txn)    │
//! │       │       Retry       ──► record backoff + error log    (1 txn)     │
//! │       ▼                                                                 │
//! │  in-flight flag cleared, state = Idle  (guard drop)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A store failure while recording an outcome is reported through `tracing`
//! and the entry is counted as retained; the cycle moves on.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use depot_core::{
    EngineState, ErrorDetail, LogEntry, QueueEntry, QuarantineEntry, RetryState,
};
use depot_db::{Collection, LocalStore, StoreResult};

use crate::config::SyncConfig;
use crate::error::{SyncResult, TransportError};
use crate::network::NetworkMonitor;
use crate::outcome::{classify, Outcome, RetryDecision, RetryPolicy};
use crate::remote::{RemoteReply, RemoteService};

// =============================================================================
// Cycle Results
// =============================================================================

/// Why a cycle request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

/// Per-cycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries sent to the remote service.
    pub attempted: usize,
    pub succeeded: usize,
    pub quarantined: usize,
    /// Entries still queued after a transport failure.
    pub retained: usize,
    /// Entries skipped because their backoff had not elapsed.
    pub deferred: usize,
}

/// Result of a cycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    /// The queue was empty.
    Empty,
    Completed(CycleReport),
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on one remote call.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &SyncConfig) -> Self {
        EngineConfig {
            request_timeout: config.request_timeout(),
            retry: config.retry_policy(),
        }
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

struct EngineInner {
    store: LocalStore,
    remote: Arc<dyn RemoteService>,
    network: NetworkMonitor,
    config: EngineConfig,
    in_flight: AtomicBool,
    state: watch::Sender<EngineState>,
}

/// Queue drainer. Clones share the in-flight flag.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlightGuard<'a> {
    inner: &'a EngineInner,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
        self.inner.state.send_replace(EngineState::Idle);
    }
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteService>,
        network: NetworkMonitor,
        config: EngineConfig,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        SyncEngine {
            inner: Arc::new(EngineInner {
                store,
                remote,
                network,
                config,
                in_flight: AtomicBool::new(false),
                state,
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Subscribes to `Idle` / `Running` transitions.
    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.inner.network
    }

    /// Runs a cycle if the device is online.
    pub async fn schedule_cycle(&self) -> SyncResult<CycleOutcome> {
        if !self.inner.network.is_online() {
            debug!("Offline, skipping sync cycle");
            return Ok(CycleOutcome::Skipped(SkipReason::Offline));
        }
        self.run_cycle().await
    }

    /// Drains the current queue snapshot.
    ///
    /// Returns `Skipped(AlreadyRunning)` without touching anything if another
    /// cycle holds the in-flight flag.
    pub async fn run_cycle(&self) -> SyncResult<CycleOutcome> {
        let inner = &*self.inner;

        if inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync cycle already in flight, dropping request");
            return Ok(CycleOutcome::Skipped(SkipReason::AlreadyRunning));
        }
        let _guard = InFlightGuard { inner };
        inner.state.send_replace(EngineState::Running);

        let snapshot = inner.store.queue().pending().await?;

        if snapshot.is_empty() {
            self.append_log(LogEntry::info("Nothing to sync.")).await;
            return Ok(CycleOutcome::Empty);
        }

        info!(count = snapshot.len(), "Starting sync cycle");
        self.append_log(LogEntry::info(format!(
            "Starting sync for {} items.",
            snapshot.len()
        )))
        .await;

        let mut retries: HashMap<String, RetryState> = match inner.store.retries().list().await {
            Ok(states) => states
                .into_iter()
                .map(|state| (state.entry_id.clone(), state))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load retry state, treating all entries as due");
                HashMap::new()
            }
        };

        let mut report = CycleReport::default();

        for entry in snapshot {
            let previous = retries.remove(&entry.id);

            if let Some(state) = &previous {
                if !state.is_due(Utc::now()) {
                    debug!(
                        entry_id = %entry.id,
                        attempts = state.attempts,
                        next_attempt_at = %state.next_attempt_at,
                        "Entry in backoff, deferring"
                    );
                    report.deferred += 1;
                    continue;
                }
            }

            report.attempted += 1;
            let result = self.execute(&entry).await;

            match classify(&result) {
                Outcome::Success => match self.record_success(&entry).await {
                    Ok(()) => report.succeeded += 1,
                    Err(e) => {
                        error!(entry_id = %entry.id, error = %e, "Failed to record sync success");
                        report.retained += 1;
                    }
                },
                Outcome::Quarantine(detail) => match self.quarantine(&entry, detail).await {
                    Ok(()) => report.quarantined += 1,
                    Err(e) => {
                        error!(entry_id = %entry.id, error = %e, "Failed to quarantine entry");
                        report.retained += 1;
                    }
                },
                Outcome::Retry(reason) => {
                    let decision =
                        inner
                            .config
                            .retry
                            .next(previous.as_ref(), &entry.id, &reason, Utc::now());
                    match decision {
                        RetryDecision::Backoff(state) => {
                            if let Err(e) = self.record_retry(&entry, &reason, &state).await {
                                error!(entry_id = %entry.id, error = %e, "Failed to record retry state");
                            }
                            report.retained += 1;
                        }
                        RetryDecision::GiveUp(detail) => {
                            warn!(entry_id = %entry.id, attempts = inner.config.retry.max_attempts, "Retry budget exhausted");
                            match self.quarantine(&entry, detail).await {
                                Ok(()) => report.quarantined += 1,
                                Err(e) => {
                                    error!(entry_id = %entry.id, error = %e, "Failed to quarantine entry");
                                    report.retained += 1;
                                }
                            }
                        }
                    }
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            quarantined = report.quarantined,
            retained = report.retained,
            deferred = report.deferred,
            "Sync cycle finished"
        );

        Ok(CycleOutcome::Completed(report))
    }

    async fn execute(&self, entry: &QueueEntry) -> Result<RemoteReply, TransportError> {
        let timeout = self.inner.config.request_timeout;
        debug!(entry_id = %entry.id, method = %entry.operation.method, target = %entry.operation.target_url, "Syncing entry");

        match tokio::time::timeout(timeout, self.inner.remote.execute(&entry.operation)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    // =========================================================================
    // Outcome Recording
    // =========================================================================

    async fn record_success(&self, entry: &QueueEntry) -> StoreResult<()> {
        let log = LogEntry::success(format!("Synced item #{}", entry.id));
        self.inner
            .store
            .transaction(
                &[Collection::SyncQueue, Collection::RetryState, Collection::Logs],
                |batch| {
                    batch.delete_record::<QueueEntry>(&entry.id)?;
                    batch.delete_record::<RetryState>(&entry.id)?;
                    batch.put_record(&log)
                },
            )
            .await?;
        debug!(entry_id = %entry.id, "Entry synced");
        Ok(())
    }

    async fn quarantine(&self, entry: &QueueEntry, detail: ErrorDetail) -> StoreResult<()> {
        let log = LogEntry::error(format!(
            "Sync failed for item #{}: {}",
            entry.id, detail.message
        ));
        let quarantined: QuarantineEntry = entry.clone().into_quarantine(detail);

        self.inner
            .store
            .transaction(
                &[
                    Collection::SyncQueue,
                    Collection::Quarantine,
                    Collection::RetryState,
                    Collection::Logs,
                ],
                |batch| {
                    batch.put_record(&quarantined)?;
                    batch.delete_record::<QueueEntry>(&entry.id)?;
                    batch.delete_record::<RetryState>(&entry.id)?;
                    batch.put_record(&log)
                },
            )
            .await?;
        warn!(entry_id = %entry.id, reason = %quarantined.error_detail.message, "Entry quarantined");
        Ok(())
    }

    async fn record_retry(
        &self,
        entry: &QueueEntry,
        reason: &str,
        state: &RetryState,
    ) -> StoreResult<()> {
        let log = LogEntry::error(format!("Network error for item #{}: {}", entry.id, reason));
        self.inner
            .store
            .transaction(&[Collection::RetryState, Collection::Logs], |batch| {
                batch.put_record(state)?;
                batch.put_record(&log)
            })
            .await?;
        debug!(
            entry_id = %entry.id,
            attempts = state.attempts,
            next_attempt_at = %state.next_attempt_at,
            "Entry kept for retry"
        );
        Ok(())
    }

    async fn append_log(&self, entry: LogEntry) {
        if let Err(e) = self.inner.store.logs().append(&entry).await {
            error!(error = %e, "Failed to append sync log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ScriptedRemote;
    use depot_core::{ErrorKind, LogLevel, Operation};
    use depot_db::StoreConfig;
    use serde_json::json;

    async fn setup(online: bool) -> (SyncEngine, Arc<ScriptedRemote>, LocalStore) {
        let store = LocalStore::open(StoreConfig::in_memory()).await.unwrap();
        let remote = Arc::new(ScriptedRemote::new());
        let engine = SyncEngine::new(
            store.clone(),
            remote.clone(),
            NetworkMonitor::new(online),
            EngineConfig::default(),
        );
        (engine, remote, store)
    }

    #[tokio::test]
    async fn test_empty_queue_logs_once() {
        let (engine, remote, store) = setup(true).await;

        assert_eq!(engine.run_cycle().await.unwrap(), CycleOutcome::Empty);

        let logs = store.logs().list().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Info);
        assert_eq!(logs[0].message, "Nothing to sync.");
        assert_eq!(remote.execute_count(), 0);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn test_entries_replayed_in_fifo_order() {
        let (engine, remote, store) = setup(true).await;
        for i in 1..=3 {
            store
                .queue()
                .enqueue(Operation::delete(format!("/api/products/{}", i)))
                .await
                .unwrap();
        }

        let outcome = engine.run_cycle().await.unwrap();
        match outcome {
            CycleOutcome::Completed(report) => {
                assert_eq!(report.attempted, 3);
                assert_eq!(report.succeeded, 3);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let targets: Vec<String> = remote
            .executed()
            .into_iter()
            .map(|op| op.target_url)
            .collect();
        assert_eq!(
            targets,
            vec!["/api/products/1", "/api/products/2", "/api/products/3"]
        );
        assert_eq!(store.queue().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejection_quarantines_with_detail() {
        let (engine, remote, store) = setup(true).await;
        let entry = store
            .queue()
            .enqueue(Operation::post("/api/products", json!({ "name": "Bolt" })))
            .await
            .unwrap();
        remote.reject(400, json!({ "message": "SKU required" }));

        engine.run_cycle().await.unwrap();

        assert_eq!(store.queue().count().await.unwrap(), 0);
        let quarantined = store.quarantine().get(&entry.id).await.unwrap().unwrap();
        assert_eq!(quarantined.error_detail.message, "SKU required");
        assert_eq!(quarantined.error_detail.kind, ErrorKind::Rejected);
        assert_eq!(quarantined.entry(), entry);

        let logs = store.logs().list().await.unwrap();
        let last = logs.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert_eq!(
            last.message,
            format!("Sync failed for item #{}: SKU required", entry.id)
        );
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_entry_and_backs_off() {
        let (engine, remote, store) = setup(true).await;
        let entry = store
            .queue()
            .enqueue(Operation::delete("/api/products/1"))
            .await
            .unwrap();
        remote.fail(TransportError::Unreachable("connection refused".into()));

        let outcome = engine.run_cycle().await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Completed(CycleReport { retained: 1, .. })
        ));
        assert_eq!(store.queue().get(&entry.id).await.unwrap(), Some(entry.clone()));
        assert_eq!(store.quarantine().count().await.unwrap(), 0);

        let state = store.retries().get(&entry.id).await.unwrap().unwrap();
        assert_eq!(state.attempts, 1);

        // Default backoff is 10 s, so the next cycle defers the entry.
        let outcome = engine.run_cycle().await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Completed(CycleReport {
                attempted: 0,
                deferred: 1,
                ..
            })
        ));
        assert_eq!(remote.execute_count(), 1);
    }

    #[tokio::test]
    async fn test_offline_schedule_touches_nothing() {
        let (engine, remote, store) = setup(false).await;
        store
            .queue()
            .enqueue(Operation::delete("/api/products/1"))
            .await
            .unwrap();
        let revision = store.revision();

        assert_eq!(
            engine.schedule_cycle().await.unwrap(),
            CycleOutcome::Skipped(SkipReason::Offline)
        );
        assert_eq!(remote.execute_count(), 0);
        assert_eq!(store.revision(), revision);
    }

    #[tokio::test]
    async fn test_guard_clears_flag_on_error() {
        let (engine, _remote, store) = setup(true).await;
        store.close().await;

        assert!(engine.run_cycle().await.is_err());
        assert_eq!(engine.state(), EngineState::Idle);
        // Flag released: the next request is not treated as concurrent.
        assert!(!matches!(
            engine.run_cycle().await,
            Ok(CycleOutcome::Skipped(SkipReason::AlreadyRunning))
        ));
    }
}

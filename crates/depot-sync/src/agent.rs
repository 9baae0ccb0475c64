//! # Sync Agent
//!
//! Main orchestrator that owns every sync component.
//!
//! ## Agent Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Agent Lifecycle                            │
//! │                                                                         │
//! │  SyncAgentBuilder::new(config)                                          │
//! │       .with_store(store)          (required)                            │
//! │       .with_remote(remote)        (default: HttpRemote from config)     │
//! │       .with_network(monitor)      (default: online)                     │
//! │       .with_emitter(emitter)      (default: NoOpEmitter)                │
//! │       .build()                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  start() ──► StatusProjector task                                       │
//! │          ──► SyncScheduler task  (interval, reconnect, trigger)        │
//! │          ──► initial BulkRefresh (if enabled and online)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue(op) ──► validate ──► queue ──► trigger                         │
//! │  refresh() / sync_now() / status() / watch_status()                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  shutdown() ──► stop scheduler (awaits in-flight cycle), stop projector│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use depot_core::{validate_operation, Operation, QueueEntry, StatusView};
use depot_db::LocalStore;

use crate::config::SyncConfig;
use crate::engine::{CycleOutcome, EngineConfig, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::network::NetworkMonitor;
use crate::refresh::{BulkRefresh, RefreshEndpoints, RefreshReport};
use crate::remote::{HttpRemote, RemoteService};
use crate::scheduler::{SchedulerHandle, SyncScheduler};
use crate::status::{NoOpEmitter, ProjectorHandle, StatusProjector, SyncEventEmitter};

// =============================================================================
// Sync Agent
// =============================================================================

/// Main sync agent that orchestrates all sync operations.
pub struct SyncAgent {
    /// Sync configuration.
    config: Arc<SyncConfig>,

    store: LocalStore,

    network: NetworkMonitor,

    engine: SyncEngine,

    refresher: BulkRefresh,

    /// Latest projected status.
    status_rx: watch::Receiver<StatusView>,

    /// Taken by `start()`.
    projector: Option<StatusProjector>,

    projector_handle: Option<ProjectorHandle>,

    scheduler: Option<SchedulerHandle>,
}

impl SyncAgent {
    fn new(
        config: SyncConfig,
        store: LocalStore,
        remote: Arc<dyn RemoteService>,
        network: NetworkMonitor,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let engine = SyncEngine::new(
            store.clone(),
            remote.clone(),
            network.clone(),
            EngineConfig::from_config(&config),
        );

        let refresher = BulkRefresh::new(
            store.clone(),
            remote,
            RefreshEndpoints::from_config(&config),
            emitter.clone(),
        );

        let projector = StatusProjector::new(
            store.clone(),
            network.clone(),
            engine.watch_state(),
            emitter,
        );
        let status_rx = projector.subscribe();

        SyncAgent {
            config: Arc::new(config),
            store,
            network,
            engine,
            refresher,
            status_rx,
            projector: Some(projector),
            projector_handle: None,
            scheduler: None,
        }
    }

    /// Starts the background tasks.
    pub async fn start(&mut self) -> SyncResult<()> {
        if self.scheduler.is_some() {
            debug!("Sync agent already started");
            return Ok(());
        }

        self.config.validate()?;

        info!(
            base_url = %self.config.remote.base_url,
            interval_ms = self.config.sync.interval_ms,
            online = self.network.is_online(),
            "Starting sync agent"
        );

        if let Some(projector) = self.projector.take() {
            if let Err(e) = projector.refresh_now().await {
                warn!(error = %e, "Failed to compute initial status");
            }
            self.projector_handle = Some(projector.spawn());
        }

        if self.config.sync.refresh_on_start && self.network.is_online() {
            // Failure is already reported through the emitter notice.
            let _ = self.refresher.refresh().await;
        }

        self.scheduler = Some(SyncScheduler::start(
            self.engine.clone(),
            &self.network,
            self.config.interval(),
        ));

        info!("Sync agent started");
        Ok(())
    }

    /// Stops the background tasks. The running cycle, if any, completes first.
    pub async fn shutdown(&mut self) -> SyncResult<()> {
        info!("Shutting down sync agent");

        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop().await?;
        }

        if let Some(projector) = self.projector_handle.take() {
            projector.stop().await?;
        }

        info!("Sync agent stopped");
        Ok(())
    }

    /// Validates an operation and appends it to the pending queue.
    ///
    /// When the agent is running, a cycle is requested right away.
    pub async fn enqueue(&self, operation: Operation) -> SyncResult<QueueEntry> {
        validate_operation(&operation)?;

        let entry = self.store.queue().enqueue(operation).await?;
        debug!(entry_id = %entry.id, method = %entry.operation.method, "Operation queued");

        if let Some(scheduler) = &self.scheduler {
            scheduler.trigger();
        }

        Ok(entry)
    }

    /// Runs a Bulk Refresh now.
    pub async fn refresh(&self) -> SyncResult<RefreshReport> {
        Ok(self.refresher.refresh().await?)
    }

    /// Runs a cycle now, subject to the offline and in-flight checks.
    pub async fn sync_now(&self) -> SyncResult<CycleOutcome> {
        if self.scheduler.is_none() && self.projector.is_none() {
            return Err(SyncError::ShuttingDown);
        }
        self.engine.schedule_cycle().await
    }

    /// Latest projected status.
    pub fn status(&self) -> StatusView {
        self.status_rx.borrow().clone()
    }

    /// Subscribes to status changes.
    pub fn watch_status(&self) -> watch::Receiver<StatusView> {
        self.status_rx.clone()
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .as_ref()
            .map_or(false, SchedulerHandle::is_running)
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating SyncAgent with options.
pub struct SyncAgentBuilder {
    config: SyncConfig,
    store: Option<LocalStore>,
    remote: Option<Arc<dyn RemoteService>>,
    network: Option<NetworkMonitor>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
}

impl SyncAgentBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: SyncConfig) -> Self {
        SyncAgentBuilder {
            config,
            store: None,
            remote: None,
            network: None,
            emitter: None,
        }
    }

    /// Sets the local store.
    pub fn with_store(mut self, store: LocalStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the remote service.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteService>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the network monitor.
    pub fn with_network(mut self, network: NetworkMonitor) -> Self {
        self.network = Some(network);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builds the SyncAgent.
    pub fn build(self) -> SyncResult<SyncAgent> {
        let store = self
            .store
            .ok_or_else(|| SyncError::InvalidConfig("Local store required".into()))?;

        let remote = match self.remote {
            Some(remote) => remote,
            None => Arc::new(HttpRemote::from_config(&self.config)?),
        };

        let network = self.network.unwrap_or_else(|| NetworkMonitor::new(true));
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        Ok(SyncAgent::new(self.config, store, remote, network, emitter))
    }
}

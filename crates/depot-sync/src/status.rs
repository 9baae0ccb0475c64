//! # Status Projection Service
//!
//! Keeps a live [`StatusView`] for the UI and pushes changes to the
//! [`SyncEventEmitter`].
//!
//! ```text
//!   NetworkMonitor::watch() ──┐
//!   SyncEngine::watch_state() ┼──► recompute ──► distinct? ──► watch::Sender<StatusView>
//!   LocalStore::subscribe() ──┘    (queue count)              └─► emitter.emit_status
//! ```
//!
//! The precedence rules live in [`depot_core::status`].

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use depot_core::{EngineState, StatusView};
use depot_db::LocalStore;

use crate::error::{SyncError, SyncResult};
use crate::network::NetworkMonitor;

// =============================================================================
// Notices
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One-shot message for the user (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub const REFRESHED: &'static str = "Data synced with server";
    pub const REFRESH_FAILED: &'static str = "Could not sync with server. Displaying local data.";

    pub fn refreshed() -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: Self::REFRESHED.to_string(),
        }
    }

    pub fn refresh_failed() -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: Self::REFRESH_FAILED.to_string(),
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Sink for UI-facing events (implemented by the host shell).
pub trait SyncEventEmitter: Send + Sync {
    /// Called with each distinct status view.
    fn emit_status(&self, status: &StatusView);

    /// Called once per bulk refresh.
    fn emit_notice(&self, notice: &Notice);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &StatusView) {}
    fn emit_notice(&self, _notice: &Notice) {}
}

// =============================================================================
// Projection
// =============================================================================

/// Computes the current view from live state.
pub async fn compute_status(
    store: &LocalStore,
    network: &NetworkMonitor,
    engine_state: EngineState,
) -> SyncResult<StatusView> {
    let pending = store.queue().count().await?;
    Ok(StatusView::project(network.is_online(), pending, engine_state))
}

/// Recomputes the status whenever one of its inputs changes.
pub struct StatusProjector {
    store: LocalStore,
    network: NetworkMonitor,
    engine_state: watch::Receiver<EngineState>,
    emitter: Arc<dyn SyncEventEmitter>,
    tx: Arc<watch::Sender<StatusView>>,
}

impl StatusProjector {
    pub fn new(
        store: LocalStore,
        network: NetworkMonitor,
        engine_state: watch::Receiver<EngineState>,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let (tx, _) = watch::channel(StatusView::default());
        StatusProjector {
            store,
            network,
            engine_state,
            emitter,
            tx: Arc::new(tx),
        }
    }

    /// Subscribes to published views.
    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.tx.subscribe()
    }

    /// Recomputes and publishes immediately.
    pub async fn refresh_now(&self) -> SyncResult<StatusView> {
        let engine_state = *self.engine_state.borrow();
        let view = compute_status(&self.store, &self.network, engine_state).await?;
        self.publish(view.clone());
        Ok(view)
    }

    /// Publishes `view` if it differs from the current one.
    fn publish(&self, view: StatusView) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view.clone();
                true
            }
        });

        if changed {
            debug!(label = %view.label, pending = view.pending_count, "Status changed");
            self.emitter.emit_status(&view);
        }
    }

    /// Spawns the projection task.
    pub fn spawn(self) -> ProjectorHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        ProjectorHandle { shutdown_tx, task }
    }

    async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut network_rx = self.network.watch();
        let mut revision_rx = self.store.subscribe();

        info!("Status projector started");

        loop {
            if let Err(e) = self.refresh_now().await {
                warn!(error = %e, "Failed to compute sync status");
            }

            let closed = tokio::select! {
                changed = network_rx.changed() => changed.is_err(),
                changed = self.engine_state.changed() => changed.is_err(),
                changed = revision_rx.changed() => changed.is_err(),
                _ = shutdown_rx.recv() => true,
            };

            if closed {
                break;
            }
        }

        info!("Status projector stopped");
    }
}

/// Controls a running [`StatusProjector`].
pub struct ProjectorHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ProjectorHandle {
    pub async fn stop(self) -> SyncResult<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| SyncError::ChannelError(format!("projector task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::{Operation, Severity};
    use depot_db::StoreConfig;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingEmitter {
        statuses: Mutex<Vec<StatusView>>,
    }

    impl SyncEventEmitter for RecordingEmitter {
        fn emit_status(&self, status: &StatusView) {
            self.statuses.lock().unwrap().push(status.clone());
        }
        fn emit_notice(&self, _notice: &Notice) {}
    }

    async fn wait_for_label(rx: &mut watch::Receiver<StatusView>, label: &str) {
        let reached = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|view| view.label == label),
        )
        .await
        .map_or(false, |seen| seen.is_ok());
        assert!(
            reached,
            "status never became {:?}, last: {:?}",
            label,
            *rx.borrow()
        );
    }

    #[tokio::test]
    async fn test_compute_status() {
        let store = LocalStore::open(StoreConfig::in_memory()).await.unwrap();
        let network = NetworkMonitor::new(true);

        let view = compute_status(&store, &network, EngineState::Idle).await.unwrap();
        assert_eq!(view.label, "Online");
        assert_eq!(view.severity, Severity::Ok);

        store
            .queue()
            .enqueue(Operation::delete("/api/products/1"))
            .await
            .unwrap();
        let view = compute_status(&store, &network, EngineState::Idle).await.unwrap();
        assert_eq!(view.label, "Pending (1)");

        network.set_online(false);
        let view = compute_status(&store, &network, EngineState::Running).await.unwrap();
        assert_eq!(view.label, "Offline (1 pending)");
    }

    #[tokio::test]
    async fn test_projector_follows_inputs() {
        let store = LocalStore::open(StoreConfig::in_memory()).await.unwrap();
        let network = NetworkMonitor::new(true);
        let (engine_tx, engine_rx) = watch::channel(EngineState::Idle);
        let emitter = Arc::new(RecordingEmitter::default());

        let projector =
            StatusProjector::new(store.clone(), network.clone(), engine_rx, emitter.clone());
        let mut rx = projector.subscribe();
        let handle = projector.spawn();

        store
            .queue()
            .enqueue(Operation::delete("/api/products/1"))
            .await
            .unwrap();
        wait_for_label(&mut rx, "Pending (1)").await;

        engine_tx.send_replace(EngineState::Running);
        wait_for_label(&mut rx, "Syncing...").await;

        network.set_online(false);
        wait_for_label(&mut rx, "Offline (1 pending)").await;

        handle.stop().await.unwrap();

        let statuses = emitter.statuses.lock().unwrap();
        assert!(statuses.iter().any(|s| s.label == "Syncing..."));
        // Only distinct views are emitted.
        assert!(statuses.windows(2).all(|pair| pair[0] != pair[1]));
    }
}

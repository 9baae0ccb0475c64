//! # Sync Scheduler
//!
//! Decides when the engine runs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Scheduler Task                                    │
//! │                                                                         │
//! │   interval tick ─────────┐     (first tick immediate)                  │
//! │   offline → online ──────┼──► spawn schedule_cycle() ──► JoinSet        │
//! │   SchedulerHandle::      │                                              │
//! │     trigger() ───────────┘                                              │
//! │                                                                         │
//! │   shutdown ──► stop scheduling, await spawned cycles, exit             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cycles run on their own tasks so the loop keeps ticking while one is in
//! flight; those ticks hit the engine's in-flight flag and are dropped.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::network::NetworkMonitor;

/// Shortest interval the ticker accepts.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// What asked for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleTrigger {
    Interval,
    Reconnect,
    Manual,
}

/// Periodic and event-driven cycle scheduling.
pub struct SyncScheduler {
    engine: SyncEngine,
    network_rx: watch::Receiver<bool>,
    interval: Duration,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SyncScheduler {
    /// Spawns the scheduler task. Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn start(engine: SyncEngine, network: &NetworkMonitor, interval: Duration) -> SchedulerHandle {
        let interval = if interval < MIN_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                min_ms = MIN_INTERVAL.as_millis() as u64,
                "Sync interval too short, clamping"
            );
            MIN_INTERVAL
        } else {
            interval
        };

        // One pending manual trigger is enough; extras coalesce.
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let scheduler = SyncScheduler {
            engine,
            network_rx: network.watch(),
            interval,
            trigger_rx,
            shutdown_rx,
        };

        let task = tokio::spawn(scheduler.run());

        SchedulerHandle {
            trigger_tx,
            shutdown_tx,
            task,
        }
    }

    async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Sync scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = JoinSet::new();
        let mut network_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.spawn_cycle(&mut cycles, CycleTrigger::Interval);
                }

                changed = self.network_rx.changed(), if network_open => {
                    match changed {
                        Ok(()) => {
                            if *self.network_rx.borrow_and_update() {
                                info!("Back online, triggering sync");
                                self.spawn_cycle(&mut cycles, CycleTrigger::Reconnect);
                            }
                        }
                        Err(_) => {
                            debug!("Network monitor dropped, reconnect trigger disabled");
                            network_open = false;
                        }
                    }
                }

                Some(()) = self.trigger_rx.recv() => {
                    self.spawn_cycle(&mut cycles, CycleTrigger::Manual);
                }

                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Sync cycle task panicked");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sync scheduler received shutdown");
                    break;
                }
            }
        }

        // No cancellation: let the running cycle finish.
        while let Some(joined) = cycles.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Sync cycle task panicked");
            }
        }

        info!("Sync scheduler stopped");
    }

    fn spawn_cycle(&self, cycles: &mut JoinSet<()>, trigger: CycleTrigger) {
        let engine = self.engine.clone();
        cycles.spawn(async move {
            match engine.schedule_cycle().await {
                Ok(outcome) => debug!(?trigger, ?outcome, "Cycle request handled"),
                Err(e) => error!(?trigger, error = %e, "Sync cycle failed"),
            }
        });
    }
}

// =============================================================================
// Scheduler Handle
// =============================================================================

/// Controls a running [`SyncScheduler`].
///
/// Dropping the handle also stops the scheduler, without waiting for it.
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Requests a cycle now. Returns false if the scheduler has stopped.
    pub fn trigger(&self) -> bool {
        match self.trigger_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops scheduling and waits for the in-flight cycle to finish.
    pub async fn stop(self) -> SyncResult<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| SyncError::Internal(format!("scheduler task failed: {}", e)))
    }
}

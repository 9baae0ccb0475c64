//! # depot-sync: Sync Engine for Depot
//!
//! Replays operations recorded while offline against the inventory server and
//! keeps the local product and movement mirrors fresh.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Agent Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncAgent (Main Orchestrator)               │  │
//! │  │                                                                  │  │
//! │  │  enqueue() validates and appends to the pending queue           │  │
//! │  │  start() / shutdown() own the background tasks                  │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SyncScheduler  │  │  SyncEngine    │  │  BulkRefresh           │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Interval tick  │─►│ In-flight flag │  │ GET products +         │    │
//! │  │ Reconnect      │  │ FIFO replay    │  │ movements, replace     │    │
//! │  │ Manual trigger │  │ Classify,      │  │ both mirrors in one    │    │
//! │  │                │  │ quarantine     │  │ transaction            │    │
//! │  └────────────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │                              │                       │                  │
//! │                              ▼                       ▼                  │
//! │                      ┌─────────────────────────────────────┐           │
//! │                      │ RemoteService (HttpRemote, reqwest) │           │
//! │                      └─────────────────────────────────────┘           │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────────────────────────────────┐    │
//! │  │ NetworkMonitor │─►│ StatusProjector                            │    │
//! │  │ online/offline │  │ Offline(n) > Syncing > Pending(n) > Online │    │
//! │  └────────────────┘  └────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  UI EVENTS (SyncEventEmitter):                                         │
//! │  • emit_status - every distinct StatusView                             │
//! │  • emit_notice - once per bulk refresh                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - Main `SyncAgent` orchestrator
//! - [`config`] - Agent configuration (server, interval, retry)
//! - [`engine`] - Queue drain cycle
//! - [`error`] - Sync error types
//! - [`network`] - Connectivity monitor
//! - [`outcome`] - Result classification and retry policy
//! - [`refresh`] - Bulk refresh of local mirrors
//! - [`remote`] - Remote service trait and HTTP client
//! - [`scheduler`] - Cycle scheduling
//! - [`status`] - Status projection and UI events
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_sync::{SyncAgentBuilder, SyncConfig};
//! use depot_db::{LocalStore, StoreConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let store = LocalStore::open(StoreConfig::new(&config.store.path)).await?;
//!
//! let mut agent = SyncAgentBuilder::new(config).with_store(store).build()?;
//! agent.start().await?;
//!
//! agent.enqueue(Operation::post("/api/inventory/movement", body)).await?;
//! println!("{}", agent.status().label);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod outcome;
pub mod refresh;
pub mod remote;
pub mod scheduler;
pub mod status;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use agent::{SyncAgent, SyncAgentBuilder};
pub use config::SyncConfig;
pub use engine::{CycleOutcome, CycleReport, EngineConfig, SkipReason, SyncEngine};
pub use error::{FetchError, RefreshError, SyncError, SyncResult, TransportError};
pub use network::{NetworkMonitor, Subscription};
pub use outcome::{classify, Outcome, RetryDecision, RetryPolicy};
pub use refresh::{BulkRefresh, RefreshEndpoints, RefreshReport};
pub use remote::{interpret_response, HttpRemote, RemoteReply, RemoteService, ScriptedRemote};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use status::{
    compute_status, NoOpEmitter, Notice, NoticeLevel, ProjectorHandle, StatusProjector,
    SyncEventEmitter,
};

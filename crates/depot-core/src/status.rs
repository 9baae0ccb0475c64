//! # Status Projection
//!
//! Collapses connectivity, queue depth and engine state into the single
//! status a UI shows.
//!
//! ## Precedence
//! ```text
//!   is_online == false ──────────────► Offline { pending }
//!        │
//!   engine == Running ───────────────► Syncing
//!        │
//!   pending > 0 ─────────────────────► Pending { pending }
//!        │
//!   otherwise ───────────────────────► OnlineIdle
//! ```
//!
//! [`project`] is pure; the service that feeds it lives in `depot-sync`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Whether a sync cycle is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum EngineState {
    #[default]
    Idle,
    Running,
}

impl EngineState {
    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::Running)
    }
}

/// The projected sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncStatus {
    /// No connectivity; `pending` operations are waiting.
    Offline { pending: u64 },
    /// A cycle is in progress.
    Syncing,
    /// Online, idle, with operations still queued.
    Pending { pending: u64 },
    /// Online, idle, nothing queued.
    OnlineIdle,
}

/// Visual class of a status, for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Offline,
    Syncing,
    Pending,
    Ok,
}

impl SyncStatus {
    /// Human-readable label.
    pub fn label(&self) -> String {
        match self {
            SyncStatus::Offline { pending } => format!("Offline ({} pending)", pending),
            SyncStatus::Syncing => "Syncing...".to_string(),
            SyncStatus::Pending { pending } => format!("Pending ({})", pending),
            SyncStatus::OnlineIdle => "Online".to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SyncStatus::Offline { .. } => Severity::Offline,
            SyncStatus::Syncing => Severity::Syncing,
            SyncStatus::Pending { .. } => Severity::Pending,
            SyncStatus::OnlineIdle => Severity::Ok,
        }
    }

    /// Pending count carried by the variant, if any.
    pub fn pending(&self) -> Option<u64> {
        match self {
            SyncStatus::Offline { pending } | SyncStatus::Pending { pending } => Some(*pending),
            SyncStatus::Syncing | SyncStatus::OnlineIdle => None,
        }
    }

    /// Renders the status for presentation, with the current queue depth.
    pub fn view(&self, pending_count: u64) -> StatusView {
        StatusView::new(*self, pending_count)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Derives the status from its three inputs.
pub fn project(is_online: bool, pending_count: u64, engine: EngineState) -> SyncStatus {
    if !is_online {
        SyncStatus::Offline {
            pending: pending_count,
        }
    } else if engine.is_running() {
        SyncStatus::Syncing
    } else if pending_count > 0 {
        SyncStatus::Pending {
            pending: pending_count,
        }
    } else {
        SyncStatus::OnlineIdle
    }
}

/// Flattened status for presentation layers.
///
/// `pending_count` is always the current queue depth, including while
/// syncing, so a UI can show progress alongside the spinner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub label: String,
    pub severity: Severity,
    pub pending_count: u64,
}

impl StatusView {
    pub fn new(status: SyncStatus, pending_count: u64) -> Self {
        StatusView {
            label: status.label(),
            severity: status.severity(),
            pending_count,
        }
    }

    /// Projects and renders in one step.
    pub fn project(is_online: bool, pending_count: u64, engine: EngineState) -> Self {
        Self::new(project(is_online, pending_count, engine), pending_count)
    }
}

impl Default for StatusView {
    fn default() -> Self {
        StatusView::project(true, 0, EngineState::Idle)
    }
}

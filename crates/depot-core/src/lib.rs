//! # depot-core: Pure Domain Logic for Depot
//!
//! This crate holds the records that flow through the offline sync engine and
//! the pure functions that make decisions about them. It has zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Presentation layer (any UI)                      │   │
//! │  │    Status badge ◄── StatusView { label, severity, pendingCount } │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                depot-sync (engine, refresh, scheduler)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ depot-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │  status   │  │ validation│                  │   │
//! │  │   │ QueueEntry│  │ project() │  │ operation │                  │   │
//! │  │   │ LogEntry  │  │ StatusView│  │  checks   │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    depot-db (Local Store)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Queue, quarantine, log and mirror records
//! - [`status`] - The status projector (pure function)
//! - [`error`] - Domain error types
//! - [`validation`] - Checks run before an operation is queued
//!
//! ## Example Usage
//!
//! ```rust
//! use depot_core::status::{project, EngineState, SyncStatus};
//!
//! let status = project(false, 3, EngineState::Idle);
//! assert_eq!(status, SyncStatus::Offline { pending: 3 });
//! assert_eq!(status.label(), "Offline (3 pending)");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use status::{project, EngineState, Severity, StatusView, SyncStatus};
pub use types::*;
pub use validation::validate_operation;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default period between scheduled sync cycles, in milliseconds.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 10_000;

/// Longest target URL accepted into the queue.
pub const MAX_TARGET_URL_LEN: usize = 2048;

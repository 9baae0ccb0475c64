//! # Depot Agent
//!
//! Headless runner for the offline mutation queue: drains pending operations
//! against the inventory server and keeps the local mirrors fresh.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Agent Startup                                   │
//! │                                                                         │
//! │  1. Initialize Logging ───────────────────────────────────────────────► │
//! │     • tracing-subscriber with env filter                                │
//! │     • Default: info,depot=debug,sqlx=warn (override with RUST_LOG)      │
//! │                                                                         │
//! │  2. Load Configuration ───────────────────────────────────────────────► │
//! │     • --config <path>, else the platform config dir                     │
//! │     • DEPOT_* environment overrides                                     │
//! │                                                                         │
//! │  3. Open Local Store ─────────────────────────────────────────────────► │
//! │     • SQLite with WAL mode, migrations applied                          │
//! │                                                                         │
//! │  4. Start Sync Agent ─────────────────────────────────────────────────► │
//! │     • initial bulk refresh, scheduler, status projector                 │
//! │                                                                         │
//! │  5. Wait for Ctrl-C, then shut down ──────────────────────────────────► │
//! │     • in-flight cycle completes, store closed                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! depot-agent
//! depot-agent --config ./depot.toml
//! depot-agent --offline          # start with the network marked down
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use depot_core::StatusView;
use depot_db::{LocalStore, StoreConfig};
use depot_sync::{
    NetworkMonitor, Notice, NoticeLevel, SyncAgentBuilder, SyncConfig, SyncEventEmitter,
};

/// Forwards UI events to the log.
struct TracingEmitter;

impl SyncEventEmitter for TracingEmitter {
    fn emit_status(&self, status: &StatusView) {
        info!(
            label = %status.label,
            pending = status.pending_count,
            "Sync status"
        );
    }

    fn emit_notice(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Success => info!("{}", notice.message),
            NoticeLevel::Error => warn!("{}", notice.message),
        }
    }
}

/// Headless Depot sync agent.
#[derive(Debug, Parser)]
#[command(name = "depot-agent")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    DEPOT_BASE_URL, DEPOT_STORE_PATH, DEPOT_SYNC_INTERVAL_MS,\n    DEPOT_REQUEST_TIMEOUT_MS, DEPOT_MAX_ATTEMPTS, RUST_LOG")]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Start with the network marked offline
    #[arg(long)]
    offline: bool,
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=depot=trace` - Show trace for depot crates only
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,depot=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting Depot agent");

    let config = SyncConfig::load(cli.config)?;

    if let Some(parent) = config.store.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    info!(path = ?config.store.path, "Opening local store");
    let store = LocalStore::open(StoreConfig::new(&config.store.path)).await?;

    // No platform connectivity signal in a headless process; assume online
    // unless told otherwise.
    let network = NetworkMonitor::new(!cli.offline);

    let mut agent = SyncAgentBuilder::new(config)
        .with_store(store.clone())
        .with_network(network)
        .with_emitter(Arc::new(TracingEmitter))
        .build()?;

    agent.start().await?;
    info!(status = %agent.status().label, "Agent running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }

    agent.shutdown().await?;
    store.close().await;

    info!("Depot agent stopped");
    Ok(())
}

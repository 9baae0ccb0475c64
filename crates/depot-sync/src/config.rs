//! # Sync Configuration
//!
//! Configuration management for the sync agent.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DEPOT_BASE_URL=https://inventory.example.com                       │
//! │     DEPOT_SYNC_INTERVAL_MS=10000                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/depot-agent/depot.toml (Linux)                           │
//! │     ~/Library/Application Support/com.depot.agent/depot.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     10 s sync interval, 30 s request timeout, 20 retry attempts        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # depot.toml
//! [store]
//! path = "depot.db"
//!
//! [remote]
//! base_url = "http://localhost:3000"
//! products_path = "/api/products?limit=1000"
//! movements_path = "/api/inventory/movement?limit=1000"
//! request_timeout_ms = 30000
//!
//! [sync]
//! interval_ms = 10000
//! refresh_on_start = true
//!
//! [retry]
//! max_attempts = 20        # 0 = retry forever
//! initial_backoff_ms = 10000
//! max_backoff_ms = 300000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use depot_core::DEFAULT_SYNC_INTERVAL_MS;

use crate::error::{SyncError, SyncResult};
use crate::outcome::RetryPolicy;

// =============================================================================
// Store Settings
// =============================================================================

/// Where the Local Store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("com", "depot", "agent")
        .map(|dirs| dirs.data_dir().join("depot.db"))
        .unwrap_or_else(|| PathBuf::from("depot.db"))
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            path: default_store_path(),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// The inventory server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL relative operation targets are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bulk refresh endpoint for products.
    #[serde(default = "default_products_path")]
    pub products_path: String,

    /// Bulk refresh endpoint for stock movements.
    #[serde(default = "default_movements_path")]
    pub movements_path: String,

    /// Upper bound on a single remote call (milliseconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_products_path() -> String {
    "/api/products?limit=1000".to_string()
}
fn default_movements_path() -> String {
    "/api/inventory/movement?limit=1000".to_string()
}
fn default_request_timeout() -> u64 {
    30_000
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            products_path: default_products_path(),
            movements_path: default_movements_path(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Scheduling behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Period between scheduled cycles (milliseconds).
    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    /// Run a bulk refresh when the agent starts.
    #[serde(default = "default_true")]
    pub refresh_on_start: bool,
}

fn default_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_MS
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_ms: default_interval(),
            refresh_on_start: true,
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Backoff for entries that hit transport errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Consecutive transport failures before an entry is quarantined.
    /// Set to 0 to retry forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Ceiling for the doubling delay (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    20
}
fn default_initial_backoff() -> u64 {
    10_000
}
fn default_max_backoff() -> u64 {
    300_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl SyncConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (depot.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = url::Url::parse(&self.remote.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Base URL must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }

        if self.sync.interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.interval_ms must be greater than 0".into(),
            ));
        }

        if self.remote.request_timeout_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "remote.request_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(SyncError::InvalidConfig(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("DEPOT_STORE_PATH") {
            debug!(path = %path, "Overriding store path from environment");
            self.store.path = PathBuf::from(path);
        }

        if let Some(url) = lookup("DEPOT_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.remote.base_url = url;
        }

        if let Some(value) = lookup("DEPOT_SYNC_INTERVAL_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.sync.interval_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid DEPOT_SYNC_INTERVAL_MS"),
            }
        }

        if let Some(value) = lookup("DEPOT_REQUEST_TIMEOUT_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.remote.request_timeout_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid DEPOT_REQUEST_TIMEOUT_MS"),
            }
        }

        if let Some(value) = lookup("DEPOT_MAX_ATTEMPTS") {
            match value.parse::<u32>() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!(value = %value, "Ignoring invalid DEPOT_MAX_ATTEMPTS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "depot", "agent")
            .map(|dirs| dirs.config_dir().join("depot.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Period between scheduled cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.sync.interval_ms)
    }

    /// Per-call timeout for remote requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.request_timeout_ms)
    }

    /// Backoff policy for transport failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.sync.interval_ms, 10_000);
        assert_eq!(config.remote.request_timeout_ms, 30_000);
        assert_eq!(config.retry.max_attempts, 20);
        assert!(config.sync.refresh_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.remote.base_url = "ws://localhost:3000".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.remote.base_url = "not a url".into();
        assert!(config.validate().is_err());

        config.remote.base_url = "https://inventory.example.com".into();
        assert!(config.validate().is_ok());

        config.sync.interval_ms = 0;
        assert!(config.validate().is_err());
        config.sync.interval_ms = 5_000;

        config.retry.initial_backoff_ms = 600_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [remote]
            base_url = "https://inventory.example.com"

            [retry]
            max_attempts = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.base_url, "https://inventory.example.com");
        assert_eq!(config.remote.products_path, "/api/products?limit=1000");
        assert_eq!(config.retry.max_attempts, 0);
        assert_eq!(config.sync.interval_ms, 10_000);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEPOT_BASE_URL", "https://override.example.com"),
            ("DEPOT_SYNC_INTERVAL_MS", "2500"),
            ("DEPOT_MAX_ATTEMPTS", "not-a-number"),
            ("DEPOT_STORE_PATH", "/tmp/override.db"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.remote.base_url, "https://override.example.com");
        assert_eq!(config.sync.interval_ms, 2_500);
        assert_eq!(config.retry.max_attempts, 20);
        assert_eq!(config.store.path, PathBuf::from("/tmp/override.db"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.toml");
        std::fs::write(&path, "[sync]\ninterval_ms = 1234\nrefresh_on_start = false\n").unwrap();

        let config = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(config.sync.interval_ms, 1234);
        assert!(!config.sync.refresh_on_start);
    }

    #[test]
    fn test_toml_round_trip_has_sections() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[remote]"));
        assert!(toml_str.contains("[retry]"));
    }
}

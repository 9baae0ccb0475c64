//! # Bulk Refresh
//!
//! Pulls the full product and movement lists from the server and replaces the
//! local mirrors.
//!
//! ```text
//!   fetch products ──┐
//!                    ├── both ok ──► one transaction:
//!   fetch movements ─┘                 clear products,  put all
//!          │                           clear movements, put all
//!          └── any failure ──► mirrors untouched
//! ```
//!
//! The pending queue and quarantine are never read or written here.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use depot_core::{Movement, Product};
use depot_db::{Collection, LocalStore};

use crate::config::SyncConfig;
use crate::error::RefreshError;
use crate::remote::RemoteService;
use crate::status::{Notice, SyncEventEmitter};

/// Server paths for the two mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEndpoints {
    pub products: String,
    pub movements: String,
}

impl Default for RefreshEndpoints {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl RefreshEndpoints {
    pub fn from_config(config: &SyncConfig) -> Self {
        RefreshEndpoints {
            products: config.remote.products_path.clone(),
            movements: config.remote.movements_path.clone(),
        }
    }
}

/// Records written by a successful refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub products: usize,
    pub movements: usize,
}

/// Replaces the local mirrors with the server's data.
#[derive(Clone)]
pub struct BulkRefresh {
    store: LocalStore,
    remote: Arc<dyn RemoteService>,
    endpoints: RefreshEndpoints,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl BulkRefresh {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteService>,
        endpoints: RefreshEndpoints,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        BulkRefresh {
            store,
            remote,
            endpoints,
            emitter,
        }
    }

    /// Runs one refresh and emits the matching notice.
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let result = self.fetch_and_replace().await;

        match &result {
            Ok(report) => {
                info!(
                    products = report.products,
                    movements = report.movements,
                    "Local mirrors refreshed"
                );
                self.emitter.emit_notice(&Notice::refreshed());
            }
            Err(e) => {
                warn!(error = %e, "Bulk refresh failed, keeping local data");
                self.emitter.emit_notice(&Notice::refresh_failed());
            }
        }

        result
    }

    async fn fetch_and_replace(&self) -> Result<RefreshReport, RefreshError> {
        let remote = &*self.remote;
        let (products, movements) = tokio::try_join!(
            fetch_collection::<Product>(remote, &self.endpoints.products, "products"),
            fetch_collection::<Movement>(remote, &self.endpoints.movements, "movements"),
        )?;

        self.store
            .transaction(&[Collection::Products, Collection::Movements], |batch| {
                batch.clear(Collection::Products)?;
                batch.bulk_put(Collection::Products, &products)?;
                batch.clear(Collection::Movements)?;
                batch.bulk_put(Collection::Movements, &movements)
            })
            .await?;

        Ok(RefreshReport {
            products: products.len(),
            movements: movements.len(),
        })
    }
}

/// Fetches `{ "<collection>": [...] }` and decodes the array.
async fn fetch_collection<T: DeserializeOwned>(
    remote: &dyn RemoteService,
    path: &str,
    collection: &'static str,
) -> Result<Vec<T>, RefreshError> {
    let mut body = remote
        .fetch(path)
        .await
        .map_err(|source| RefreshError::Fetch { collection, source })?;

    let records = match body.get_mut(collection).map(Value::take) {
        Some(records @ Value::Array(_)) => records,
        _ => return Err(RefreshError::MissingField { collection }),
    };

    serde_json::from_value(records).map_err(|e| RefreshError::Parse {
        collection,
        reason: e.to_string(),
    })
}

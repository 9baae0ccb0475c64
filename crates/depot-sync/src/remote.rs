//! # Remote Service
//!
//! The narrow interface to the inventory server, plus its HTTP implementation.
//!
//! ## Reply Interpretation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  execute(op)                                                            │
//! │       │                                                                 │
//! │       ├── no response / timeout ─────────► Err(TransportError)          │
//! │       │                                                                 │
//! │       ├── 2xx ───────────────────────────► Ok(Accepted)                 │
//! │       │                                                                 │
//! │       ├── non-2xx, JSON body ────────────► Ok(Rejected { detail })      │
//! │       │     message = body.message | body.error | "HTTP <status>"      │
//! │       │                                                                 │
//! │       └── non-2xx, body not JSON ────────► Err(MalformedResponse)       │
//! │             (proxies and gateways; retried like a network error)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;
use url::Url;

use depot_core::{ErrorDetail, HttpMethod, Operation};

use crate::config::SyncConfig;
use crate::error::{FetchError, SyncError, SyncResult, TransportError};

// =============================================================================
// Reply
// =============================================================================

/// A response from the server to a replayed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteReply {
    /// The server applied the operation.
    Accepted { status: u16 },
    /// The server refused the operation with a structured error.
    Rejected { detail: ErrorDetail },
}

/// Interprets a raw HTTP status and body.
pub fn interpret_response(status: u16, body: &[u8]) -> Result<RemoteReply, TransportError> {
    if (200..300).contains(&status) {
        return Ok(RemoteReply::Accepted { status });
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Ok(RemoteReply::Rejected {
            detail: ErrorDetail::rejected(status, value),
        }),
        Err(e) => Err(TransportError::MalformedResponse {
            status,
            reason: e.to_string(),
        }),
    }
}

// =============================================================================
// Remote Service Trait
// =============================================================================

/// The inventory server as seen by the sync engine and bulk refresh.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Replays one queued operation.
    async fn execute(&self, operation: &Operation) -> Result<RemoteReply, TransportError>;

    /// `GET`s a JSON document (bulk refresh).
    async fn fetch(&self, path: &str) -> Result<Value, FetchError>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// [`RemoteService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpRemote {
    /// Creates a client for `base_url`. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpRemote {
            client,
            base_url,
            timeout,
        })
    }

    /// Creates a client from the `[remote]` section.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.remote.base_url, config.request_timeout())
    }

    /// Resolves a target against the base URL. Absolute targets are kept.
    pub fn resolve(&self, target: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(target)
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn execute(&self, operation: &Operation) -> Result<RemoteReply, TransportError> {
        let url = self.resolve(&operation.target_url).map_err(|e| {
            TransportError::Unreachable(format!("invalid target '{}': {}", operation.target_url, e))
        })?;

        debug!(method = %operation.method, url = %url, "Replaying operation");

        let mut request = self
            .client
            .request(to_reqwest_method(operation.method), url)
            .header(CONTENT_TYPE, "application/json");

        if operation.method.allows_body() && operation.has_body() {
            request = request.json(&operation.body);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        interpret_response(status, &body)
    }

    async fn fetch(&self, path: &str) -> Result<Value, FetchError> {
        let url = self
            .resolve(path)
            .map_err(|e| TransportError::Unreachable(format!("invalid path '{}': {}", path, e)))?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

// =============================================================================
// Scripted Implementation
// =============================================================================

/// Deterministic in-memory [`RemoteService`] for tests and demos.
///
/// `execute` pops scripted replies in order and answers `Accepted` once the
/// script runs out. `fetch` answers per path and fails with `404` for paths
/// that were never scripted. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    replies: Mutex<VecDeque<Result<RemoteReply, TransportError>>>,
    documents: Mutex<HashMap<String, Result<Value, FetchError>>>,
    executed: Mutex<Vec<Operation>>,
    fetched: Mutex<Vec<String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the reply for the next `execute` call.
    pub fn push_reply(&self, reply: Result<RemoteReply, TransportError>) -> &Self {
        locked(&self.replies).push_back(reply);
        self
    }

    /// Queues an `Accepted` reply.
    pub fn accept(&self) -> &Self {
        self.push_reply(Ok(RemoteReply::Accepted { status: 200 }))
    }

    /// Queues a rejection with the given status and JSON body.
    pub fn reject(&self, status: u16, body: Value) -> &Self {
        self.push_reply(Ok(RemoteReply::Rejected {
            detail: ErrorDetail::rejected(status, body),
        }))
    }

    /// Queues a transport failure.
    pub fn fail(&self, error: TransportError) -> &Self {
        self.push_reply(Err(error))
    }

    /// Sets the answer for `fetch(path)`.
    pub fn set_document(&self, path: impl Into<String>, document: Result<Value, FetchError>) {
        locked(&self.documents).insert(path.into(), document);
    }

    /// Operations passed to `execute`, in call order.
    pub fn executed(&self) -> Vec<Operation> {
        locked(&self.executed).clone()
    }

    /// Number of `execute` calls.
    pub fn execute_count(&self) -> usize {
        locked(&self.executed).len()
    }

    /// Paths passed to `fetch`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        locked(&self.fetched).clone()
    }
}

#[async_trait]
impl RemoteService for ScriptedRemote {
    async fn execute(&self, operation: &Operation) -> Result<RemoteReply, TransportError> {
        locked(&self.executed).push(operation.clone());
        locked(&self.replies)
            .pop_front()
            .unwrap_or(Ok(RemoteReply::Accepted { status: 200 }))
    }

    async fn fetch(&self, path: &str) -> Result<Value, FetchError> {
        locked(&self.fetched).push(path.to_string());
        locked(&self.documents)
            .get(path)
            .cloned()
            .unwrap_or(Err(FetchError::Status { status: 404 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_success_statuses_are_accepted() {
        assert_eq!(
            interpret_response(201, b"").unwrap(),
            RemoteReply::Accepted { status: 201 }
        );
        assert_eq!(
            interpret_response(204, b"not json at all").unwrap(),
            RemoteReply::Accepted { status: 204 }
        );
    }

    #[test]
    fn test_json_failure_is_rejection() {
        let reply = interpret_response(422, br#"{"message":"SKU already exists"}"#).unwrap();
        match reply {
            RemoteReply::Rejected { detail } => {
                assert_eq!(detail.message, "SKU already exists");
                assert_eq!(detail.status, Some(422));
                assert_eq!(detail.kind, ErrorKind::Rejected);
                assert_eq!(detail.body, json!({ "message": "SKU already exists" }));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_failure_is_transport_error() {
        let err = interpret_response(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, TransportError::MalformedResponse { status: 502, .. }));

        let err = interpret_response(500, b"").unwrap_err();
        assert!(matches!(err, TransportError::MalformedResponse { status: 500, .. }));
    }

    #[test]
    fn test_resolve_relative_and_absolute_targets() {
        let remote = HttpRemote::new("http://localhost:3000", Duration::from_secs(5)).unwrap();

        assert_eq!(
            remote.resolve("/api/products/9").unwrap().as_str(),
            "http://localhost:3000/api/products/9"
        );
        assert_eq!(
            remote.resolve("/api/products?limit=1000").unwrap().as_str(),
            "http://localhost:3000/api/products?limit=1000"
        );
        assert_eq!(
            remote.resolve("https://other.example.com/x").unwrap().as_str(),
            "https://other.example.com/x"
        );
    }

    #[tokio::test]
    async fn test_scripted_remote_plays_script_in_order() {
        let remote = ScriptedRemote::new();
        remote
            .accept()
            .reject(409, json!({ "error": "conflict" }))
            .fail(TransportError::Unreachable("down".into()));

        let op = Operation::delete("/api/products/1");
        assert!(matches!(remote.execute(&op).await, Ok(RemoteReply::Accepted { .. })));
        assert!(matches!(remote.execute(&op).await, Ok(RemoteReply::Rejected { .. })));
        assert!(remote.execute(&op).await.is_err());
        // Script exhausted: default to accepted.
        assert!(matches!(remote.execute(&op).await, Ok(RemoteReply::Accepted { .. })));
        assert_eq!(remote.execute_count(), 4);
    }

    #[tokio::test]
    async fn test_scripted_fetch_unknown_path_is_404() {
        let remote = ScriptedRemote::new();
        remote.set_document("/api/products", Ok(json!({ "products": [] })));

        assert!(remote.fetch("/api/products").await.is_ok());
        assert_eq!(
            remote.fetch("/api/other").await.unwrap_err(),
            FetchError::Status { status: 404 }
        );
        assert_eq!(remote.fetched(), vec!["/api/products", "/api/other"]);
    }
}

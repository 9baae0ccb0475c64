//! # Domain Types
//!
//! Records that flow through the offline queue and the local mirrors.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   QueueEntry    │   │ QuarantineEntry │   │    LogEntry     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  id, operation  │   │  id (UUID)      │       │
//! │  │  operation      │   │  errorDetail    │   │  level          │       │
//! │  │  enqueuedAt     │   │  quarantinedAt  │   │  message        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Operation    │   │    Product      │   │    Movement     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  targetUrl      │   │  _id (server)   │   │  _id (server)   │       │
//! │  │  method         │   │  name, sku      │   │  productId      │       │
//! │  │  body (JSON)    │   │  currentStock   │   │  type, quantity │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queue-side ids are UUID v4 strings assigned locally; mirror ids are
//! whatever the server assigned (`_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;

// =============================================================================
// Keyed Records
// =============================================================================

/// A record with a stable primary key inside its collection.
pub trait Keyed {
    /// Returns the record's key.
    fn key(&self) -> &str;
}

// =============================================================================
// HTTP Method
// =============================================================================

/// The HTTP verb a queued operation is replayed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Returns the canonical upper-case verb.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Returns true if a request body may be sent with this method.
    pub const fn allows_body(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(CoreError::UnknownMethod(other.to_string())),
        }
    }
}

// =============================================================================
// Operation
// =============================================================================

/// A write recorded while offline, replayed verbatim against the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Absolute URL, or a path resolved against the configured base URL.
    pub target_url: String,

    /// HTTP verb.
    pub method: HttpMethod,

    /// JSON request body. `null` means "no body".
    #[serde(default)]
    #[ts(type = "unknown")]
    pub body: Value,
}

impl Operation {
    /// Creates an operation.
    pub fn new(method: HttpMethod, target_url: impl Into<String>, body: Value) -> Self {
        Operation {
            target_url: target_url.into(),
            method,
            body,
        }
    }

    /// Creates a POST operation.
    pub fn post(target_url: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, target_url, body)
    }

    /// Creates a PUT operation.
    pub fn put(target_url: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, target_url, body)
    }

    /// Creates a DELETE operation without a body.
    pub fn delete(target_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, target_url, Value::Null)
    }

    /// Returns true if the operation carries a body.
    pub fn has_body(&self) -> bool {
        !self.body.is_null()
    }
}

// =============================================================================
// Queue Entry
// =============================================================================

/// An entry in the pending queue.
///
/// Entries are immutable once queued: the sync engine either deletes them
/// (success, quarantine) or leaves them exactly as they were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub operation: Operation,
    #[ts(as = "String")]
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Wraps an operation with a fresh id and the current time.
    pub fn new(operation: Operation) -> Self {
        QueueEntry {
            id: Uuid::new_v4().to_string(),
            operation,
            enqueued_at: Utc::now(),
        }
    }

    /// Converts this entry into a quarantine record.
    pub fn into_quarantine(self, error_detail: ErrorDetail) -> QuarantineEntry {
        QuarantineEntry {
            id: self.id,
            operation: self.operation,
            enqueued_at: self.enqueued_at,
            error_detail,
            quarantined_at: Utc::now(),
        }
    }
}

impl Keyed for QueueEntry {
    fn key(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Quarantine
// =============================================================================

/// Why an entry ended up in quarantine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The server answered with a structured error.
    Rejected,
    /// Transport failures hit the retry limit.
    RetriesExhausted,
}

/// Structured error captured when an entry is quarantined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// Human-readable message (the server's `message` field when present).
    pub message: String,

    /// HTTP status of the rejecting response, if there was one.
    pub status: Option<u16>,

    pub kind: ErrorKind,

    /// Raw error body as returned by the server.
    #[serde(default)]
    #[ts(type = "unknown")]
    pub body: Value,
}

impl ErrorDetail {
    /// Builds the detail for a server rejection.
    ///
    /// The message is read from `message`, then `error`, and falls back to
    /// `HTTP <status>`.
    pub fn rejected(status: u16, body: Value) -> Self {
        let message = ["message", "error"]
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));

        ErrorDetail {
            message,
            status: Some(status),
            kind: ErrorKind::Rejected,
            body,
        }
    }

    /// Builds the detail for an entry whose retry budget ran out.
    pub fn retries_exhausted(attempts: u32, last_error: impl Into<String>) -> Self {
        let last_error = last_error.into();
        ErrorDetail {
            message: format!("Gave up after {} attempts: {}", attempts, last_error),
            status: None,
            kind: ErrorKind::RetriesExhausted,
            body: serde_json::json!({ "attempts": attempts, "lastError": last_error }),
        }
    }
}

/// An operation the server rejected, parked until an operator deals with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineEntry {
    pub id: String,
    pub operation: Operation,
    #[ts(as = "String")]
    pub enqueued_at: DateTime<Utc>,
    pub error_detail: ErrorDetail,
    #[ts(as = "String")]
    pub quarantined_at: DateTime<Utc>,
}

impl QuarantineEntry {
    /// Returns the original queue entry.
    pub fn entry(&self) -> QueueEntry {
        QueueEntry {
            id: self.id.clone(),
            operation: self.operation.clone(),
            enqueued_at: self.enqueued_at,
        }
    }
}

impl Keyed for QuarantineEntry {
    fn key(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Log
// =============================================================================

/// Severity of a persisted log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Success => write!(f, "success"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(LogLevel::Info),
            "success" => Ok(LogLevel::Success),
            "error" => Ok(LogLevel::Error),
            other => Err(CoreError::UnknownLogLevel(other.to_string())),
        }
    }
}

/// One line of the persistent sync trail. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub level: LogLevel,
    pub message: String,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
}

impl LogEntry {
    /// Creates a log entry stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        LogEntry {
            id: Uuid::new_v4().to_string(),
            level,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

impl Keyed for LogEntry {
    fn key(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Retry State
// =============================================================================

/// Transport-failure bookkeeping for one queue entry.
///
/// Kept apart from [`QueueEntry`] so a failed attempt never rewrites the
/// queued operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryState {
    pub entry_id: String,
    /// Consecutive transport failures so far.
    pub attempts: u32,
    pub last_error: String,
    pub next_attempt_at: DateTime<Utc>,
}

impl RetryState {
    /// Returns true if the entry may be attempted at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at <= now
    }
}

impl Keyed for RetryState {
    fn key(&self) -> &str {
        &self.entry_id
    }
}

// =============================================================================
// Mirrors
// =============================================================================

/// Local mirror of a server product.
///
/// Only `_id` is typed. Everything else is kept as the server sent it, so a
/// refresh stores the record exactly as received, populated references and
/// fractional quantities included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Product {
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn sku(&self) -> Option<&str> {
        self.fields.get("sku").and_then(Value::as_str)
    }

    /// Category name, whether sent as a plain string or a populated document.
    pub fn category_name(&self) -> Option<&str> {
        self.fields.get("category").and_then(reference_label)
    }

    pub fn current_stock(&self) -> Option<f64> {
        self.fields.get("currentStock").and_then(Value::as_f64)
    }
}

impl Keyed for Product {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Local mirror of a server stock movement.
///
/// Stored raw like [`Product`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Movement {
    /// Movement type as sent by the server ("in", "out", "adjustment", ...).
    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    pub fn quantity(&self) -> Option<f64> {
        self.fields.get("quantity").and_then(Value::as_f64)
    }

    /// Id of the product moved, from either an id string or a populated product.
    pub fn product_id(&self) -> Option<&str> {
        self.fields.get("productId").and_then(reference_id)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get("timestamp").and_then(Value::as_str)
    }
}

impl Keyed for Movement {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Id of a reference field: the string itself, or `_id` of a populated document.
fn reference_id(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) => Some(id),
        Value::Object(doc) => doc.get("_id").and_then(Value::as_str),
        _ => None,
    }
}

/// Display label of a reference field: the string itself, or `name` of a
/// populated document.
fn reference_label(value: &Value) -> Option<&str> {
    match value {
        Value::String(label) => Some(label),
        Value::Object(doc) => doc.get("name").and_then(Value::as_str),
        _ => None,
    }
}

//! Checks run on an operation before it is accepted into the queue.
//!
//! The sync engine replays entries verbatim and never edits them, so anything
//! that could never succeed is turned away here instead of ending up in
//! quarantine later.

use crate::error::ValidationError;
use crate::types::Operation;
use crate::MAX_TARGET_URL_LEN;

/// Validates an operation about to be queued.
pub fn validate_operation(op: &Operation) -> Result<(), ValidationError> {
    let url = op.target_url.trim();

    if url.is_empty() {
        return Err(ValidationError::Required {
            field: "targetUrl".to_string(),
        });
    }

    if url.len() > MAX_TARGET_URL_LEN {
        return Err(ValidationError::TooLong {
            field: "targetUrl".to_string(),
            max: MAX_TARGET_URL_LEN,
        });
    }

    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://") || url.starts_with('/')) {
        return Err(ValidationError::InvalidFormat {
            field: "targetUrl".to_string(),
            reason: "must be an http(s) URL or a path starting with '/'".to_string(),
        });
    }

    if !op.method.allows_body() && op.has_body() {
        return Err(ValidationError::NotAllowed {
            field: "body".to_string(),
            reason: format!("{} requests cannot carry a body", op.method),
        });
    }

    Ok(())
}

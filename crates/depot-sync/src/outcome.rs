//! # Outcome Classification
//!
//! Maps the result of replaying one entry onto what the engine does with it.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┬────────────────────────────┐
//! │ Remote result                │ Outcome      │ Queue entry                │
//! ├──────────────────────────────┼──────────────┼────────────────────────────┤
//! │ Ok(Accepted)                 │ Success      │ deleted                    │
//! │ Ok(Rejected { detail })      │ Quarantine   │ moved to quarantine        │
//! │ Err(TransportError)          │ Retry        │ kept, backoff recorded     │
//! └──────────────────────────────┴──────────────┴────────────────────────────┘
//! ```
//!
//! Retries are bounded by [`RetryPolicy`]: once an entry has failed
//! `max_attempts` times in a row it is quarantined with
//! [`ErrorKind::RetriesExhausted`](depot_core::ErrorKind).

use chrono::{DateTime, Utc};
use std::time::Duration;

use depot_core::{ErrorDetail, RetryState};

use crate::error::TransportError;
use crate::remote::RemoteReply;

/// What to do with an entry after one replay attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success,
    Quarantine(ErrorDetail),
    /// Transport failure; carries the error text.
    Retry(String),
}

/// Classifies one replay result.
pub fn classify(result: &Result<RemoteReply, TransportError>) -> Outcome {
    match result {
        Ok(RemoteReply::Accepted { .. }) => Outcome::Success,
        Ok(RemoteReply::Rejected { detail }) => Outcome::Quarantine(detail.clone()),
        Err(e) => Outcome::Retry(e.to_string()),
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Exponential backoff with an attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 0 = never give up.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 20,
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// Result of [`RetryPolicy::next`].
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Keep the entry; do not replay it before `next_attempt_at`.
    Backoff(RetryState),
    /// Stop retrying and quarantine the entry.
    GiveUp(ErrorDetail),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Retries forever, replaying on every cycle.
    pub fn unbounded() -> Self {
        RetryPolicy::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Delay after the `attempts`-th consecutive failure.
    ///
    /// `initial * 2^(attempts - 1)`, capped at `max_backoff`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempts - 1).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Returns true once `attempts` failures reach the ceiling.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }

    /// Folds one more transport failure into the entry's retry state.
    pub fn next(
        &self,
        previous: Option<&RetryState>,
        entry_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        let attempts = previous.map_or(0, |state| state.attempts).saturating_add(1);

        if self.is_exhausted(attempts) {
            return RetryDecision::GiveUp(ErrorDetail::retries_exhausted(attempts, reason));
        }

        let delay = chrono::Duration::from_std(self.delay_for(attempts))
            .unwrap_or_else(|_| chrono::Duration::zero());

        RetryDecision::Backoff(RetryState {
            entry_id: entry_id.to_string(),
            attempts,
            last_error: reason.to_string(),
            next_attempt_at: now + delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&Ok(RemoteReply::Accepted { status: 201 })),
            Outcome::Success
        );

        let detail = ErrorDetail::rejected(400, json!({ "error": "bad sku" }));
        assert_eq!(
            classify(&Ok(RemoteReply::Rejected {
                detail: detail.clone()
            })),
            Outcome::Quarantine(detail)
        );

        assert_eq!(
            classify(&Err(TransportError::Unreachable("refused".into()))),
            Outcome::Retry("service unreachable: refused".into())
        );
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(0, Duration::from_secs(10), Duration::from_secs(60));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(40));
        assert_eq!(policy.delay_for(4), Duration::from_secs(60));
        assert_eq!(policy.delay_for(64), Duration::from_secs(60));
    }

    #[test]
    fn test_next_records_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10), Duration::from_secs(60));
        let now = Utc::now();

        let first = match policy.next(None, "e1", "timeout", now) {
            RetryDecision::Backoff(state) => state,
            other => panic!("expected backoff, got {:?}", other),
        };
        assert_eq!(first.attempts, 1);
        assert_eq!(first.next_attempt_at, now + chrono::Duration::seconds(10));
        assert!(!first.is_due(now));

        let second = match policy.next(Some(&first), "e1", "timeout", now) {
            RetryDecision::Backoff(state) => state,
            other => panic!("expected backoff, got {:?}", other),
        };
        assert_eq!(second.attempts, 2);

        match policy.next(Some(&second), "e1", "refused", now) {
            RetryDecision::GiveUp(detail) => {
                assert_eq!(detail.kind, ErrorKind::RetriesExhausted);
                assert!(detail.message.contains("3 attempts"));
            }
            other => panic!("expected give up, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded_never_gives_up() {
        let policy = RetryPolicy::unbounded();
        let state = RetryState {
            entry_id: "e1".into(),
            attempts: 10_000,
            last_error: "x".into(),
            next_attempt_at: Utc::now(),
        };
        let now = Utc::now();
        match policy.next(Some(&state), "e1", "x", now) {
            RetryDecision::Backoff(next) => assert!(next.is_due(now)),
            other => panic!("expected backoff, got {:?}", other),
        }
    }
}

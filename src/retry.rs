//! Bounded retry executor with failure history.
//!
//! Navigation and other flaky operations run through [`retry`], which keeps a
//! chronological record of every failed attempt. When the budget runs out the
//! caller receives a [`RetryExhausted`] signal carrying that history, so the
//! eventual fault can report every intermediate failure instead of just the
//! last one.

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// One observed failure inside a retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// 1-based attempt number.
    pub attempt: usize,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl AttemptFailure {
    fn new(attempt: usize, message: String) -> Self {
        Self {
            attempt,
            message,
            at: Utc::now(),
        }
    }
}

/// Raised when the retry budget is spent.
///
/// `history` holds exactly `max_retries` failures in chronological order;
/// `last` is the failure that tripped the exhaustion check.
#[derive(Debug, Error)]
#[error("retry budget of {max_retries} exhausted: {}", last.message)]
pub struct RetryExhausted {
    pub max_retries: usize,
    pub history: Vec<AttemptFailure>,
    pub last: AttemptFailure,
}

/// Run `op` until it succeeds or `max_retries` failures have been recorded
/// and one further attempt also fails.
///
/// An operation that fails `k` times before succeeding completes whenever
/// `max_retries >= k`. On exhaustion the returned signal's history length
/// equals `max_retries`.
pub async fn retry<T, E, F, Fut>(mut op: F, max_retries: usize) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut history: Vec<AttemptFailure> = Vec::new();
    loop {
        let attempt = history.len() + 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let failure = AttemptFailure::new(attempt, err.to_string());
                if history.len() >= max_retries {
                    return Err(RetryExhausted {
                        max_retries,
                        history,
                        last: failure,
                    });
                }
                history.push(failure);
            }
        }
    }
}

//! Bounded retry with a per-attempt timeout
//!
//! One loop shared by every caller that talks to the completion endpoint.
//! The label (usually the model identifier) only feeds logs and errors.

use super::error::BackendError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// How many times to try, how long to wait between tries and how long a
/// single try may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("{label} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        label: String,
        attempts: u32,
        last_error: BackendError,
    },
}

impl RetryError {
    pub fn last_error(&self) -> &BackendError {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Runs `op` until it succeeds or the attempt budget is spent
///
/// `op` receives the 1-based attempt number. Each attempt is cut off after
/// `policy.timeout`; the delay is applied between attempts, never after the
/// last one. A budget of 0 is treated as 1.
pub async fn retry_with_timeout<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = BackendError::Other {
        message: "no attempt made".to_string(),
    };

    for attempt in 1..=max_attempts {
        debug!(label, attempt, max_attempts, "attempting call");

        let outcome = match tokio::time::timeout(policy.timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(policy.timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    label,
                    attempt,
                    error_kind = e.kind(),
                    "attempt failed: {}",
                    e
                );
                last_error = e;
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(RetryError::Exhausted {
        label: label.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

//! Retry policies for collaborator and store calls.
//!
//! Only transient failures are retried. A permanent failure (rejected message, illegal
//! transition, malformed prompt) is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How often, and how patiently, a transient failure is retried.
///
/// The wait doubles after every retry, starting at `first_backoff` and never
/// exceeding `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    pub retries: u32,
    pub first_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            first_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self::default().with_retries(0)
    }

    pub fn with_retries(self, retries: u32) -> Self {
        Self { retries, ..self }
    }

    /// Wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.first_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Errors that may succeed when tried again.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for procura_ai::AiError {
    fn is_transient(&self) -> bool {
        matches!(self, procura_ai::AiError::Unavailable(_) | procura_ai::AiError::Timeout)
    }
}

/// What an operator (or the next cycle) should do about a failed unit of work.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The collaborator was unavailable; the next cycle will try again.
    RetryNextCycle,
    /// Retrying will not help; someone has to look at it.
    ManualIntervention,
}

impl Disposition {
    pub fn for_error<E: Transient>(err: &E) -> Self {
        if err.is_transient() {
            Disposition::RetryNextCycle
        } else {
            Disposition::ManualIntervention
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy is exhausted.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &'static str, mut op: F) -> Result<T, E>
where
    E: Transient + core::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retried = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retried < policy.retries => {
                retried += 1;
                let delay = policy.backoff(retried);
                debug!(operation, retry = retried, delay_ms = delay.as_millis() as u64, error = %err, "transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

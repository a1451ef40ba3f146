//! Backoff for calls to the model API
//!
//! Free-tier keys run into `RESOURCE_EXHAUSTED` quickly. The service then
//! names a `retryDelay`, which is honoured as long as it fits the remaining
//! time budget; otherwise delays grow exponentially with optional jitter.

use crate::providers::error::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often and how long to retry a failed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Wait before the first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Upper bound for a computed wait (milliseconds)
    pub max_delay_ms: u64,

    /// Growth factor per retry
    pub exponential_base: f64,

    /// Random spread as a share of the wait, 0.0..=1.0
    pub jitter_factor: f64,

    /// Prefer `Retry-After` / `retryDelay` over the computed wait
    pub respect_retry_after: bool,

    /// Wall-clock budget for the whole call including waits (milliseconds)
    pub timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter_factor: 0.1,
            respect_retry_after: true,
            timeout_ms: Some(120_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Single attempt, used by tests and interactive commands
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Computed wait before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let raw = self.initial_delay_ms as f64 * self.exponential_base.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);

        let millis = if self.jitter_factor > 0.0 && capped > 0.0 {
            let spread = capped * self.jitter_factor;
            (capped + rand::thread_rng().gen_range(-spread..=spread)).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(millis as u64)
    }

    /// Wait before retry number `retry` after `error`, server hint first
    pub fn delay_for(&self, retry: u32, error: &ProviderError) -> Duration {
        match error.retry_delay() {
            Some(hint) if self.respect_retry_after => hint,
            _ => self.backoff(retry),
        }
    }

    /// Whether retry number `retry` may follow `error`
    pub fn allows(&self, retry: u32, error: &ProviderError) -> bool {
        retry < self.max_retries && error.is_retryable()
    }

    fn budget(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// What a retried call ended with
#[derive(Debug)]
pub struct RetryReport<T> {
    pub outcome: Result<T, ProviderError>,
    /// Retries performed after the first attempt
    pub retries: u32,
    /// Time spent sleeping between attempts
    pub waited: Duration,
}

/// Runs an operation under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `operation` until it succeeds, fails for good or the budget runs out
    ///
    /// A wait that would overrun the budget is not started; the last error
    /// is returned instead.
    pub async fn execute<F, T, Fut>(&self, mut operation: F) -> RetryReport<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let started = Instant::now();
        let mut retries = 0;
        let mut waited = Duration::ZERO;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(retries, "Call succeeded after retrying");
                    }
                    return RetryReport {
                        outcome: Ok(value),
                        retries,
                        waited,
                    };
                }
                Err(error) => error,
            };

            if !self.policy.allows(retries, &error) {
                return RetryReport {
                    outcome: Err(error),
                    retries,
                    waited,
                };
            }

            let delay = self.policy.delay_for(retries, &error);
            if let Some(budget) = self.policy.budget() {
                if started.elapsed() + delay > budget {
                    warn!(
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retry budget exhausted"
                    );
                    return RetryReport {
                        outcome: Err(error),
                        retries,
                        waited,
                    };
                }
            }

            warn!(
                retry = retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying model call"
            );
            tokio::time::sleep(delay).await;
            waited += delay;
            retries += 1;
        }
    }

    /// [`execute`](Self::execute) without the bookkeeping
    pub async fn run<F, T, Fut>(&self, operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.execute(operation).await.outcome
    }
}

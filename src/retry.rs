//! Retry with fixed backoff for calls to external services
//!
//! Only transient failures are retried: network-level errors (no status code),
//! `429 Too Many Requests` and any `5xx`. Every other failure is returned at once.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;

/// Whether an error is worth another attempt
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// `None` (no response at all), 429 and 5xx are transient
pub fn is_transient_status(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(code) => code == 429 || code >= 500,
    }
}

/// Retry budget and the fixed delay before each retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_delays[n - 1]`; the last entry repeats
    pub backoff_delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_delays: vec![Duration::from_millis(600), Duration::from_millis(1500)],
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_delays: config.backoff_delays(),
        }
    }

    /// Delay before the given retry (1-indexed)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let idx = (retry as usize - 1).min(self.backoff_delays.len().saturating_sub(1));
        self.backoff_delays.get(idx).copied().unwrap_or(Duration::ZERO)
    }
}

/// Runs an async operation under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryHelper {
    policy: RetryPolicy,
}

impl RetryHelper {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation`, retrying transient failures with the policy's delays
    pub async fn with_retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_transient() {
                        debug!("Attempt {} failed with non-transient error: {}", retries + 1, e);
                        return Err(e);
                    }
                    if retries >= self.policy.max_retries {
                        warn!(
                            "All {} retry attempts exhausted, giving up: {}",
                            self.policy.max_retries, e
                        );
                        return Err(e);
                    }

                    retries += 1;
                    let delay = self.policy.delay_for_retry(retries);
                    debug!(
                        "Attempt {} failed ({}), retrying in {:?}",
                        retries, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

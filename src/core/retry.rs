//! Retry policy for document store calls
//!
//! Transient failures (timeouts, throttling, retry-with and service
//! unavailable) are retried with backoff. The server's retry hint wins over
//! the computed backoff. Everything else, and cancellation, propagates
//! immediately.

use crate::adapters::database::traits::StoreResult;
use crate::config::RetryConfig;
use crate::domain::errors::status;
use crate::domain::{Cancellation, DataStoreError, Result, StoreFailure};
use std::future::Future;
use std::time::Duration;

/// Store signals that are retried
const TRANSIENT_SIGNALS: [u16; 4] = [
    status::REQUEST_TIMEOUT,
    status::TOO_MANY_REQUESTS,
    status::RETRY_WITH,
    status::SERVICE_UNAVAILABLE,
];

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    max_retries: usize,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    /// Cumulative wait allowed across all retries of one operation
    max_wait_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            max_wait_time: Duration::from_secs(config.max_wait_time_seconds),
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the number of retries after the first attempt
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the cumulative wait budget
    pub fn with_max_wait_time(mut self, max_wait_time: Duration) -> Self {
        self.max_wait_time = max_wait_time;
        self
    }

    /// Sets the backoff parameters
    pub fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Whether a failure is worth retrying
    pub fn is_transient(failure: &StoreFailure) -> bool {
        TRANSIENT_SIGNALS.contains(&failure.signal())
    }

    /// Delay before retry number `attempt` (1-based) in the absence of a hint
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails terminally, runs out of
    /// retries or wait budget, or `cancel` fires
    ///
    /// Every attempt and every wait is raced against `cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::Cancelled`] on cancellation, otherwise the
    /// last failure unchanged as [`DataStoreError::Store`].
    pub async fn execute<T, F, Fut>(&self, cancel: &Cancellation, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        let mut waited = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(DataStoreError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DataStoreError::Cancelled),
                outcome = operation() => outcome,
            };

            let failure = match outcome {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !Self::is_transient(&failure) || attempt >= self.max_retries {
                return Err(failure.into());
            }

            attempt += 1;
            let delay = failure
                .retry_after
                .unwrap_or_else(|| self.backoff_delay(attempt));

            if waited + delay > self.max_wait_time {
                tracing::warn!(
                    attempt = attempt,
                    waited_ms = waited.as_millis() as u64,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "Retry wait budget exhausted"
                );
                return Err(failure.into());
            }

            tracing::warn!(
                attempt = attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Retrying store request after transient failure"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DataStoreError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            waited += delay;
        }
    }
}

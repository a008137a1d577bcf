//! # Retry Helper
//!
//! Google APIs fail transiently (quota bursts, backend errors), so every remote call goes
//! through [`execute`]. Failures are retried with a growing delay until the policy's
//! failure budget is spent; non-retryable errors are returned immediately.

use crate::errors::{GapiError, GapiResult};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on the wait between two attempts.
const MAX_DELAY: Duration = Duration::from_secs(3600);

/// How remote operations are retried.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry, in seconds.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    /// Number of failures tolerated before giving up.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Factor applied to the delay after each failure.
    #[serde(default = "default_backoff")]
    pub backoff: f64,
}

fn default_delay_secs() -> f64 {
    5.0
}

fn default_max_failures() -> u32 {
    5
}

fn default_backoff() -> f64 {
    1.5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            max_failures: default_max_failures(),
            backoff: default_backoff(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            delay_secs: 0.0,
            max_failures: 0,
            backoff: 1.0,
        }
    }

    /// A policy that retries immediately, mostly useful in tests.
    pub fn immediate(max_failures: u32) -> Self {
        Self {
            delay_secs: 0.0,
            max_failures,
            backoff: 1.0,
        }
    }

    /// Same policy with a different initial delay.
    pub fn with_delay_secs(mut self, delay_secs: f64) -> Self {
        self.delay_secs = delay_secs;
        self
    }

    /// Checks that the delay and backoff are usable as durations.
    pub fn validate(&self) -> GapiResult<()> {
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(GapiError::Configuration(format!(
                "retry.delay_secs must be a non-negative number, got {}",
                self.delay_secs
            )));
        }
        if !self.backoff.is_finite() || self.backoff <= 0.0 {
            return Err(GapiError::Configuration(format!(
                "retry.backoff must be a positive number, got {}",
                self.backoff
            )));
        }
        Ok(())
    }

    fn initial_delay(&self) -> Duration {
        clamp_delay(self.delay_secs)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        clamp_delay(delay.as_secs_f64() * self.backoff)
    }
}

/// Out-of-range and NaN values become zero or [`MAX_DELAY`].
fn clamp_delay(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(secs).map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or has failed
/// more than `policy.max_failures` times.
pub async fn execute<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> GapiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GapiResult<T>>,
{
    let mut failures = 0u32;
    let mut delay = policy.initial_delay();
    loop {
        if failures > 0 {
            info!("Retrying...");
        }
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                failures += 1;
                if failures > policy.max_failures {
                    warn!("Too many failures, abandoning");
                    return Err(e);
                }
                warn!(
                    "Failed {} times ({}), retrying in {:.1} seconds...",
                    failures,
                    e,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}

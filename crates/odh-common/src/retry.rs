//! Retry utilities with exponential backoff and jitter.
//!
//! Two entry points share one loop:
//!
//! - [`retry_with_backoff`] retries every error (startup probes, transient API failures)
//! - [`retry_on_conflict`] retries only optimistic-concurrency conflicts, which is what a
//!   read-merge-write cycle needs: the unit of work re-reads the latest object on every
//!   attempt, so a stale write is never replayed blindly.
//!
//! # Example
//!
//! ```ignore
//! use odh_common::retry::{retry_on_conflict, RetryConfig};
//!
//! retry_on_conflict(&RetryConfig::conflict_default(), "update route", || async {
//!     let mut latest = store.get(&key).await?;
//!     merge(&desired, &mut latest);
//!     store.update(&latest).await
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::Error;

/// Configuration for operations that may fail transiently.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0, // infinite
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Bounded policy for conflict retries: 5 attempts, 10ms fixed delay (jittered)
    pub fn conflict_default() -> Self {
        Self::conflict_attempts(5)
    }

    /// Conflict policy with a custom attempt bound and the default 10ms delay
    pub fn conflict_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
        }
    }

    /// Bounded policy with no delay between attempts (tests)
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }
}

/// Execute an async operation with exponential backoff and jitter.
///
/// Retries every error until success or until `max_attempts` is exhausted,
/// in which case the last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(config, operation_name, |_| true, operation).await
}

/// Re-run a read-merge-write unit of work while it fails with [`Error::Conflict`].
///
/// Any other error is returned immediately. Exhausting the bound returns the
/// last conflict so the pass surfaces it instead of dropping the write.
pub async fn retry_on_conflict<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    retry_if(config, operation_name, Error::is_conflict, operation).await
}

/// Shared retry loop: retries while `should_retry` accepts the error.
pub async fn retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt = attempt.saturating_add(1);

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => {
                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                // Add jitter: 0.5x to 1.5x of the delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = jittered_delay.as_millis(),
                    "Operation failed, retrying"
                );

                if !jittered_delay.is_zero() {
                    tokio::time::sleep(jittered_delay).await;
                }

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

// src/retry.rs

//! Retry policy for transient RPC failures.
//!
//! This module provides a configurable retry policy with exponential backoff
//! and jitter, plus an async driver that retries preemption-class gRPC errors
//! until success, a non-transient error, cancellation, or an optional
//! deadline.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tonic::{Code, Status};

use crate::config::ClientConfig;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&ClientConfig> for RetryConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Calculates the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.min(32) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            let jitter_factor = 1.0 + (rand_simple(attempt) * 0.25);
            delay_secs * jitter_factor
        } else {
            delay_secs
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Simple deterministic pseudo-random number generator for jitter.
/// Uses the attempt number as seed to produce a value in [0, 1).
fn rand_simple(seed: u32) -> f64 {
    // Simple LCG-based PRNG
    let x = seed.wrapping_mul(1103515245).wrapping_add(12345);
    (x as f64) / (u32::MAX as f64)
}

/// Reports whether a gRPC status is a preemption-class error that is safe to
/// retry: the server may be restarting or migrating.
pub fn is_transient(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::Unavailable | Code::Cancelled | Code::Aborted
    )
}

/// Retry `operation` while it fails with a transient status.
///
/// Gives up when the status is non-transient, when `deadline` passes, or when
/// `cancel` flips to true. Backoff sleeps are truncated to the deadline and
/// interrupted by cancellation; `None` means no deadline.
pub async fn retry_transient<T, F, Fut>(
    config: &RetryConfig,
    mut cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    description: &str,
    mut operation: F,
) -> std::result::Result<T, Status>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, Status>>,
{
    let mut attempt: u32 = 0;

    loop {
        let status = match operation().await {
            Ok(value) => return Ok(value),
            Err(status) => status,
        };
        if !is_transient(&status) {
            return Err(status);
        }
        if *cancel.borrow() {
            return Err(Status::cancelled(format!("{description} was cancelled")));
        }

        let now = Instant::now();
        if let Some(deadline) = deadline {
            if now > deadline {
                return Err(status);
            }
        }
        let mut delay = config.delay_for_attempt(attempt);
        if let Some(deadline) = deadline {
            delay = delay.min(deadline.saturating_duration_since(now));
        }
        tracing::warn!(
            "Failed to {}: {}. Will retry in {:?}",
            description,
            status,
            delay
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return Err(Status::cancelled(format!("{description} was cancelled")));
                }
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(config.jitter);
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = no_jitter();

        // Without jitter, delays should be exact
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_respects_max() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        // Should be capped at max_delay
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(20), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_with_jitter() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        };

        let delay = config.delay_for_attempt(0);
        // With jitter, delay should be between 100ms and 125ms
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(125));
    }

    #[test]
    fn test_from_client_config() {
        let mut client = ClientConfig::default();
        client.retry_initial_delay_ms = 200;
        client.retry_max_delay_ms = 5_000;

        let config = RetryConfig::from(&client);
        assert_eq!(config.initial_delay, Duration::from_millis(200));
        assert_eq!(config.max_delay, Duration::from_millis(5_000));
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient(&Status::unavailable("worker restarting")));
        assert!(is_transient(&Status::cancelled("preempted")));
        assert!(is_transient(&Status::aborted("migrating")));
        assert!(!is_transient(&Status::invalid_argument("bad task id")));
        assert!(!is_transient(&Status::not_found("no such job")));
    }

    fn never_cancelled() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the duration of the test.
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn test_retry_success() {
        let config = no_jitter();
        let result = retry_transient(&config, never_cancelled(), None, "test op", || async {
            Ok::<_, Status>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_non_transient_fails_fast() {
        let config = no_jitter();
        let attempts = AtomicU32::new(0);
        let result: std::result::Result<i32, _> =
            retry_transient(&config, never_cancelled(), None, "test op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(Status::invalid_argument("bad request")) }
            })
            .await;

        assert_eq!(result.unwrap_err().code(), Code::InvalidArgument);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_eventual_success() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 1.0,
            jitter: false,
        };

        let attempts = AtomicU32::new(0);
        let result = retry_transient(&config, never_cancelled(), None, "test op", || {
            let count = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 3 {
                    Err(Status::unavailable("not yet"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_deadline_exhausted() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
            jitter: false,
        };

        let deadline = Instant::now() + Duration::from_millis(50);
        let result: std::result::Result<i32, _> =
            retry_transient(&config, never_cancelled(), Some(deadline), "test op", || {
                async { Err(Status::unavailable("still down")) }
            })
            .await;

        assert_eq!(result.unwrap_err().code(), Code::Unavailable);
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test]
    async fn test_retry_cancelled_mid_backoff() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.0,
            jitter: false,
        };

        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let start = Instant::now();
        let result: std::result::Result<i32, _> =
            retry_transient(&config, rx, None, "test op", || async {
                Err(Status::unavailable("still down"))
            })
            .await;

        assert_eq!(result.unwrap_err().code(), Code::Cancelled);
        // Must not have slept through the full backoff.
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}

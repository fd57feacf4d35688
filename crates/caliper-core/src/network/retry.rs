//! Bounded sequential retry with exponential backoff.
//!
//! Release resolution is the only layer that retries; downloads fail fast
//! and leave any retry decision to the caller. The loop is strictly
//! sequential: one attempt at a time with an increasing delay, never
//! concurrent attempts.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub growth: f64,
    /// Randomize each delay by ±50% to avoid synchronized re-requests.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::NetworkConfig::MAX_RETRIES,
            base_delay: crate::config::NetworkConfig::RETRY_BASE_DELAY,
            max_delay: Duration::from_secs(60),
            growth: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay applied after the given failed attempt (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.growth.powi(attempt as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            // Factor in [0.5, 1.5): same mean, no near-zero delays.
            let factor = rand::rng().random_range(0.5..1.5);
            (capped * factor).min(self.max_delay.as_secs_f64())
        } else {
            capped
        };

        Duration::from_secs_f64(secs)
    }
}

/// Outcome bookkeeping for a retried operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    /// Attempts actually made.
    pub attempts: u32,
    /// Sum of all backoff delays applied.
    pub total_delay: Duration,
    /// Message of the last failure, if the operation ever failed.
    pub last_error: Option<String>,
}

/// Run `operation` until it succeeds, a non-retryable error occurs, or the
/// attempt budget is exhausted.
///
/// Returns the final result together with [`RetryStats`] so callers can log
/// how hard the operation had to try.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();

    loop {
        let attempt = stats.attempts;
        stats.attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded on attempt {}", attempt + 1);
                }
                return (Ok(value), stats);
            }
            Err(e) => {
                stats.last_error = Some(e.to_string());

                if !should_retry(&e) {
                    debug!("Not retrying: {}", e);
                    return (Err(e), stats);
                }
                if stats.attempts >= config.max_attempts {
                    warn!(
                        "Giving up after {} attempt(s): {}",
                        stats.attempts, e
                    );
                    return (Err(e), stats);
                }

                let delay = config.delay_for(attempt);
                stats.total_delay += delay;
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    stats.attempts, config.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delays_grow_without_jitter() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(2))
            .with_jitter(false);

        assert_eq!(config.delay_for(0), Duration::from_secs(2));
        assert_eq!(config.delay_for(1), Duration::from_secs(4));
        assert_eq!(config.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_respects_cap() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(25))
            .with_jitter(false);

        assert_eq!(config.delay_for(4), Duration::from_secs(25));
    }

    #[test]
    fn test_jittered_delay_stays_in_band() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(2))
            .with_jitter(true);

        for _ in 0..20 {
            let delay = config.delay_for(0);
            assert!(
                delay >= Duration::from_secs(1) && delay < Duration::from_secs(3),
                "delay {:?} outside [1s, 3s)",
                delay
            );
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_makes_no_delay() {
        let config = RetryConfig::new().with_max_attempts(3);

        let (result, stats) =
            retry_async(&config, || async { Ok::<_, String>(7) }, |_| true).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.total_delay, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        // Models the API returning 503 a few times before recovering: the
        // operation must still succeed within the attempt budget.
        let config = RetryConfig::new()
            .with_max_attempts(4)
            .with_base_delay(Duration::from_millis(5))
            .with_jitter(false);

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let (result, stats) = retry_async(
            &config,
            || {
                let calls = calls_in_op.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err("503 Service Unavailable".to_string())
                    } else {
                        Ok("release")
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), "release");
        assert_eq!(stats.attempts, 4);
        assert!(stats.attempts <= config.max_attempts);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_reports_last_error() {
        let config = RetryConfig::new()
            .with_max_attempts(2)
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false);

        let (result, stats) = retry_async(
            &config,
            || async { Err::<(), _>("connection reset".to_string()) },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.last_error.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn test_non_retryable_fails_on_first_attempt() {
        let config = RetryConfig::new().with_max_attempts(5);

        let (result, stats) = retry_async(
            &config,
            || async { Err::<(), _>("404 Not Found".to_string()) },
            |e: &String| !e.starts_with("404"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 1);
    }
}

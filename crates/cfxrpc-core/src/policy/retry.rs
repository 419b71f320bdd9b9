//! Backoff retry policy shared by single and batch calls.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Delay before the first retry. Zero means "retry immediately".
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps exponential growth).
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each retry; `1.0` keeps it fixed.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 1.0,
        }
    }
}

impl RetryConfig {
    /// Fixed-interval retries.
    pub fn fixed(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff: interval,
            max_backoff: interval.max(Duration::from_secs(10)),
            multiplier: 1.0,
        }
    }
}

/// Retry policy: computes delays and drives the retry loop.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th retry (1-based).
    /// Returns `None` if `attempt` exceeds `max_retries`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.max(1.0).powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }

    /// Returns `true` if any retries remain after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    ///
    /// The budget only ever shrinks: each retryable failure consumes one
    /// retry. Node-reported errors are returned as-is on the first
    /// occurrence. Once the budget is spent the last error is wrapped in
    /// [`TransportError::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };
            attempt += 1;
            let Some(delay) = self.next_delay(attempt) else {
                if self.config.max_retries == 0 {
                    return Err(err);
                }
                tracing::warn!(
                    method = label,
                    attempts = attempt,
                    error = %err,
                    "retries exhausted"
                );
                return Err(TransportError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            };
            tracing::warn!(
                method = label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying request"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn first_retry_delay() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        });
        let d1 = policy.next_delay(1).unwrap();
        let d2 = policy.next_delay(2).unwrap();
        let d3 = policy.next_delay(3).unwrap();
        assert_eq!(d1.as_millis(), 100);
        assert_eq!(d2.as_millis(), 200);
        assert_eq!(d3.as_millis(), 400);
        assert!(policy.next_delay(4).is_none());
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            multiplier: 10.0,
        });
        let d5 = policy.next_delay(5).unwrap();
        assert!(d5 <= Duration::from_millis(500), "d5={d5:?} exceeds max");
    }

    #[test]
    fn fixed_interval_stays_constant() {
        let policy = RetryPolicy::new(RetryConfig::fixed(3, Duration::from_secs(1)));
        assert_eq!(policy.next_delay(1), policy.next_delay(3));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn should_retry_boundary() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 2,
            ..Default::default()
        });
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[tokio::test]
    async fn run_stops_after_budget() {
        let policy = RetryPolicy::new(RetryConfig::fixed(2, Duration::ZERO));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy
            .run("cfx_epochNumber", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Http("connection refused".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(TransportError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_returns_rpc_errors_immediately() {
        let policy = RetryPolicy::new(RetryConfig::fixed(5, Duration::ZERO));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy
            .run("cfx_call", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Rpc(crate::request::JsonRpcError {
                    code: -32000,
                    message: "reverted".into(),
                    data: None,
                }))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(TransportError::Rpc(_))));
    }

    #[tokio::test]
    async fn run_recovers_after_transient_failure() {
        let policy = RetryPolicy::new(RetryConfig::fixed(3, Duration::ZERO));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy
            .run("cfx_gasPrice", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::Timeout { ms: 10 })
                } else {
                    Ok(7u64)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

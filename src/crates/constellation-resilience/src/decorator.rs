//! Decorator chain: cache -> execute -> timeout -> retry -> fallback
//! (spec §4.6). Cache wrapping lives with the caller (it needs the
//! module's cache key and backend); this module drives the rest.

use std::future::Future;

use tracing::{info, warn};

use crate::concurrency::ConcurrencyLimiter;
use crate::error::ResilienceError;
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;
use crate::timeout::with_timeout;

/// The timeout/retry/fallback tunables for one module. `throttle` and
/// `concurrency` are passed separately since they are per-module shared
/// state, not per-call configuration.
#[derive(Debug, Clone)]
pub struct ExecutionPolicy<T> {
    pub timeout: Option<std::time::Duration>,
    pub retry: Option<RetryPolicy>,
    pub fallback: Option<T>,
}

impl<T> Default for ExecutionPolicy<T> {
    fn default() -> Self {
        ExecutionPolicy { timeout: None, retry: None, fallback: None }
    }
}

/// Runs `call` under `policy`, acquiring `throttle`/`concurrency` guards
/// (if configured) before every attempt.
pub async fn execute<F, Fut, T, E>(
    module: &str,
    policy: &ExecutionPolicy<T>,
    throttle: Option<&Throttle>,
    concurrency: Option<&ConcurrencyLimiter>,
    mut call: F,
) -> Result<T, ResilienceError<E>>
where
    T: Clone,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.retry.as_ref().map(|r| r.attempts()).unwrap_or(1);
    let mut history = Vec::new();

    for attempt in 0..attempts {
        if let Some(throttle) = throttle {
            throttle.acquire().await;
        }
        let _permit = match concurrency {
            Some(limiter) => Some(limiter.acquire().await),
            None => None,
        };

        let attempt_result = match policy.timeout {
            Some(duration) => with_timeout(module, duration, call()).await,
            None => call().await.map_err(ResilienceError::ModuleFailure),
        };

        match attempt_result {
            Ok(value) => {
                if attempt > 0 {
                    info!(module, attempt, "module succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) => {
                let is_last = attempt + 1 == attempts;
                if !is_last {
                    warn!(module, attempt, error = %err, "module attempt failed, retrying");
                    if let Some(policy) = &policy.retry {
                        tokio::time::sleep(policy.delay_for(attempt)).await;
                    }
                }
                history.push(err);
            }
        }
    }

    if let Some(fallback) = &policy.fallback {
        warn!(module, attempts, "all attempts failed, using fallback value");
        return Ok(fallback.clone());
    }

    Err(ResilienceError::RetryExhausted { module: module.to_string(), attempts, history })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::BackoffKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_retry_configured() {
        let policy: ExecutionPolicy<i32> = ExecutionPolicy::default();
        let result: Result<i32, &str> = execute("m", &policy, None, None, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = ExecutionPolicy {
            timeout: None,
            retry: Some(RetryPolicy { jitter: false, ..RetryPolicy::new(3, Duration::from_millis(1), BackoffKind::Fixed) }),
            fallback: None,
        };
        let result: Result<i32, &str> = execute("m", &policy, None, None, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err("fail") } else { Ok(99) } }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retries_and_uses_fallback() {
        let policy = ExecutionPolicy {
            timeout: None,
            retry: Some(RetryPolicy { jitter: false, ..RetryPolicy::new(2, Duration::from_millis(1), BackoffKind::Fixed) }),
            fallback: Some("fallback-value"),
        };
        let result: Result<&str, &str> = execute("m", &policy, None, None, || async { Err("always fails") }).await;
        assert_eq!(result.unwrap(), "fallback-value");
    }

    #[tokio::test]
    async fn exhausts_retries_without_fallback_reports_history() {
        let policy: ExecutionPolicy<i32> = ExecutionPolicy {
            timeout: None,
            retry: Some(RetryPolicy { jitter: false, ..RetryPolicy::new(1, Duration::from_millis(1), BackoffKind::Fixed) }),
            fallback: None,
        };
        let result: Result<i32, &str> = execute("m", &policy, None, None, || async { Err("boom") }).await;
        match result {
            Err(ResilienceError::RetryExhausted { attempts, history, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(history.len(), 2);
            }
            _ => panic!("expected RetryExhausted"),
        }
    }

    #[tokio::test]
    async fn timeout_failure_is_retried_like_any_other_error() {
        let policy: ExecutionPolicy<i32> = ExecutionPolicy {
            timeout: Some(Duration::from_millis(5)),
            retry: Some(RetryPolicy { jitter: false, ..RetryPolicy::new(1, Duration::from_millis(1), BackoffKind::Fixed) }),
            fallback: None,
        };
        let result: Result<i32, std::convert::Infallible> = execute("m", &policy, None, None, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(1)
        })
        .await;
        assert!(matches!(result, Err(ResilienceError::RetryExhausted { .. })));
    }
}

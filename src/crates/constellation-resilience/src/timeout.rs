//! Per-attempt deadline enforcement (spec §4.6, "Timeout"). Grounded on
//! `tooling::async_utils::timeout::with_timeout`.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ResilienceError;

/// Runs `future` to completion or fails with `Timeout` once `duration`
/// elapses. A timeout cancels only this attempt; a caller driving a
/// retry loop around `with_timeout` keeps retrying normally.
pub async fn with_timeout<F, T, E>(
    module: &str,
    duration: Duration,
    future: F,
) -> Result<T, ResilienceError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result.map_err(ResilienceError::ModuleFailure),
        Err(_) => Err(ResilienceError::Timeout { module: module.to_string(), duration }),
    }
}

/// RAII deadline tracker for code that needs to know how much time
/// remains partway through a timed attempt (e.g. a module that itself
/// fans out to sub-calls and wants to budget the remainder).
pub struct TimeoutGuard {
    deadline: Instant,
}

impl TimeoutGuard {
    pub fn new(duration: Duration) -> Self {
        TimeoutGuard { deadline: Instant::now() + duration }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub async fn sleep_until_deadline(&self) {
        tokio::time::sleep_until(self.deadline).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline_succeeds() {
        let result: Result<i32, std::convert::Infallible> =
            with_timeout("m", Duration::from_millis(50), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn exceeding_deadline_times_out() {
        let result: Result<i32, std::convert::Infallible> = with_timeout("m", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(7)
        })
        .await;
        assert!(matches!(result, Err(ResilienceError::Timeout { .. })));
    }

    #[tokio::test]
    async fn module_failure_propagates_through_timeout() {
        let result: Result<i32, &str> = with_timeout("m", Duration::from_millis(50), async { Err("boom") }).await;
        assert!(matches!(result, Err(ResilienceError::ModuleFailure("boom"))));
    }

    #[tokio::test]
    async fn timeout_guard_tracks_remaining_time() {
        let guard = TimeoutGuard::new(Duration::from_millis(50));
        assert!(!guard.expired());
        assert!(guard.remaining() <= Duration::from_millis(50));
    }
}

//! Retry policy and backoff math (spec §4.6, "Retry"). Grounded on
//! `tooling::async_utils::retry::RetryPolicy`, trimmed to the backoff
//! arithmetic the spec actually names: attempts are always retried on
//! failure (the teacher's `is_retryable_error` classification has no
//! counterpart — every module failure is retryable here).

use std::time::Duration;

use rand::Rng;

/// Per-attempt wait multiplier named in the decorator-order rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

/// Cap so an exponential series can never stall an execution for more
/// than half a minute between attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts beyond the first; total attempts = `1 + retries`.
    pub retries: u32,
    pub delay: Duration,
    pub backoff: BackoffKind,
    /// Add up to 10% jitter to each computed delay, to avoid thundering
    /// herds when many tasks retry in lockstep.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration, backoff: BackoffKind) -> Self {
        RetryPolicy { retries, delay, backoff, jitter: true }
    }

    pub fn attempts(&self) -> u32 {
        1 + self.retries
    }

    /// Wait before the attempt numbered `attempt` (0-indexed, i.e. the
    /// delay taken *after* attempt `attempt` has failed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = match self.backoff {
            BackoffKind::Fixed => 1u64,
            BackoffKind::Linear => (attempt + 1) as u64,
            BackoffKind::Exponential => 1u64 << attempt,
        };
        let base = self.delay.saturating_mul(multiplier as u32).min(MAX_BACKOFF);
        if self.jitter && base > Duration::ZERO {
            let jitter_fraction: f64 = rand::thread_rng().gen_range(0.0..0.1);
            base + base.mul_f64(jitter_fraction)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy { jitter: false, ..RetryPolicy::new(3, Duration::from_millis(100), BackoffKind::Fixed) };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
    }

    #[test]
    fn linear_backoff_scales_with_attempt() {
        let policy = RetryPolicy { jitter: false, ..RetryPolicy::new(3, Duration::from_millis(100), BackoffKind::Linear) };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy { jitter: false, ..RetryPolicy::new(10, Duration::from_secs(1), BackoffKind::Exponential) };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), MAX_BACKOFF);
    }

    #[test]
    fn attempts_is_one_plus_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), BackoffKind::Fixed);
        assert_eq!(policy.attempts(), 3);
    }

    #[test]
    fn jitter_never_shrinks_the_base_delay() {
        let policy = RetryPolicy::new(1, Duration::from_millis(100), BackoffKind::Fixed);
        for _ in 0..20 {
            assert!(policy.delay_for(0) >= Duration::from_millis(100));
        }
    }
}

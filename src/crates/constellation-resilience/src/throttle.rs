//! Per-module rate limiting (spec §4.6, "throttle: rate, window").
//! Grounded on `tooling::rate_limit::RateLimiter`'s token bucket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Token bucket: `rate` tokens refill over `window`, up to `rate`
/// tokens held at once. `acquire` blocks until a token is available.
#[derive(Clone)]
pub struct Throttle {
    state: Arc<Mutex<ThrottleState>>,
}

struct ThrottleState {
    capacity: f64,
    tokens: f64,
    window: Duration,
    last_refill: Instant,
}

impl Throttle {
    pub fn new(rate: u32, window: Duration) -> Self {
        Throttle {
            state: Arc::new(Mutex::new(ThrottleState {
                capacity: rate as f64,
                tokens: rate as f64,
                window,
                last_refill: Instant::now(),
            })),
        }
    }

    pub async fn acquire(&self) {
        loop {
            if self.try_acquire().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        state.refill();
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl ThrottleState {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        if elapsed >= self.window {
            self.tokens = self.capacity;
            self.last_refill = now;
        } else if elapsed > Duration::ZERO {
            let ratio = elapsed.as_secs_f64() / self.window.as_secs_f64();
            self.tokens = (self.tokens + self.capacity * ratio).min(self.capacity);
            self.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_rate_then_denies() {
        let throttle = Throttle::new(3, Duration::from_secs(1));
        assert!(throttle.try_acquire().await);
        assert!(throttle.try_acquire().await);
        assert!(throttle.try_acquire().await);
        assert!(!throttle.try_acquire().await);
    }

    #[tokio::test]
    async fn refills_after_window_elapses() {
        let throttle = Throttle::new(1, Duration::from_millis(30));
        assert!(throttle.try_acquire().await);
        assert!(!throttle.try_acquire().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(throttle.try_acquire().await);
    }
}

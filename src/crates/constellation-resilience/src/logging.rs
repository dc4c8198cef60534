//! Logging helpers (spec §10.2). Grounded on `tooling::logging::timed`.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

/// Logs entry/exit of `future` at debug level with elapsed time.
pub async fn timed<F, T>(name: &str, future: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    debug!(name, "starting");
    let result = future.await;
    debug!(name, elapsed = ?start.elapsed(), "completed");
    result
}

/// Human-readable duration, for log lines and error messages.
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1_000 {
        format!("{micros}μs")
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1_000)
    } else if micros < 60_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else {
        let seconds = micros / 1_000_000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timed_returns_the_future_output() {
        let result = timed("op", async { 42 }).await;
        assert_eq!(result, 42);
    }

    #[test]
    fn format_duration_picks_the_right_unit() {
        assert_eq!(format_duration(Duration::from_micros(500)), "500μs");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
    }
}

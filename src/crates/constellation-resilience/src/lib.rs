//! Resilience decorators wrapped around every module call (spec §4.6):
//! timeout, retry with backoff, fallback, throttle, and a concurrency
//! cap, plus the ambient config/logging/error-context helpers the rest
//! of the workspace builds on.

pub mod concurrency;
pub mod config;
pub mod decorator;
pub mod error;
pub mod error_context;
pub mod logging;
pub mod retry;
pub mod throttle;
pub mod timeout;

pub use concurrency::ConcurrencyLimiter;
pub use config::{CacheConfig, ConfigBuilder, SchedulerConfig};
pub use decorator::{execute, ExecutionPolicy};
pub use error::{ConfigError, ResilienceError};
pub use error_context::{format_error_chain, root_cause, ErrorContext};
pub use logging::{format_duration, timed};
pub use retry::{BackoffKind, RetryPolicy, MAX_BACKOFF};
pub use throttle::Throttle;
pub use timeout::{with_timeout, TimeoutGuard};

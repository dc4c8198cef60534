//! Resilience-layer error taxonomy (spec §7, "Runtime errors" subset
//! owned by this crate: `Timeout`, `RetryExhausted`, `Cancelled`).

use std::time::Duration;

/// Wraps a module's own failure type `E` with the decorator-chain
/// outcomes defined in spec §4.6.
#[derive(thiserror::Error, Debug)]
pub enum ResilienceError<E> {
    #[error("module '{module}' timed out after {duration:?}")]
    Timeout { module: String, duration: Duration },

    #[error("module '{module}' failed after {attempts} attempt(s)")]
    RetryExhausted {
        module: String,
        attempts: u32,
        history: Vec<ResilienceError<E>>,
    },

    #[error("execution cancelled")]
    Cancelled,

    #[error("{0}")]
    ModuleFailure(#[source] E),
}

impl<E> ResilienceError<E> {
    pub fn module_name(&self) -> Option<&str> {
        match self {
            ResilienceError::Timeout { module, .. } => Some(module),
            ResilienceError::RetryExhausted { module, .. } => Some(module),
            ResilienceError::Cancelled => None,
            ResilienceError::ModuleFailure(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled)
    }
}

/// Ambient config-validation error, independent of any module's own
/// error type (spec §10.4, `ConfigBuilder`).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required environment variable {0}")]
    MissingEnv(String),

    #[error("failed to parse environment variable {key}: {reason}")]
    ParseEnv { key: String, reason: String },
}

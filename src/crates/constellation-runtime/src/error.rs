//! Runtime error taxonomy (spec §7, "Runtime errors"). Grounded on
//! `langgraph-core/src/error.rs`'s `GraphError` enum, widened with the
//! operation-specific variants spec §7 names and a conversion from the
//! resilience crate's decorator-chain outcome.

use std::time::Duration;

use constellation_types::{Type, Value};

#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error("module '{module}' timed out after {duration:?}")]
    Timeout { module: String, duration: Duration },

    #[error("module '{module}' failed after {attempts} attempt(s): {history:?}")]
    RetryExhausted { module: String, attempts: u32, history: Vec<String> },

    #[error("module '{module}' failed: {cause}")]
    ModuleFailure { module: String, cause: String },

    #[error("execution cancelled")]
    Cancelled,

    #[error("missing required input '{0}'")]
    MissingInput(String),

    #[error("list length mismatch: {a} vs {b}")]
    ListLengthMismatch { a: usize, b: usize },

    #[error("runtime type error: expected {expected}, found {actual}")]
    RuntimeTypeError { expected: String, actual: String },

    #[error(transparent)]
    Cache(#[from] constellation_cache::CacheError),
}

impl RuntimeError {
    pub fn type_mismatch(expected: &Type, actual: &Type) -> Self {
        RuntimeError::RuntimeTypeError { expected: expected.to_string(), actual: actual.to_string() }
    }

    /// Builds a `RuntimeTypeError` describing a single value that didn't
    /// have the shape an op expected (e.g. `$field` against a non-record).
    pub fn type_mismatch_value(expected: &str, actual: &Value) -> Self {
        RuntimeError::RuntimeTypeError { expected: expected.to_string(), actual: actual.type_of().to_string() }
    }

    /// Same, for binary ops that saw a mismatched pair of operands.
    pub fn type_mismatch_values(expected: &str, a: &Value, b: &Value) -> Self {
        RuntimeError::RuntimeTypeError {
            expected: expected.to_string(),
            actual: format!("{} and {}", a.type_of(), b.type_of()),
        }
    }
}

/// Which module node (if any) a runtime error should be attributed to,
/// for `ExecutionListener::on_module_failed` and suspended-execution
/// bookkeeping.
pub fn attributed_module(error: &RuntimeError) -> Option<&str> {
    match error {
        RuntimeError::Timeout { module, .. }
        | RuntimeError::RetryExhausted { module, .. }
        | RuntimeError::ModuleFailure { module, .. } => Some(module),
        _ => None,
    }
}

/// `ResilienceError<anyhow::Error>` can't carry a blanket `#[from]` here:
/// it's generic over the module's own error type, and this crate fixes
/// that type parameter to `anyhow::Error`. `module_name` fills in
/// `ModuleFailure`'s module field, which `ResilienceError` itself doesn't
/// carry on that variant.
pub fn from_resilience_error(
    module_name: &str,
    err: constellation_resilience::ResilienceError<anyhow::Error>,
) -> RuntimeError {
    use constellation_resilience::ResilienceError::*;
    match err {
        Timeout { module, duration } => RuntimeError::Timeout { module, duration },
        RetryExhausted { module, attempts, history } => RuntimeError::RetryExhausted {
            module,
            attempts,
            history: history.into_iter().map(|e| e.to_string()).collect(),
        },
        Cancelled => RuntimeError::Cancelled,
        ModuleFailure(cause) => {
            RuntimeError::ModuleFailure { module: module_name.to_string(), cause: cause.to_string() }
        }
    }
}

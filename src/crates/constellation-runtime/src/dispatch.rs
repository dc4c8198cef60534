//! Bridges a resolved module call to the resilience decorator chain
//! (spec §4.6, "cache -> execute -> timeout -> retry -> fallback"). Cache
//! wrapping happens in `executor.rs`, above this module; `dispatch` only
//! covers execute/timeout/retry/fallback plus the throttle/concurrency
//! guards `execute` acquires per attempt.

use std::collections::HashMap;

use constellation_resilience::{execute, ConcurrencyLimiter, ExecutionPolicy, Throttle};
use constellation_types::Value;

use crate::error::{self, RuntimeError};
use crate::options::ResolvedOptions;
use crate::registry::RegisteredModule;

/// Runs one module call through the resilience decorator chain.
/// `throttle`/`concurrency` are the per-execution, per-call-site guards
/// the executor built from this module's resolved options; either may be
/// absent if the module didn't configure that option.
pub async fn call_module_with_guards(
    module_name: &str,
    registered: &RegisteredModule,
    inputs: HashMap<String, Value>,
    resolved: &ResolvedOptions,
    throttle: Option<&Throttle>,
    concurrency: Option<&ConcurrencyLimiter>,
) -> Result<Value, RuntimeError> {
    let policy = ExecutionPolicy {
        timeout: resolved.timeout,
        retry: resolved.retry.clone(),
        fallback: resolved.fallback.clone(),
    };

    let evaluator = &registered.evaluator;
    let result = execute(module_name, &policy, throttle, concurrency, || {
        let evaluator = evaluator.clone();
        let inputs = inputs.clone();
        async move { evaluator.evaluate(inputs).await }
    })
    .await;

    result.map_err(|err| error::from_resilience_error(module_name, err))
}

/// Calls a module with no resilience decoration at all: no timeout,
/// retry, fallback, throttle, or concurrency guard. Used for module
/// calls nested inside a lambda or match arm body (spec §4.4's
/// higher-order ops and match expressions run purely as value
/// transforms — their module calls aren't independent DAG nodes with
/// their own options, so there's nothing for the decorator chain to
/// read).
pub async fn call_module(
    module_name: &str,
    registered: &RegisteredModule,
    inputs: HashMap<String, Value>,
) -> Result<Value, RuntimeError> {
    registered
        .evaluator
        .evaluate(inputs)
        .await
        .map_err(|cause| RuntimeError::ModuleFailure { module: module_name.to_string(), cause: cause.to_string() })
}

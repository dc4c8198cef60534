//! Parallel, promise-per-data-node execution engine for a compiled
//! Constellation DAG (spec §5, §6). Given a `constellation_compiler::Dag`
//! and a set of named input values, `Runtime::run` resolves every
//! declared output concurrently, following module dependencies through
//! `tokio::spawn`ed tasks and `DataPromise` memoization; `Runtime::resume`
//! restarts a `SuspendedExecution` with newly-provided inputs.

mod dispatch;
mod error;
mod executor;
mod interpreter;
mod listener;
mod ops;
mod options;
mod pools;
mod promise;
mod registry;

pub use error::RuntimeError;
pub use executor::{MissingInputPolicy, RunConfig, RunOutcome, Runtime, SuspendedExecution};
pub use listener::{
    CompositeListener, DefaultTracer, ExecutionListener, MetricsProvider, NoopListener, NoopMetrics, NoopTracer,
    TracerProvider, TracingMetrics,
};
pub use ops::{and, binary, coalesce, concat, conditional, field_access, guard, merge, not, or, project};
pub use options::{resolve, ResolvedOptions};
pub use pools::{ExecutionState, ModuleStatus, PoolMetrics, PromisePool, StatePool};
pub use promise::{DataPromise, Outcome};
pub use registry::{HostModuleRegistry, ModuleEvaluator, RegisteredModule};

//! The parallel, promise-per-data-node evaluator (spec §5) and its
//! suspend/resume entry points (spec §3, §6). Grounded on
//! `langgraph-core/src/pregel/{executor.rs,algo.rs,loop_impl.rs}`'s
//! dataflow-parallel task dispatch and `langgraph-core/src/interrupt.rs`'s
//! suspended-run record, re-expressed over `DataPromise` instead of a
//! channel/checkpoint pair.
//!
//! A module node is the unit of scheduling; a data node's `DataPromise`
//! is the sole coordination primitive. `resolve_data_node` and
//! `run_module` are mutually recursive through `await_data`, so
//! `resolve_data_node` is boxed explicitly — the same reason
//! `interpreter::eval_graph` is.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use constellation_cache::{cache_key, CacheBackendExt, CacheRegistry};
use constellation_compiler::{Dag, DataId, InEdge, ModuleId, ModuleRef, SyntheticKind};
use constellation_resilience::{ConcurrencyLimiter, Throttle};
use constellation_scheduler::BoundedScheduler;
use constellation_types::{Type, Value};
use futures::future::{join_all, BoxFuture};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::dispatch;
use crate::error::RuntimeError;
use crate::interpreter;
use crate::listener::{ExecutionListener, NoopListener};
use crate::ops;
use crate::options::{self, ResolvedOptions};
use crate::pools::ModuleStatus;
use crate::promise::{DataPromise, Outcome};
use crate::registry::HostModuleRegistry;

/// Whether a missing required input at the start of a run produces a
/// suspended execution or a hard error (spec §6: "missing names either
/// produce a suspended execution or an error depending on run mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInputPolicy {
    Suspend,
    Fail,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub missing_input_policy: MissingInputPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig { missing_input_policy: MissingInputPolicy::Suspend }
    }
}

/// A self-contained, resumable snapshot of a run that couldn't proceed
/// (spec §3, "Suspended execution"). Resuming re-populates the data
/// table from `computed_values` and merges `new_inputs` into
/// `provided_inputs` before starting a fresh run over the same `dag` —
/// whose per-module `options` are already carried inside it, so there's
/// no separate `options` field here (see DESIGN.md).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SuspendedExecution {
    pub execution_id: Uuid,
    pub structural_hash: String,
    pub resumption_count: u32,
    pub dag: Dag,
    pub provided_inputs: HashMap<String, Value>,
    pub computed_values: HashMap<DataId, Value>,
    pub module_statuses: HashMap<ModuleId, ModuleStatus>,
}

pub enum RunOutcome {
    Success { outputs: HashMap<String, Value> },
    Suspended(SuspendedExecution),
    Failed { error: Arc<RuntimeError>, failed_modules: Vec<ModuleId> },
}

/// Per-execution state the evaluator reads and mutates while a run is
/// in flight. Held behind an `Arc` so spawned module tasks can share it
/// without copying the DAG or the promise table.
struct ExecutionContext {
    dag: Arc<Dag>,
    registry: Arc<HostModuleRegistry>,
    cache_registry: Arc<CacheRegistry>,
    #[allow(dead_code)]
    scheduler: Option<Arc<BoundedScheduler>>,
    listener: Arc<dyn ExecutionListener>,
    execution_id: Uuid,
    promises: HashMap<DataId, DataPromise>,
    inputs: HashMap<String, Value>,
    resolved_options: HashMap<ModuleId, ResolvedOptions>,
    throttles: HashMap<ModuleId, Throttle>,
    concurrency_limiters: HashMap<ModuleId, ConcurrencyLimiter>,
    module_statuses: AsyncMutex<HashMap<ModuleId, ModuleStatus>>,
}

impl ExecutionContext {
    async fn set_status(&self, module: ModuleId, status: ModuleStatus) {
        self.module_statuses.lock().await.insert(module, status);
    }
}

/// Resolves (or joins the in-flight resolution of) one data node's
/// promise, spawning its producing module the first time it's needed.
fn await_data(ctx: Arc<ExecutionContext>, id: DataId) -> BoxFuture<'static, Outcome> {
    Box::pin(async move {
        let ctx_for_producer = ctx.clone();
        ctx.promises
            .get(&id)
            .expect("every data id has a promise")
            .get_or_resolve(move || resolve_data_node(ctx_for_producer, id))
            .await
    })
}

/// Produces one data node's `Outcome`: a literal's already-known value,
/// an input's externally-provided value (or default), or a module's
/// result — spawned onto its own task so independent branches run on
/// genuinely separate OS threads, not just interleaved futures.
fn resolve_data_node(ctx: Arc<ExecutionContext>, id: DataId) -> BoxFuture<'static, Outcome> {
    Box::pin(async move {
        if let Some(literal) = ctx.dag.literals.get(&id) {
            return Outcome::Value(literal.clone());
        }

        let data_node = match ctx.dag.data_nodes.get(&id) {
            Some(node) => node,
            None => return Outcome::Failed(Arc::new(RuntimeError::MissingInput(id.to_string()))),
        };

        match data_node.producer {
            None => {
                if let Some(name) = &data_node.name {
                    if let Some(value) = ctx.inputs.get(name) {
                        return Outcome::Value(value.clone());
                    }
                }
                if let Some(default_id) = data_node.default {
                    return await_data(ctx.clone(), default_id).await;
                }
                let name = data_node.name.clone().unwrap_or_else(|| id.to_string());
                Outcome::Failed(Arc::new(RuntimeError::MissingInput(name)))
            }
            Some(module_id) => match tokio::spawn(run_module(ctx.clone(), module_id)).await {
                Ok(outcome) => outcome,
                Err(join_err) => Outcome::Failed(Arc::new(RuntimeError::ModuleFailure {
                    module: module_id.to_string(),
                    cause: format!("module task did not complete: {join_err}"),
                })),
            },
        }
    })
}

/// Runs one module node to completion: gathers its inputs concurrently,
/// cascades cancellation if any of them is cancelled or failed, then
/// dispatches to a synthetic transform or a host module call.
async fn run_module(ctx: Arc<ExecutionContext>, module_id: ModuleId) -> Outcome {
    let in_edges: Vec<&InEdge> = ctx.dag.in_edges_for(module_id).collect();
    let dependency_outcomes = join_all(in_edges.iter().map(|edge| await_data(ctx.clone(), edge.data))).await;

    if dependency_outcomes.iter().any(Outcome::is_terminal_failure) {
        return Outcome::Cancelled;
    }

    let ordered: Vec<(String, Value)> = in_edges
        .iter()
        .zip(dependency_outcomes)
        .map(|(edge, outcome)| (edge.nickname.clone(), outcome.into_value().expect("checked above")))
        .collect();

    let module_node = &ctx.dag.module_nodes[&module_id];
    match &module_node.module {
        ModuleRef::Synthetic(kind) => match run_synthetic(&ctx, module_id, kind, ordered).await {
            Ok(value) => Outcome::Value(value),
            Err(err) => Outcome::Failed(Arc::new(err)),
        },
        ModuleRef::Named(name) => execute_named_module(&ctx, module_id, name, ordered).await,
    }
}

/// Dispatches one synthetic (compiler-generated) transform directly to
/// `ops.rs`/`interpreter.rs`. No listener events, resilience decoration,
/// or cache wrapping here: synthetic modules are compiler plumbing for
/// the source language's inline expressions, not host module calls, and
/// spec §4.4 never gives them options to read in the first place.
async fn run_synthetic(
    ctx: &ExecutionContext,
    module_id: ModuleId,
    kind: &SyntheticKind,
    ordered: Vec<(String, Value)>,
) -> Result<Value, RuntimeError> {
    match kind {
        SyntheticKind::Concat => ops::concat(ordered.into_iter().map(|(_, v)| v).collect()),
        SyntheticKind::HigherOrder { op, lambda } => {
            let mut by_name: HashMap<String, Value> = ordered.into_iter().collect();
            let list = by_name.remove("list").ok_or_else(|| RuntimeError::MissingInput("list".into()))?;
            interpreter::eval_higher_order(&ctx.registry, *op, list, lambda, &by_name).await
        }
        SyntheticKind::Match { arms } => {
            let mut by_name: HashMap<String, Value> = ordered.into_iter().collect();
            let scrutinee = by_name.remove("scrutinee").ok_or_else(|| RuntimeError::MissingInput("scrutinee".into()))?;
            interpreter::eval_match(&ctx.registry, scrutinee, arms, &by_name).await
        }
        _ => {
            let mut by_name: HashMap<String, Value> = ordered.into_iter().collect();
            let mut take = |key: &str| -> Result<Value, RuntimeError> {
                by_name.remove(key).ok_or_else(|| RuntimeError::MissingInput(key.to_string()))
            };
            match kind {
                SyntheticKind::Merge => ops::merge(take("a")?, take("b")?),
                SyntheticKind::Project { fields } => ops::project(take("src")?, fields),
                SyntheticKind::Field { field } => ops::field_access(take("src")?, field),
                SyntheticKind::Cond => ops::conditional(take("cond")?, take("then")?, take("else")?),
                SyntheticKind::Guard => {
                    let inner_type = guard_inner_type(ctx, module_id);
                    ops::guard(take("src")?, take("cond")?, inner_type)
                }
                SyntheticKind::Coalesce => ops::coalesce(take("a")?, take("b")?),
                SyntheticKind::And => ops::and(take("a")?, take("b")?),
                SyntheticKind::Or => ops::or(take("a")?, take("b")?),
                SyntheticKind::Not => ops::not(take("a")?),
                SyntheticKind::Binary(op) => ops::binary(*op, take("a")?, take("b")?),
                SyntheticKind::Concat | SyntheticKind::HigherOrder { .. } | SyntheticKind::Match { .. } => {
                    unreachable!("handled above")
                }
            }
        }
    }
}

/// `Guard`'s own produced data node is typed `Optional<T>`; the wrapped
/// value it guards is `T`.
fn guard_inner_type(ctx: &ExecutionContext, module_id: ModuleId) -> Type {
    let out_edge = ctx.dag.out_edge_for(module_id).expect("every module has exactly one output");
    match &ctx.dag.data_nodes[&out_edge.data].ty {
        Type::Optional(inner) => inner.as_ref().clone(),
        other => other.clone(),
    }
}

/// Runs a host-registered module through the cache → execute → timeout
/// → retry → fallback chain (spec §4.6), recording listener events and
/// module-status transitions along the way.
async fn execute_named_module(ctx: &ExecutionContext, module_id: ModuleId, name: &str, ordered: Vec<(String, Value)>) -> Outcome {
    let start = Instant::now();
    ctx.listener.on_module_start(ctx.execution_id, module_id);
    ctx.set_status(module_id, ModuleStatus::Running).await;

    let registered = match ctx.registry.get(name) {
        Some(r) => r,
        None => {
            let err = RuntimeError::ModuleFailure { module: name.to_string(), cause: "module not registered".into() };
            return fail_module(ctx, module_id, err).await;
        }
    };

    let resolved = ctx.resolved_options.get(&module_id).cloned().unwrap_or_default();
    let throttle = ctx.throttles.get(&module_id);
    let concurrency = ctx.concurrency_limiters.get(&module_id);

    if let Some(ttl) = resolved.cache_ttl {
        if let Some(backend) = ctx.cache_registry.get(resolved.cache_backend.as_deref()) {
            let mut sorted_inputs = ordered.clone();
            sorted_inputs.sort_by(|a, b| a.0.cmp(&b.0));
            let key = cache_key(name, &sorted_inputs, None);

            match backend.get::<Value>(&key).await {
                Ok(Some(entry)) if !entry.expired(Utc::now()) => {
                    return succeed_module(ctx, module_id, start, entry.value).await;
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(module = name, error = %err, "cache read failed, treating as miss"),
            }

            let inputs: HashMap<String, Value> = ordered.into_iter().collect();
            return match dispatch::call_module_with_guards(name, registered, inputs, &resolved, throttle, concurrency).await {
                Ok(value) => {
                    let chrono_ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
                    if let Err(err) = backend.set(&key, value.clone(), chrono_ttl).await {
                        tracing::warn!(module = name, error = %err, "cache write failed, result still returned");
                    }
                    succeed_module(ctx, module_id, start, value).await
                }
                Err(err) => fail_module(ctx, module_id, err).await,
            };
        }
    }

    let inputs: HashMap<String, Value> = ordered.into_iter().collect();
    match dispatch::call_module_with_guards(name, registered, inputs, &resolved, throttle, concurrency).await {
        Ok(value) => succeed_module(ctx, module_id, start, value).await,
        Err(err) => fail_module(ctx, module_id, err).await,
    }
}

async fn succeed_module(ctx: &ExecutionContext, module_id: ModuleId, start: Instant, value: Value) -> Outcome {
    ctx.listener.on_module_complete(ctx.execution_id, module_id, start.elapsed());
    ctx.set_status(module_id, ModuleStatus::Succeeded).await;
    Outcome::Value(value)
}

async fn fail_module(ctx: &ExecutionContext, module_id: ModuleId, err: RuntimeError) -> Outcome {
    ctx.listener.on_module_failed(ctx.execution_id, module_id, &err);
    ctx.set_status(module_id, ModuleStatus::Failed(err.to_string())).await;
    Outcome::Failed(Arc::new(err))
}

/// Builds the promise table, resolved options, and per-module
/// throttle/concurrency state for one run, then drives every declared
/// output's promise to completion (spec §5). `run`/`resume` are the
/// only entry points a host needs.
pub struct Runtime {
    registry: Arc<HostModuleRegistry>,
    cache_registry: Arc<CacheRegistry>,
    scheduler: Option<Arc<BoundedScheduler>>,
    listener: Arc<dyn ExecutionListener>,
    config: RunConfig,
}

impl Runtime {
    pub fn new(registry: HostModuleRegistry, cache_registry: CacheRegistry) -> Self {
        Runtime {
            registry: Arc::new(registry),
            cache_registry: Arc::new(cache_registry),
            scheduler: None,
            listener: Arc::new(NoopListener),
            config: RunConfig::default(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<BoundedScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn run(&self, dag: Dag, inputs: HashMap<String, Value>) -> RunOutcome {
        self.run_internal(dag, inputs, HashMap::new(), 0, None).await
    }

    /// Starts a new run whose data table is pre-populated from a
    /// suspended execution's `computed_values`, with `new_inputs` merged
    /// over its `provided_inputs` (spec §9: "resuming is starting a new
    /// run"). The resumed run keeps the same `execution_id` and carries
    /// forward `resumption_count + 1`.
    pub async fn resume(&self, suspended: SuspendedExecution, new_inputs: HashMap<String, Value>) -> RunOutcome {
        let mut inputs = suspended.provided_inputs;
        inputs.extend(new_inputs);
        self.run_internal(
            suspended.dag,
            inputs,
            suspended.computed_values,
            suspended.resumption_count + 1,
            Some(suspended.execution_id),
        )
        .await
    }

    async fn run_internal(
        &self,
        dag: Dag,
        inputs: HashMap<String, Value>,
        precomputed: HashMap<DataId, Value>,
        resumption_count: u32,
        execution_id: Option<Uuid>,
    ) -> RunOutcome {
        let execution_id = execution_id.unwrap_or_else(Uuid::new_v4);
        let structural_hash = constellation_compiler::structural_hash(&dag);

        let declared_names: HashSet<&str> = dag.data_nodes.values().filter_map(|n| n.name.as_deref()).collect();
        for name in inputs.keys() {
            if !declared_names.contains(name.as_str()) {
                let err = RuntimeError::RuntimeTypeError {
                    expected: "a declared input name".to_string(),
                    actual: name.clone(),
                };
                return RunOutcome::Failed { error: Arc::new(err), failed_modules: vec![] };
            }
        }

        let missing_required: Vec<String> = dag
            .data_nodes
            .values()
            .filter(|node| node.producer.is_none() && node.default.is_none())
            .filter_map(|node| node.name.clone())
            .filter(|name| !inputs.contains_key(name))
            .collect();

        if !missing_required.is_empty() {
            return match self.config.missing_input_policy {
                MissingInputPolicy::Suspend => RunOutcome::Suspended(SuspendedExecution {
                    execution_id,
                    structural_hash,
                    resumption_count,
                    dag,
                    provided_inputs: inputs,
                    computed_values: precomputed,
                    module_statuses: HashMap::new(),
                }),
                MissingInputPolicy::Fail => RunOutcome::Failed {
                    error: Arc::new(RuntimeError::MissingInput(missing_required.into_iter().next().unwrap())),
                    failed_modules: vec![],
                },
            };
        }

        let mut promises = HashMap::with_capacity(dag.data_nodes.len());
        for &id in dag.data_nodes.keys() {
            let promise = DataPromise::new();
            if let Some(value) = precomputed.get(&id) {
                promise.preset(Outcome::Value(value.clone()));
            }
            promises.insert(id, promise);
        }

        let mut resolved_options = HashMap::with_capacity(dag.module_nodes.len());
        let mut throttles = HashMap::new();
        let mut concurrency_limiters = HashMap::new();
        for (&module_id, module_node) in &dag.module_nodes {
            let resolved = options::resolve(&module_node.options);
            if let Some((rate, window)) = resolved.throttle {
                throttles.insert(module_id, Throttle::new(rate as u32, window));
            }
            if let Some(n) = resolved.concurrency {
                concurrency_limiters.insert(module_id, ConcurrencyLimiter::new(n));
            }
            resolved_options.insert(module_id, resolved);
        }

        let ctx = Arc::new(ExecutionContext {
            dag: Arc::new(dag),
            registry: self.registry.clone(),
            cache_registry: self.cache_registry.clone(),
            scheduler: self.scheduler.clone(),
            listener: self.listener.clone(),
            execution_id,
            promises,
            inputs,
            resolved_options,
            throttles,
            concurrency_limiters,
            module_statuses: AsyncMutex::new(HashMap::new()),
        });

        ctx.listener.on_execution_start(execution_id);
        let start = Instant::now();

        let output_futures = ctx.dag.outputs.iter().map(|(name, id)| {
            let ctx = ctx.clone();
            let name = name.clone();
            let id = *id;
            async move { (name, await_data(ctx, id).await) }
        });
        let results = join_all(output_futures).await;

        let mut outputs = HashMap::with_capacity(results.len());
        let mut top_error: Option<Arc<RuntimeError>> = None;
        for (name, outcome) in results {
            match outcome {
                Outcome::Value(value) => {
                    outputs.insert(name, value);
                }
                Outcome::Cancelled => {
                    top_error.get_or_insert_with(|| Arc::new(RuntimeError::Cancelled));
                }
                Outcome::Failed(err) => {
                    top_error.get_or_insert(err);
                }
            }
        }

        ctx.listener.on_execution_complete(execution_id, top_error.is_none(), start.elapsed());

        match top_error {
            None => RunOutcome::Success { outputs },
            Some(error) => {
                let statuses = ctx.module_statuses.lock().await;
                let failed_modules =
                    statuses.iter().filter(|(_, status)| matches!(status, ModuleStatus::Failed(_))).map(|(id, _)| *id).collect();
                drop(statuses);
                RunOutcome::Failed { error, failed_modules }
            }
        }
    }
}

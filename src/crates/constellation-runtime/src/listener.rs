//! Observability SPI (spec §6/§10.4): `ExecutionListener` for lifecycle
//! events, `MetricsProvider`/`TracerProvider` for the ambient metrics and
//! tracing hooks a host can plug in. All three default to no-ops so a
//! host that registers nothing pays zero overhead.
//!
//! Grounded on `langgraph-core`'s own callback-based `Interrupt`/checkpoint
//! hooks for the "composable listener" shape, generalized here into a
//! small observer trio instead of a single callback.

use std::time::Duration;

use constellation_compiler::ModuleId;
use uuid::Uuid;

use crate::error::RuntimeError;

/// Execution lifecycle hooks (spec §6, "ExecutionListener"). Methods are
/// synchronous and default to no-ops, so a listener only needs to
/// override what it cares about.
pub trait ExecutionListener: Send + Sync {
    fn on_execution_start(&self, _execution_id: Uuid) {}
    fn on_module_start(&self, _execution_id: Uuid, _module: ModuleId) {}
    fn on_module_complete(&self, _execution_id: Uuid, _module: ModuleId, _duration: Duration) {}
    fn on_module_failed(&self, _execution_id: Uuid, _module: ModuleId, _error: &RuntimeError) {}
    fn on_execution_complete(&self, _execution_id: Uuid, _succeeded: bool, _duration: Duration) {}
}

/// The default listener: every hook is a no-op.
pub struct NoopListener;

impl ExecutionListener for NoopListener {}

/// Fans one event out to many listeners. A listener that panics on a
/// callback is caught and logged rather than allowed to unwind through
/// the executor — one misbehaving observer must not take the run down
/// with it.
pub struct CompositeListener {
    listeners: Vec<Box<dyn ExecutionListener>>,
}

impl CompositeListener {
    pub fn new(listeners: Vec<Box<dyn ExecutionListener>>) -> Self {
        CompositeListener { listeners }
    }

    fn for_each(&self, call: impl Fn(&dyn ExecutionListener)) {
        for listener in &self.listeners {
            let listener = listener.as_ref();
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| call(listener))) {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::warn!(panic = %message, "execution listener panicked, ignoring");
            }
        }
    }
}

impl ExecutionListener for CompositeListener {
    fn on_execution_start(&self, execution_id: Uuid) {
        self.for_each(|l| l.on_execution_start(execution_id));
    }

    fn on_module_start(&self, execution_id: Uuid, module: ModuleId) {
        self.for_each(|l| l.on_module_start(execution_id, module));
    }

    fn on_module_complete(&self, execution_id: Uuid, module: ModuleId, duration: Duration) {
        self.for_each(|l| l.on_module_complete(execution_id, module, duration));
    }

    fn on_module_failed(&self, execution_id: Uuid, module: ModuleId, error: &RuntimeError) {
        self.for_each(|l| l.on_module_failed(execution_id, module, error));
    }

    fn on_execution_complete(&self, execution_id: Uuid, succeeded: bool, duration: Duration) {
        self.for_each(|l| l.on_execution_complete(execution_id, succeeded, duration));
    }
}

/// Ambient metrics sink (spec §10.4). Default is a no-op; a host wires
/// in a real backend (Prometheus, statsd, ...) behind this trait.
pub trait MetricsProvider: Send + Sync {
    fn counter(&self, _name: &str, _value: u64) {}
    fn histogram(&self, _name: &str, _value: f64) {}
    fn gauge(&self, _name: &str, _value: f64) {}
}

pub struct NoopMetrics;

impl MetricsProvider for NoopMetrics {}

/// Routes metrics through `tracing` events, for hosts that scrape their
/// metrics out of structured logs rather than wiring in a dedicated
/// metrics backend.
pub struct TracingMetrics;

impl MetricsProvider for TracingMetrics {
    fn counter(&self, name: &str, value: u64) {
        tracing::info!(metric = name, value, kind = "counter", "metric");
    }

    fn histogram(&self, name: &str, value: f64) {
        tracing::info!(metric = name, value, kind = "histogram", "metric");
    }

    fn gauge(&self, name: &str, value: f64) {
        tracing::info!(metric = name, value, kind = "gauge", "metric");
    }
}

/// Ambient tracing sink (spec §10.4). Grounded directly on `tracing::Span`
/// rather than a generic `span<T>(...)` method, which would need boxed
/// futures to stay object-safe; `tracing`'s own span/enter idiom gives
/// hosts the same "wrap a unit of work with named, attributed tracing"
/// capability without that cost.
pub trait TracerProvider: Send + Sync {
    fn span(&self, name: &str) -> tracing::Span;
}

pub struct NoopTracer;

impl TracerProvider for NoopTracer {
    fn span(&self, _name: &str) -> tracing::Span {
        tracing::Span::none()
    }
}

/// Emits a real `tracing` span for every call, at `DEBUG` level.
pub struct DefaultTracer;

impl TracerProvider for DefaultTracer {
    fn span(&self, name: &str) -> tracing::Span {
        tracing::debug_span!("module_execution", module = name)
    }
}

//! Host module registration (spec §6, "Module registration"). A
//! `ModuleSignature` (from `constellation-ast`) is what the checker and
//! DAG compiler see; a `ModuleEvaluator` is the execution-time half the
//! runtime adds on top.
//!
//! Grounded on `langgraph-core`'s node-function registration (a name
//! bound to an async callable, looked up by the executor at dispatch
//! time) generalized to the typed input/output contract this spec's
//! modules carry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use constellation_ast::{ModuleSignature, ModuleSignatureRegistry};
use constellation_types::Value;

/// A host-provided module implementation: named inputs in, one output
/// value out, possibly failing. Failures are `anyhow::Error` so hosts
/// can attach arbitrary context without the runtime needing to know
/// their concrete error types.
#[async_trait]
pub trait ModuleEvaluator: Send + Sync {
    async fn evaluate(&self, inputs: HashMap<String, Value>) -> anyhow::Result<Value>;
}

/// Blanket impl so an `async fn(HashMap<String, Value>) -> anyhow::Result<Value>`
/// closure can be registered directly, without a host hand-writing a
/// one-off struct for every module.
#[async_trait]
impl<F, Fut> ModuleEvaluator for F
where
    F: Fn(HashMap<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn evaluate(&self, inputs: HashMap<String, Value>) -> anyhow::Result<Value> {
        (self)(inputs).await
    }
}

#[derive(Clone)]
pub struct RegisteredModule {
    pub signature: ModuleSignature,
    pub evaluator: Arc<dyn ModuleEvaluator>,
}

/// Everything the runtime needs to know about the host's module set:
/// the typed signature (shared with the checker/compiler) and the
/// evaluator to dispatch to. Throttle and concurrency state are
/// deliberately *not* kept here — spec §4.6's "across the execution"
/// scopes that state to a single run, so the executor builds a fresh
/// `Throttle`/`ConcurrencyLimiter` per `ModuleId` each time it runs a
/// DAG, from that module-call-site's own resolved options.
#[derive(Default, Clone)]
pub struct HostModuleRegistry {
    modules: HashMap<String, RegisteredModule>,
}

impl HostModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, signature: ModuleSignature, evaluator: Arc<dyn ModuleEvaluator>) -> &mut Self {
        let name = signature.name.clone();
        self.modules.insert(name, RegisteredModule { signature, evaluator });
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredModule> {
        self.modules.get(name)
    }
}

impl ModuleSignatureRegistry for HostModuleRegistry {
    fn lookup(&self, name: &str) -> Option<&ModuleSignature> {
        self.modules.get(name).map(|m| &m.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_types::Type;

    fn signature() -> ModuleSignature {
        ModuleSignature {
            name: "Double".into(),
            namespace: "math".into(),
            version: "1.0.0".into(),
            inputs: vec![("x".into(), Type::Int)],
            output: Type::Int,
        }
    }

    #[tokio::test]
    async fn registers_and_dispatches_a_closure_module() {
        let mut registry = HostModuleRegistry::new();
        registry.register(
            signature(),
            Arc::new(|inputs: HashMap<String, Value>| async move {
                let x = match inputs.get("x") {
                    Some(Value::Int(n)) => *n,
                    _ => anyhow::bail!("missing x"),
                };
                Ok(Value::Int(x * 2))
            }),
        );

        let registered = registry.get("Double").unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), Value::Int(21));
        let result = registered.evaluator.evaluate(inputs).await.unwrap();
        assert_eq!(result, Value::Int(42));
        assert!(ModuleSignatureRegistry::lookup(&registry, "Double").is_some());
    }
}

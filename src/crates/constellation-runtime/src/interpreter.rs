//! Evaluates one `IrGraph` to a map of node id -> `Value` (spec §4.4's
//! synthetic transforms, plus the higher-order/match constructs spec
//! §4.2/§4.3 desugar into IR). Used for two distinct graphs: the nested
//! body of a lambda or match arm (always, since those never become DAG
//! nodes of their own), and — via `ops.rs` — the same transform
//! primitives the top-level DAG executor calls directly on whole data
//! nodes.
//!
//! IR node ids are assigned in generation order and a node's
//! dependencies always have strictly smaller ids than the node itself,
//! so a single ascending walk over the `BTreeMap` evaluates every node
//! after everything it reads from.

use std::collections::HashMap;

use constellation_ast::HigherOrderOp;
use constellation_ir::{IrGraph, IrId, IrLambda, IrNode, MatchArmIr};
use constellation_types::Value;
use futures::future::BoxFuture;

use crate::error::RuntimeError;
use crate::ops;
use crate::registry::HostModuleRegistry;

/// Evaluates every node in `graph`, given `bindings` for its free
/// `Input` nodes (the enclosing scope's captured values and, for a
/// lambda body, the bound parameter). Returns the full id -> value map
/// so callers can look up `graph`'s designated output id.
///
/// Boxed explicitly: `eval_graph` is reached again, through
/// `eval_higher_order`/`eval_match`/`eval_lambda`, while evaluating a
/// nested lambda or match-arm body, and an `async fn` can't name its own
/// recursive future type.
pub fn eval_graph<'a>(
    registry: &'a HostModuleRegistry,
    graph: &'a IrGraph,
    bindings: &'a HashMap<String, Value>,
) -> BoxFuture<'a, Result<HashMap<IrId, Value>, RuntimeError>> {
    Box::pin(async move {
        let mut values: HashMap<IrId, Value> = HashMap::with_capacity(graph.len());

        for (&id, node) in graph.nodes.iter() {
            let value = eval_node(registry, node, &values, bindings).await?;
            values.insert(id, value);
        }

        Ok(values)
    })
}

async fn eval_node(
    registry: &HostModuleRegistry,
    node: &IrNode,
    values: &HashMap<IrId, Value>,
    bindings: &HashMap<String, Value>,
) -> Result<Value, RuntimeError> {
    let get = |id: IrId| -> Result<Value, RuntimeError> {
        values.get(&id).cloned().ok_or(RuntimeError::Cancelled)
    };

    match node {
        IrNode::Input { name, default, .. } => match bindings.get(name) {
            Some(v) => Ok(v.clone()),
            None => match default {
                Some(id) => get(*id),
                None => Err(RuntimeError::MissingInput(name.clone())),
            },
        },
        IrNode::Literal { value, .. } => Ok(value.clone()),
        IrNode::ModuleCall { module, args, .. } => {
            let mut inputs = HashMap::with_capacity(args.len());
            for (name, id) in args {
                inputs.insert(name.clone(), get(*id)?);
            }
            let registered = registry
                .get(module)
                .ok_or_else(|| RuntimeError::ModuleFailure { module: module.clone(), cause: "module not registered".into() })?;
            crate::dispatch::call_module(module, registered, inputs).await
        }
        IrNode::MergeTransform { a, b, .. } => ops::merge(get(*a)?, get(*b)?),
        IrNode::ProjectTransform { src, fields, .. } => ops::project(get(*src)?, fields),
        IrNode::FieldAccess { src, field, .. } => ops::field_access(get(*src)?, field),
        IrNode::Conditional { cond, then_branch, else_branch, .. } => {
            ops::conditional(get(*cond)?, get(*then_branch)?, get(*else_branch)?)
        }
        IrNode::Guard { src, cond, ty } => ops::guard(get(*src)?, get(*cond)?, ty.clone()),
        IrNode::Coalesce { a, b, .. } => ops::coalesce(get(*a)?, get(*b)?),
        IrNode::And { a, b } => ops::and(get(*a)?, get(*b)?),
        IrNode::Or { a, b } => ops::or(get(*a)?, get(*b)?),
        IrNode::Not { a } => ops::not(get(*a)?),
        IrNode::Binary { op, a, b, .. } => ops::binary(*op, get(*a)?, get(*b)?),
        IrNode::Concat { parts } => {
            let values: Result<Vec<Value>, RuntimeError> = parts.iter().map(|id| get(*id)).collect();
            ops::concat(values?)
        }
        IrNode::HigherOrder { op, list, lambda, captured_inputs, .. } => {
            let list_value = get(*list)?;
            let captured = resolve_captured(captured_inputs, values)?;
            eval_higher_order(registry, *op, list_value, lambda, &captured).await
        }
        IrNode::Match { scrutinee, arms, captured_inputs, .. } => {
            let scrutinee_value = get(*scrutinee)?;
            let captured = resolve_captured(captured_inputs, values)?;
            eval_match(registry, scrutinee_value, arms, &captured).await
        }
    }
}

fn resolve_captured(
    captured_inputs: &[(String, IrId)],
    values: &HashMap<IrId, Value>,
) -> Result<HashMap<String, Value>, RuntimeError> {
    captured_inputs
        .iter()
        .map(|(name, id)| values.get(id).cloned().map(|v| (name.clone(), v)).ok_or(RuntimeError::Cancelled))
        .collect()
}

async fn eval_lambda(
    registry: &HostModuleRegistry,
    lambda: &IrLambda,
    arg: Value,
    captured: &HashMap<String, Value>,
) -> Result<Value, RuntimeError> {
    let mut bindings = captured.clone();
    bindings.insert(lambda.param_name.clone(), arg);
    for (name, _) in &lambda.captured_bindings {
        if !bindings.contains_key(name) {
            return Err(RuntimeError::MissingInput(name.clone()));
        }
    }
    let values = eval_graph(registry, &lambda.body_nodes, &bindings).await?;
    values.get(&lambda.output).cloned().ok_or(RuntimeError::Cancelled)
}

/// `Map`/`Filter`/`All`/`Any` over a list value (spec §4.2's higher-order
/// operations). `list_value` must be a `List`; each item is passed to
/// `lambda` in turn (sequentially — these bodies are typically cheap
/// pure transforms, and ordering determinism matters more than fan-out
/// here).
pub(crate) async fn eval_higher_order(
    registry: &HostModuleRegistry,
    op: HigherOrderOp,
    list_value: Value,
    lambda: &IrLambda,
    captured: &HashMap<String, Value>,
) -> Result<Value, RuntimeError> {
    let (element_type, items) = match list_value {
        Value::List { element_type, items } => (element_type, items),
        other => return Err(RuntimeError::type_mismatch_value("List", &other)),
    };

    match op {
        HigherOrderOp::Map => {
            let mut mapped = Vec::with_capacity(items.len());
            for item in items {
                mapped.push(eval_lambda(registry, lambda, item, captured).await?);
            }
            let elem_ty = mapped.first().map(|v| v.type_of()).unwrap_or(element_type);
            Ok(Value::list(elem_ty, mapped))
        }
        HigherOrderOp::Filter => {
            let mut kept = Vec::new();
            for item in items {
                let keep = eval_lambda(registry, lambda, item.clone(), captured).await?;
                if require_bool(&keep)? {
                    kept.push(item);
                }
            }
            Ok(Value::list(element_type, kept))
        }
        HigherOrderOp::All => {
            for item in items {
                let result = eval_lambda(registry, lambda, item, captured).await?;
                if !require_bool(&result)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        HigherOrderOp::Any => {
            for item in items {
                let result = eval_lambda(registry, lambda, item, captured).await?;
                if require_bool(&result)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
    }
}

fn require_bool(v: &Value) -> Result<bool, RuntimeError> {
    v.as_bool().ok_or_else(|| RuntimeError::type_mismatch_value("Bool", v))
}

/// Selects the first arm whose `pattern_tag` matches the scrutinee's
/// union tag, falling back to a wildcard arm (`pattern_tag: None`) if
/// present. `bind_name` is bound to the union's payload inside the
/// chosen arm's body.
pub(crate) async fn eval_match(
    registry: &HostModuleRegistry,
    scrutinee: Value,
    arms: &[MatchArmIr],
    captured: &HashMap<String, Value>,
) -> Result<Value, RuntimeError> {
    let (tag, payload) = match scrutinee {
        Value::Union { tag, value, .. } => (tag, *value),
        other => return Err(RuntimeError::type_mismatch_value("Union", &other)),
    };

    let arm = arms
        .iter()
        .find(|arm| arm.pattern_tag.as_deref() == Some(tag.as_str()))
        .or_else(|| arms.iter().find(|arm| arm.pattern_tag.is_none()))
        .ok_or_else(|| RuntimeError::RuntimeTypeError {
            expected: "a match arm covering the scrutinee's tag".into(),
            actual: tag.clone(),
        })?;

    let mut bindings = captured.clone();
    bindings.insert(arm.bind_name.clone(), payload);
    for (name, _) in &arm.captured_bindings {
        if !bindings.contains_key(name) {
            return Err(RuntimeError::MissingInput(name.clone()));
        }
    }

    let values = eval_graph(registry, &arm.body_nodes, &bindings).await?;
    values.get(&arm.output).cloned().ok_or(RuntimeError::Cancelled)
}

use std::collections::BTreeSet;

use constellation_ast::BinOp;
use constellation_types::Value;

use crate::generator::IrProgram;
use crate::node::{IrGraph, IrId, IrNode};

/// Runs both optimization passes spec §4.3 names: constant folding first
/// (it can turn a now-dead branch into an unreachable literal), then dead
/// code elimination against the folded graph.
pub fn optimize(program: IrProgram) -> IrProgram {
    let IrProgram { graph, outputs } = program;
    let folded = fold_constants(graph);
    eliminate_dead_code(folded, &outputs)
}

/// Dead-code elimination: walk every declared output's dependency
/// closure and drop anything unreached. A lambda's `body_nodes` is never
/// touched directly — it's pruned independently by the same walk rooted
/// at its own `output`, since `HigherOrder` nodes keep their lambda
/// regardless of whether individual body nodes inside it are reachable.
fn eliminate_dead_code(graph: IrGraph, outputs: &[(String, IrId)]) -> IrProgram {
    let mut reachable = BTreeSet::new();
    let mut stack: Vec<IrId> = outputs.iter().map(|(_, id)| *id).collect();
    while let Some(id) = stack.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(node) = graph.get(id) {
            stack.extend(node.direct_dependencies());
        }
    }

    let mut pruned = IrGraph::new();
    // Rebuild preserving the original ids: IrGraph's sequential counter
    // means we can't simply re-insert without risking id collisions with
    // nodes the caller still refers to by their original id, so prune in
    // place instead of reinserting.
    let mut nodes = graph.nodes;
    nodes.retain(|id, node| {
        if reachable.contains(id) {
            prune_lambda(node);
            true
        } else {
            false
        }
    });
    pruned.nodes = nodes;
    pruned.set_next_id(graph_next_id(&pruned));

    IrProgram { graph: pruned, outputs: outputs.to_vec() }
}

fn prune_lambda(node: &mut IrNode) {
    match node {
        IrNode::HigherOrder { lambda, .. } => {
            let lambda_outputs = [("".to_string(), lambda.output)];
            let IrProgram { graph, .. } =
                eliminate_dead_code(std::mem::take(&mut lambda.body_nodes), &lambda_outputs);
            lambda.body_nodes = graph;
        }
        IrNode::Match { arms, .. } => {
            for arm in arms {
                let arm_outputs = [("".to_string(), arm.output)];
                let IrProgram { graph, .. } =
                    eliminate_dead_code(std::mem::take(&mut arm.body_nodes), &arm_outputs);
                arm.body_nodes = graph;
            }
        }
        _ => {}
    }
}

fn graph_next_id(graph: &IrGraph) -> u32 {
    graph.nodes.keys().map(|id| id.0 + 1).max().unwrap_or(0)
}

/// Constant folding: any inline transform (never a `ModuleCall`, which
/// may have side effects or depend on a live host) whose operands are
/// all literals is replaced by the literal result of evaluating it.
fn fold_constants(mut graph: IrGraph) -> IrGraph {
    let ids: Vec<IrId> = graph.nodes.keys().copied().collect();
    for id in ids {
        if let Some(folded) = try_fold(&graph, id) {
            graph.nodes.insert(id, folded);
        }
    }
    graph
}

fn literal_of(graph: &IrGraph, id: IrId) -> Option<&Value> {
    match graph.get(id)? {
        IrNode::Literal { value, .. } => Some(value),
        _ => None,
    }
}

fn try_fold(graph: &IrGraph, id: IrId) -> Option<IrNode> {
    let node = graph.get(id)?;
    match node {
        IrNode::MergeTransform { a, b, ty } => {
            let (Value::Product(pa), Value::Product(pb)) = (literal_of(graph, *a)?, literal_of(graph, *b)?)
            else {
                return None;
            };
            let mut merged = pa.clone();
            merged.extend(pb.clone());
            Some(IrNode::Literal { value: Value::Product(merged), ty: ty.clone() })
        }
        IrNode::ProjectTransform { src, fields, ty } => {
            let Value::Product(fields_map) = literal_of(graph, *src)? else {
                return None;
            };
            let projected = fields
                .iter()
                .filter_map(|f| fields_map.get(f).map(|v| (f.clone(), v.clone())))
                .collect();
            Some(IrNode::Literal { value: Value::Product(projected), ty: ty.clone() })
        }
        IrNode::FieldAccess { src, field, ty } => {
            let Value::Product(fields_map) = literal_of(graph, *src)? else {
                return None;
            };
            let value = fields_map.get(field)?.clone();
            Some(IrNode::Literal { value, ty: ty.clone() })
        }
        IrNode::Conditional { cond, then_branch, else_branch, ty } => {
            let cond_val = literal_of(graph, *cond)?;
            let chosen = if cond_val.as_bool()? { *then_branch } else { *else_branch };
            let value = literal_of(graph, chosen)?.clone();
            Some(IrNode::Literal { value, ty: ty.clone() })
        }
        IrNode::Guard { src, cond, ty } => {
            let inner_ty = match ty {
                constellation_types::Type::Optional(inner) => (**inner).clone(),
                other => other.clone(),
            };
            let cond_val = literal_of(graph, *cond)?;
            if cond_val.as_bool()? {
                let value = literal_of(graph, *src)?.clone();
                Some(IrNode::Literal { value: Value::some(value, inner_ty), ty: ty.clone() })
            } else {
                Some(IrNode::Literal { value: Value::none(inner_ty), ty: ty.clone() })
            }
        }
        IrNode::Coalesce { a, b, ty } => {
            let a_val = literal_of(graph, *a)?;
            let chosen = match a_val {
                Value::Some_ { value, .. } => (**value).clone(),
                Value::None_ { .. } => literal_of(graph, *b)?.clone(),
                other => other.clone(),
            };
            Some(IrNode::Literal { value: chosen, ty: ty.clone() })
        }
        IrNode::And { a, b } => {
            let value = Value::Bool(literal_of(graph, *a)?.as_bool()? && literal_of(graph, *b)?.as_bool()?);
            Some(IrNode::Literal { value, ty: constellation_types::Type::Bool })
        }
        IrNode::Or { a, b } => {
            let value = Value::Bool(literal_of(graph, *a)?.as_bool()? || literal_of(graph, *b)?.as_bool()?);
            Some(IrNode::Literal { value, ty: constellation_types::Type::Bool })
        }
        IrNode::Not { a } => {
            let value = Value::Bool(!literal_of(graph, *a)?.as_bool()?);
            Some(IrNode::Literal { value, ty: constellation_types::Type::Bool })
        }
        IrNode::Binary { op, a, b, ty } => {
            let value = fold_binary(*op, literal_of(graph, *a)?, literal_of(graph, *b)?)?;
            Some(IrNode::Literal { value, ty: ty.clone() })
        }
        _ => None,
    }
}

fn fold_binary(op: BinOp, a: &Value, b: &Value) -> Option<Value> {
    match (op, a, b) {
        (BinOp::Add, Value::Int(x), Value::Int(y)) => Some(Value::Int(x + y)),
        (BinOp::Add, Value::Float(x), Value::Float(y)) => Some(Value::Float(x + y)),
        (BinOp::Add, Value::String(x), Value::String(y)) => Some(Value::String(format!("{x}{y}"))),
        (BinOp::Sub, Value::Int(x), Value::Int(y)) => Some(Value::Int(x - y)),
        (BinOp::Sub, Value::Float(x), Value::Float(y)) => Some(Value::Float(x - y)),
        (BinOp::Mul, Value::Int(x), Value::Int(y)) => Some(Value::Int(x * y)),
        (BinOp::Mul, Value::Float(x), Value::Float(y)) => Some(Value::Float(x * y)),
        (BinOp::Div, Value::Int(x), Value::Int(y)) if *y != 0 => Some(Value::Int(x / y)),
        (BinOp::Div, Value::Float(x), Value::Float(y)) => Some(Value::Float(x / y)),
        (BinOp::Eq, x, y) => Some(Value::Bool(x == y)),
        (BinOp::Neq, x, y) => Some(Value::Bool(x != y)),
        (BinOp::Lt, Value::Int(x), Value::Int(y)) => Some(Value::Bool(x < y)),
        (BinOp::Lt, Value::Float(x), Value::Float(y)) => Some(Value::Bool(x < y)),
        (BinOp::Lte, Value::Int(x), Value::Int(y)) => Some(Value::Bool(x <= y)),
        (BinOp::Lte, Value::Float(x), Value::Float(y)) => Some(Value::Bool(x <= y)),
        (BinOp::Gt, Value::Int(x), Value::Int(y)) => Some(Value::Bool(x > y)),
        (BinOp::Gt, Value::Float(x), Value::Float(y)) => Some(Value::Bool(x > y)),
        (BinOp::Gte, Value::Int(x), Value::Int(y)) => Some(Value::Bool(x >= y)),
        (BinOp::Gte, Value::Float(x), Value::Float(y)) => Some(Value::Bool(x >= y)),
        // Division by zero is never folded; the runtime raises it so the
        // failure surfaces with the execution's error semantics instead
        // of a compile-time panic.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_types::Type;

    #[test]
    fn folds_binary_add_of_two_literals() {
        let mut graph = IrGraph::new();
        let a = graph.insert(IrNode::Literal { value: Value::Int(2), ty: Type::Int });
        let b = graph.insert(IrNode::Literal { value: Value::Int(3), ty: Type::Int });
        let sum = graph.insert(IrNode::Binary { op: BinOp::Add, a, b, ty: Type::Int });
        let program = IrProgram { graph, outputs: vec![("out".into(), sum)] };
        let optimized = optimize(program);
        match optimized.graph.get(sum).unwrap() {
            IrNode::Literal { value: Value::Int(5), .. } => {}
            other => panic!("expected folded literal 5, got {:?}", other),
        }
    }

    #[test]
    fn dead_code_elimination_drops_unreachable_nodes() {
        let mut graph = IrGraph::new();
        let live = graph.insert(IrNode::Literal { value: Value::Int(1), ty: Type::Int });
        let dead = graph.insert(IrNode::Literal { value: Value::Int(2), ty: Type::Int });
        let program = IrProgram { graph, outputs: vec![("out".into(), live)] };
        let optimized = optimize(program);
        assert!(optimized.graph.get(live).is_some());
        assert!(optimized.graph.get(dead).is_none());
    }

    #[test]
    fn does_not_fold_module_calls() {
        let mut graph = IrGraph::new();
        let arg = graph.insert(IrNode::Literal { value: Value::Int(1), ty: Type::Int });
        let call = graph.insert(IrNode::ModuleCall {
            module: "fetch".into(),
            args: vec![("id".into(), arg)],
            ty: Type::Int,
            options: Default::default(),
        });
        let program = IrProgram { graph, outputs: vec![("out".into(), call)] };
        let optimized = optimize(program);
        assert!(matches!(optimized.graph.get(call).unwrap(), IrNode::ModuleCall { .. }));
    }
}

use std::collections::{BTreeSet, HashMap, HashSet};

use constellation_checker::{TypedExpr, TypedExprKind, TypedProgram};
use constellation_types::Type;

use crate::node::{IrGraph, IrId, IrLambda, IrNode, MatchArmIr};

/// The IR generator's output: the top-level graph plus the id each
/// declared output expression generated into.
#[derive(Debug, Clone)]
pub struct IrProgram {
    pub graph: IrGraph,
    pub outputs: Vec<(String, IrId)>,
}

/// Walks a type-checked program and lowers it into IR, desugaring
/// `branch`/`when`/`??` into `Conditional`/`Guard`/`Coalesce` along the
/// way (spec §4.2).
pub fn generate_program(program: &TypedProgram) -> IrProgram {
    let mut graph = IrGraph::new();
    let mut ctx: HashMap<String, IrId> = HashMap::new();

    for input in &program.inputs {
        let default = input
            .default
            .as_ref()
            .map(|expr| generate_expr(expr, &mut graph, &ctx));
        let id = graph.insert(IrNode::Input {
            name: input.name.clone(),
            ty: input.declared_type.clone(),
            default,
        });
        ctx.insert(input.name.clone(), id);
    }

    for (name, expr) in &program.lets {
        let id = generate_expr(expr, &mut graph, &ctx);
        ctx.insert(name.clone(), id);
    }

    let outputs = program
        .outputs
        .iter()
        .map(|(name, expr)| (name.clone(), generate_expr(expr, &mut graph, &ctx)))
        .collect();

    IrProgram { graph, outputs }
}

fn generate_expr(expr: &TypedExpr, graph: &mut IrGraph, ctx: &HashMap<String, IrId>) -> IrId {
    match &expr.kind {
        TypedExprKind::VarRef(name) => *ctx
            .get(name)
            .unwrap_or_else(|| panic!("generator bug: unresolved variable {:?} survived type checking", name)),

        TypedExprKind::Literal(value) => graph.insert(IrNode::Literal {
            value: value.clone(),
            ty: expr.ty.clone(),
        }),

        TypedExprKind::FieldAccess { base, field } => {
            let src = generate_expr(base, graph, ctx);
            graph.insert(IrNode::FieldAccess {
                src,
                field: field.clone(),
                ty: expr.ty.clone(),
            })
        }

        TypedExprKind::Project { base, fields } => {
            let src = generate_expr(base, graph, ctx);
            graph.insert(IrNode::ProjectTransform {
                src,
                fields: fields.clone(),
                ty: expr.ty.clone(),
            })
        }

        TypedExprKind::Merge { left, right } => {
            let a = generate_expr(left, graph, ctx);
            let b = generate_expr(right, graph, ctx);
            graph.insert(IrNode::MergeTransform { a, b, ty: expr.ty.clone() })
        }

        // `x when c` desugars to `Guard(x, c)`.
        TypedExprKind::When { base, cond } => {
            let src = generate_expr(base, graph, ctx);
            let cond_id = generate_expr(cond, graph, ctx);
            graph.insert(IrNode::Guard { src, cond: cond_id, ty: expr.ty.clone() })
        }

        // `a ?? b` desugars to `Coalesce(a, b)`.
        TypedExprKind::Coalesce { left, right } => {
            let a = generate_expr(left, graph, ctx);
            let b = generate_expr(right, graph, ctx);
            graph.insert(IrNode::Coalesce { a, b, ty: expr.ty.clone() })
        }

        TypedExprKind::Conditional { cond, then_branch, else_branch } => {
            let cond_id = generate_expr(cond, graph, ctx);
            let then_id = generate_expr(then_branch, graph, ctx);
            let else_id = generate_expr(else_branch, graph, ctx);
            graph.insert(IrNode::Conditional {
                cond: cond_id,
                then_branch: then_id,
                else_branch: else_id,
                ty: expr.ty.clone(),
            })
        }

        // `branch { c1 -> v1; ...; else -> d }` desugars to a
        // right-nested `Conditional` chain.
        TypedExprKind::Branch { arms, default } => {
            let mut acc = generate_expr(default, graph, ctx);
            for (cond, value) in arms.iter().rev() {
                let cond_id = generate_expr(cond, graph, ctx);
                let value_id = generate_expr(value, graph, ctx);
                acc = graph.insert(IrNode::Conditional {
                    cond: cond_id,
                    then_branch: value_id,
                    else_branch: acc,
                    ty: expr.ty.clone(),
                });
            }
            acc
        }

        TypedExprKind::ModuleCall { module, args, options } => {
            let arg_ids = args
                .iter()
                .map(|(name, value)| (name.clone(), generate_expr(value, graph, ctx)))
                .collect();
            graph.insert(IrNode::ModuleCall {
                module: module.clone(),
                args: arg_ids,
                ty: expr.ty.clone(),
                options: options.clone(),
            })
        }

        TypedExprKind::Lambda { .. } => {
            unreachable!("a Lambda can only be generated through its enclosing HigherOrder node")
        }

        TypedExprKind::HigherOrder { op, list, lambda } => {
            generate_higher_order(*op, list, lambda, &expr.ty, graph, ctx)
        }

        TypedExprKind::Match { scrutinee, arms } => {
            let scrutinee_id = generate_expr(scrutinee, graph, ctx);
            let mut arm_ids = Vec::new();
            let mut all_captured_inputs = Vec::new();
            for arm in arms {
                let mut bound = HashSet::new();
                bound.insert(arm.bind_name.clone());
                let mut free = BTreeSet::new();
                collect_free_vars(&arm.body, &bound, &mut free);

                let mut inner_graph = IrGraph::new();
                let mut inner_ctx: HashMap<String, IrId> = HashMap::new();
                // The bound payload's type is the arm body's own free
                // use of it; since the checker doesn't surface the
                // payload type directly here, the arm body's inferred
                // type stands in as a reasonable default when the
                // payload itself is never otherwise typed by the node
                // graph — the runtime's `$match` evaluator is the one
                // that actually supplies the unwrapped value.
                let param_input = inner_graph.insert(IrNode::Input {
                    name: arm.bind_name.clone(),
                    ty: arm.body.ty.clone(),
                    default: None,
                });
                inner_ctx.insert(arm.bind_name.clone(), param_input);

                let mut captured_bindings = Vec::new();
                for name in free {
                    if let Some(&outer_id) = ctx.get(&name) {
                        let outer_ty = graph.get(outer_id).expect("outer id must exist").output_type().clone();
                        let inner_input = inner_graph.insert(IrNode::Input {
                            name: name.clone(),
                            ty: outer_ty,
                            default: None,
                        });
                        inner_ctx.insert(name.clone(), inner_input);
                        captured_bindings.push((name.clone(), inner_input));
                        all_captured_inputs.push((name, outer_id));
                    }
                }

                let output = generate_expr(&arm.body, &mut inner_graph, &inner_ctx);
                arm_ids.push(MatchArmIr {
                    pattern_tag: arm.pattern_tag.clone(),
                    bind_name: arm.bind_name.clone(),
                    body_nodes: inner_graph,
                    output,
                    captured_bindings,
                });
            }
            all_captured_inputs.sort();
            all_captured_inputs.dedup();
            graph.insert(IrNode::Match {
                scrutinee: scrutinee_id,
                arms: arm_ids,
                captured_inputs: all_captured_inputs,
                ty: expr.ty.clone(),
            })
        }

        TypedExprKind::Binary { op, left, right } => {
            let a = generate_expr(left, graph, ctx);
            let b = generate_expr(right, graph, ctx);
            graph.insert(IrNode::Binary { op: *op, a, b, ty: expr.ty.clone() })
        }

        TypedExprKind::Not(inner) => {
            let a = generate_expr(inner, graph, ctx);
            graph.insert(IrNode::Not { a })
        }

        TypedExprKind::And(left, right) => {
            let a = generate_expr(left, graph, ctx);
            let b = generate_expr(right, graph, ctx);
            graph.insert(IrNode::And { a, b })
        }

        TypedExprKind::Or(left, right) => {
            let a = generate_expr(left, graph, ctx);
            let b = generate_expr(right, graph, ctx);
            graph.insert(IrNode::Or { a, b })
        }

        TypedExprKind::Interpolation(parts) => {
            let part_ids = parts.iter().map(|p| generate_expr(p, graph, ctx)).collect();
            graph.insert(IrNode::Concat { parts: part_ids })
        }
    }
}

fn generate_higher_order(
    op: constellation_ast::HigherOrderOp,
    list: &TypedExpr,
    lambda: &TypedExpr,
    result_ty: &Type,
    graph: &mut IrGraph,
    ctx: &HashMap<String, IrId>,
) -> IrId {
    let list_id = generate_expr(list, graph, ctx);

    let (param_name, param_type, body) = match &lambda.kind {
        TypedExprKind::Lambda { params, body } => {
            let (name, ty) = params[0].clone();
            (name, ty, body.as_ref())
        }
        _ => unreachable!("HigherOrder's lambda field must be a Lambda"),
    };

    // Free-variable analysis (spec §4.2): any VarRef that is neither the
    // lambda's own parameter nor bound by something inside the body is a
    // candidate; it's a real capture only if it resolves in the outer
    // context. Exhaustive over every TypedExpr variant — omitting one
    // here would silently drop a capture.
    let mut bound = HashSet::new();
    bound.insert(param_name.clone());
    let mut free = BTreeSet::new();
    collect_free_vars(body, &bound, &mut free);

    let mut inner_graph = IrGraph::new();
    let mut inner_ctx: HashMap<String, IrId> = HashMap::new();
    let param_input = inner_graph.insert(IrNode::Input {
        name: param_name.clone(),
        ty: param_type.clone(),
        default: None,
    });
    inner_ctx.insert(param_name.clone(), param_input);

    let mut captured_bindings = Vec::new();
    let mut captured_inputs = Vec::new();
    for name in free {
        // Parameter already excluded from `free` via `bound`, so a
        // capture can never collide with the parameter name — the
        // parameter always shadows an outer binding of the same name by
        // construction, not by a runtime check.
        if let Some(&outer_id) = ctx.get(&name) {
            let outer_ty = graph.get(outer_id).expect("outer id must exist").output_type().clone();
            let inner_input = inner_graph.insert(IrNode::Input {
                name: name.clone(),
                ty: outer_ty,
                default: None,
            });
            inner_ctx.insert(name.clone(), inner_input);
            captured_bindings.push((name.clone(), inner_input));
            captured_inputs.push((name, outer_id));
        }
    }

    let output = generate_expr(body, &mut inner_graph, &inner_ctx);

    let ir_lambda = IrLambda {
        param_name,
        param_type,
        body_nodes: inner_graph,
        output,
        captured_bindings,
    };

    graph.insert(IrNode::HigherOrder {
        op,
        list: list_id,
        lambda: ir_lambda,
        captured_inputs,
        ty: result_ty.clone(),
    })
}

fn collect_free_vars(expr: &TypedExpr, bound: &HashSet<String>, out: &mut BTreeSet<String>) {
    match &expr.kind {
        TypedExprKind::VarRef(name) => {
            if !bound.contains(name) {
                out.insert(name.clone());
            }
        }
        TypedExprKind::Literal(_) => {}
        TypedExprKind::FieldAccess { base, .. } => collect_free_vars(base, bound, out),
        TypedExprKind::Project { base, .. } => collect_free_vars(base, bound, out),
        TypedExprKind::Merge { left, right } => {
            collect_free_vars(left, bound, out);
            collect_free_vars(right, bound, out);
        }
        TypedExprKind::When { base, cond } => {
            collect_free_vars(base, bound, out);
            collect_free_vars(cond, bound, out);
        }
        TypedExprKind::Coalesce { left, right } => {
            collect_free_vars(left, bound, out);
            collect_free_vars(right, bound, out);
        }
        TypedExprKind::Conditional { cond, then_branch, else_branch } => {
            collect_free_vars(cond, bound, out);
            collect_free_vars(then_branch, bound, out);
            collect_free_vars(else_branch, bound, out);
        }
        TypedExprKind::Branch { arms, default } => {
            for (cond, value) in arms {
                collect_free_vars(cond, bound, out);
                collect_free_vars(value, bound, out);
            }
            collect_free_vars(default, bound, out);
        }
        TypedExprKind::ModuleCall { args, .. } => {
            for (_, value) in args {
                collect_free_vars(value, bound, out);
            }
        }
        TypedExprKind::Lambda { params, body } => {
            let mut inner_bound = bound.clone();
            for (name, _) in params {
                inner_bound.insert(name.clone());
            }
            collect_free_vars(body, &inner_bound, out);
        }
        TypedExprKind::HigherOrder { list, lambda, .. } => {
            collect_free_vars(list, bound, out);
            collect_free_vars(lambda, bound, out);
        }
        TypedExprKind::Match { scrutinee, arms } => {
            collect_free_vars(scrutinee, bound, out);
            for arm in arms {
                let mut inner_bound = bound.clone();
                inner_bound.insert(arm.bind_name.clone());
                collect_free_vars(&arm.body, &inner_bound, out);
            }
        }
        TypedExprKind::Binary { left, right, .. } => {
            collect_free_vars(left, bound, out);
            collect_free_vars(right, bound, out);
        }
        TypedExprKind::Not(inner) => collect_free_vars(inner, bound, out),
        TypedExprKind::And(left, right) | TypedExprKind::Or(left, right) => {
            collect_free_vars(left, bound, out);
            collect_free_vars(right, bound, out);
        }
        TypedExprKind::Interpolation(parts) => {
            for part in parts {
                collect_free_vars(part, bound, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_ast::{HigherOrderOp, Span};
    use constellation_checker::TypedInput;
    use constellation_types::Value;

    fn span() -> Span {
        Span::synthetic()
    }

    fn te(kind: TypedExprKind, ty: Type) -> TypedExpr {
        TypedExpr { kind, ty, span: span() }
    }

    /// S5 — Closure filter with a captured variable shadowed by the
    /// lambda's own parameter name.
    #[test]
    fn closure_capture_and_shadowing() {
        let numbers_ty = Type::list(Type::Int);
        let threshold_input = TypedInput {
            name: "threshold".into(),
            declared_type: Type::Int,
            default: None,
            span: span(),
        };
        let numbers_input = TypedInput {
            name: "numbers".into(),
            declared_type: numbers_ty.clone(),
            default: None,
            span: span(),
        };

        // filter(numbers, threshold -> gt(threshold, threshold))
        // Lambda's own parameter is named "threshold", shadowing the
        // outer "threshold" input — so this lambda captures nothing.
        let body = te(TypedExprKind::VarRef("threshold".into()), Type::Int);
        let lambda = te(
            TypedExprKind::Lambda {
                params: vec![("threshold".into(), Type::Int)],
                body: Box::new(te(
                    TypedExprKind::Binary {
                        op: constellation_ast::BinOp::Gt,
                        left: Box::new(body.clone()),
                        right: Box::new(body),
                    },
                    Type::Bool,
                )),
            },
            Type::Bool,
        );
        let higher_order = te(
            TypedExprKind::HigherOrder {
                op: HigherOrderOp::Filter,
                list: Box::new(te(TypedExprKind::VarRef("numbers".into()), numbers_ty.clone())),
                lambda: Box::new(lambda),
            },
            numbers_ty,
        );

        let program = TypedProgram {
            inputs: vec![numbers_input, threshold_input],
            lets: vec![],
            outputs: vec![("result".into(), higher_order)],
        };

        let ir = generate_program(&program);
        let (_, out_id) = &ir.outputs[0];
        match ir.graph.get(*out_id).unwrap() {
            IrNode::HigherOrder { lambda, captured_inputs, .. } => {
                assert!(captured_inputs.is_empty(), "shadowed name must not be captured");
                assert!(lambda.captured_bindings.is_empty());
            }
            other => panic!("expected HigherOrder node, got {:?}", other),
        }
    }

    #[test]
    fn closure_captures_distinct_outer_variable() {
        let numbers_ty = Type::list(Type::Int);
        let threshold_input = TypedInput {
            name: "threshold".into(),
            declared_type: Type::Int,
            default: None,
            span: span(),
        };
        let numbers_input = TypedInput {
            name: "numbers".into(),
            declared_type: numbers_ty.clone(),
            default: None,
            span: span(),
        };

        // filter(numbers, x -> gt(x, threshold))
        let lambda = te(
            TypedExprKind::Lambda {
                params: vec![("x".into(), Type::Int)],
                body: Box::new(te(
                    TypedExprKind::Binary {
                        op: constellation_ast::BinOp::Gt,
                        left: Box::new(te(TypedExprKind::VarRef("x".into()), Type::Int)),
                        right: Box::new(te(TypedExprKind::VarRef("threshold".into()), Type::Int)),
                    },
                    Type::Bool,
                )),
            },
            Type::Bool,
        );
        let higher_order = te(
            TypedExprKind::HigherOrder {
                op: HigherOrderOp::Filter,
                list: Box::new(te(TypedExprKind::VarRef("numbers".into()), numbers_ty.clone())),
                lambda: Box::new(lambda),
            },
            numbers_ty,
        );

        let program = TypedProgram {
            inputs: vec![numbers_input, threshold_input],
            lets: vec![],
            outputs: vec![("result".into(), higher_order)],
        };

        let ir = generate_program(&program);
        let (_, out_id) = &ir.outputs[0];
        match ir.graph.get(*out_id).unwrap() {
            IrNode::HigherOrder { lambda, captured_inputs, .. } => {
                assert_eq!(captured_inputs.len(), 1);
                assert_eq!(captured_inputs[0].0, "threshold");
                assert_eq!(lambda.captured_bindings.len(), 1);
            }
            other => panic!("expected HigherOrder node, got {:?}", other),
        }
    }

    #[test]
    fn branch_desugars_to_right_nested_conditional() {
        let cond_a = te(TypedExprKind::Literal(Value::Bool(true)), Type::Bool);
        let val_a = te(TypedExprKind::Literal(Value::Int(1)), Type::Int);
        let default = te(TypedExprKind::Literal(Value::Int(0)), Type::Int);
        let branch = te(
            TypedExprKind::Branch { arms: vec![(cond_a, val_a)], default: Box::new(default) },
            Type::Int,
        );
        let program = TypedProgram {
            inputs: vec![],
            lets: vec![],
            outputs: vec![("out".into(), branch)],
        };
        let ir = generate_program(&program);
        let (_, out_id) = &ir.outputs[0];
        assert!(matches!(ir.graph.get(*out_id).unwrap(), IrNode::Conditional { .. }));
    }
}

use std::collections::HashMap;

use constellation_ast::{
    BinOp, Decl, Expr, HigherOrderOp, Lambda, Literal, MatchArm, ModuleSignatureRegistry, Program,
    Span,
};
use constellation_types::{Type, Value};

use crate::error::{CompileError, CompileErrors};
use crate::options::validate_options;
use crate::typed::{TypedExpr, TypedExprKind, TypedInput, TypedMatchArm, TypedProgram};

type Env = HashMap<String, Type>;

/// Type-checks a whole program, accumulating every compile error instead
/// of stopping at the first (spec §7: "accumulate all compile errors
/// across the program before returning").
pub fn check_program(
    program: &Program,
    modules: &dyn ModuleSignatureRegistry,
) -> Result<TypedProgram, CompileErrors> {
    let mut env: Env = Env::new();
    let mut errors = CompileErrors::new();
    let mut inputs = Vec::new();
    let mut lets = Vec::new();
    let mut outputs = Vec::new();

    for decl in &program.decls {
        match decl {
            Decl::Input {
                name,
                declared_type,
                default,
                span,
            } => {
                if env.contains_key(name) {
                    errors.push(CompileError::DuplicateDeclaration {
                        name: name.clone(),
                        span: span.clone(),
                    });
                    continue;
                }
                let typed_default = match default {
                    Some(expr) => match check(expr, declared_type, &env, modules) {
                        Ok(typed) => Some(typed),
                        Err(mut e) => {
                            errors.append(&mut e);
                            None
                        }
                    },
                    None => None,
                };
                env.insert(name.clone(), declared_type.clone());
                inputs.push(TypedInput {
                    name: name.clone(),
                    declared_type: declared_type.clone(),
                    default: typed_default,
                    span: span.clone(),
                });
            }
            Decl::Let { name, expr, span: _ } => match synth(expr, &env, modules) {
                Ok(typed) => {
                    env.insert(name.clone(), typed.ty.clone());
                    lets.push((name.clone(), typed));
                }
                Err(mut e) => errors.append(&mut e),
            },
            Decl::Output { name, expr, span: _ } => match synth(expr, &env, modules) {
                Ok(typed) => outputs.push((name.clone(), typed)),
                Err(mut e) => errors.append(&mut e),
            },
        }
    }

    if errors.is_empty() {
        Ok(TypedProgram { inputs, lets, outputs })
    } else {
        Err(errors)
    }
}

/// Bidirectional `check`: succeeds if `expr` can be given a type that is a
/// subtype of `expected`.
fn check(
    expr: &Expr,
    expected: &Type,
    env: &Env,
    modules: &dyn ModuleSignatureRegistry,
) -> Result<TypedExpr, CompileErrors> {
    let typed = synth(expr, env, modules)?;
    if typed.ty.is_subtype(expected) {
        Ok(typed)
    } else {
        Err(vec![CompileError::TypeMismatch {
            expected: expected.clone(),
            actual: typed.ty,
            span: expr.span().clone(),
        }])
    }
}

/// Bidirectional `synth`: infers the type of `expr`.
fn synth(
    expr: &Expr,
    env: &Env,
    modules: &dyn ModuleSignatureRegistry,
) -> Result<TypedExpr, CompileErrors> {
    match expr {
        Expr::VarRef { name, span } => match env.get(name) {
            Some(ty) => Ok(TypedExpr {
                kind: TypedExprKind::VarRef(name.clone()),
                ty: ty.clone(),
                span: span.clone(),
            }),
            None => Err(vec![CompileError::UndefinedVariable {
                name: name.clone(),
                span: span.clone(),
            }]),
        },

        Expr::Literal { value, span } => {
            let v = literal_to_value(value);
            let ty = v.type_of();
            Ok(TypedExpr {
                kind: TypedExprKind::Literal(v),
                ty,
                span: span.clone(),
            })
        }

        Expr::FieldAccess { base, field, span } => {
            let typed_base = synth(base, env, modules)?;
            let result_ty = match &typed_base.ty {
                Type::Product(fields) => fields.get(field).cloned().ok_or_else(|| {
                    vec![CompileError::FieldNotFound {
                        field: field.clone(),
                        available: fields.keys().cloned().collect(),
                        span: span.clone(),
                    }]
                })?,
                Type::List(elem) => match elem.as_ref() {
                    Type::Product(fields) => {
                        let field_ty = fields.get(field).cloned().ok_or_else(|| {
                            vec![CompileError::FieldNotFound {
                                field: field.clone(),
                                available: fields.keys().cloned().collect(),
                                span: span.clone(),
                            }]
                        })?;
                        Type::list(field_ty)
                    }
                    other => {
                        return Err(vec![CompileError::TypeMismatch {
                            expected: Type::product([]).unwrap(),
                            actual: other.clone(),
                            span: span.clone(),
                        }])
                    }
                },
                other => {
                    return Err(vec![CompileError::TypeMismatch {
                        expected: Type::product([]).unwrap(),
                        actual: other.clone(),
                        span: span.clone(),
                    }])
                }
            };
            Ok(TypedExpr {
                kind: TypedExprKind::FieldAccess {
                    base: Box::new(typed_base),
                    field: field.clone(),
                },
                ty: result_ty,
                span: span.clone(),
            })
        }

        Expr::Project { base, fields, span } => {
            let typed_base = synth(base, env, modules)?;
            let project_record = |record: &std::collections::BTreeMap<String, Type>| {
                let mut out = std::collections::BTreeMap::new();
                for f in fields {
                    match record.get(f) {
                        Some(ty) => {
                            out.insert(f.clone(), ty.clone());
                        }
                        None => {
                            return Err(vec![CompileError::InvalidProjection {
                                field: f.clone(),
                                span: span.clone(),
                            }])
                        }
                    }
                }
                Ok(Type::Product(out))
            };
            let result_ty = match &typed_base.ty {
                Type::Product(record) => project_record(record)?,
                Type::List(elem) => match elem.as_ref() {
                    Type::Product(record) => Type::list(project_record(record)?),
                    other => {
                        return Err(vec![CompileError::TypeMismatch {
                            expected: Type::product([]).unwrap(),
                            actual: other.clone(),
                            span: span.clone(),
                        }])
                    }
                },
                other => {
                    return Err(vec![CompileError::TypeMismatch {
                        expected: Type::product([]).unwrap(),
                        actual: other.clone(),
                        span: span.clone(),
                    }])
                }
            };
            Ok(TypedExpr {
                kind: TypedExprKind::Project {
                    base: Box::new(typed_base),
                    fields: fields.clone(),
                },
                ty: result_ty,
                span: span.clone(),
            })
        }

        Expr::Merge { left, right, span } => {
            let (left_r, right_r) = (synth(left, env, modules), synth(right, env, modules));
            let (typed_left, typed_right) = join2(left_r, right_r)?;
            let result_ty = merge_types(&typed_left.ty, &typed_right.ty, span)?;
            Ok(TypedExpr {
                kind: TypedExprKind::Merge {
                    left: Box::new(typed_left),
                    right: Box::new(typed_right),
                },
                ty: result_ty,
                span: span.clone(),
            })
        }

        Expr::When { base, cond, span } => {
            let (base_r, cond_r) = (
                synth(base, env, modules),
                check(cond, &Type::Bool, env, modules),
            );
            let (typed_base, typed_cond) = join2(base_r, cond_r)?;
            let ty = Type::optional(typed_base.ty.clone());
            Ok(TypedExpr {
                kind: TypedExprKind::When {
                    base: Box::new(typed_base),
                    cond: Box::new(typed_cond),
                },
                ty,
                span: span.clone(),
            })
        }

        Expr::Coalesce { left, right, span } => {
            let typed_left = synth(left, env, modules)?;
            let inner = match &typed_left.ty {
                Type::Optional(inner) => inner.as_ref().clone(),
                other => {
                    return Err(vec![CompileError::CoalesceOnNonOptional {
                        actual: other.clone(),
                        span: span.clone(),
                    }])
                }
            };
            let typed_right = check(right, &inner, env, modules)?;
            Ok(TypedExpr {
                kind: TypedExprKind::Coalesce {
                    left: Box::new(typed_left),
                    right: Box::new(typed_right),
                },
                ty: inner,
                span: span.clone(),
            })
        }

        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
            span,
        } => {
            let cond_r = check(cond, &Type::Bool, env, modules);
            let then_r = synth(then_branch, env, modules);
            let else_r = synth(else_branch, env, modules);
            let (typed_cond, (typed_then, typed_else)) = join2(cond_r, join2(then_r, else_r))?;
            let ty = typed_then.ty.lub(&typed_else.ty).ok_or_else(|| {
                vec![CompileError::TypeMismatch {
                    expected: typed_then.ty.clone(),
                    actual: typed_else.ty.clone(),
                    span: span.clone(),
                }]
            })?;
            Ok(TypedExpr {
                kind: TypedExprKind::Conditional {
                    cond: Box::new(typed_cond),
                    then_branch: Box::new(typed_then),
                    else_branch: Box::new(typed_else),
                },
                ty,
                span: span.clone(),
            })
        }

        Expr::Branch { arms, default, span } => {
            let mut errors = CompileErrors::new();
            let mut typed_arms = Vec::new();
            for (cond, value) in arms {
                let cond_r = check(cond, &Type::Bool, env, modules);
                let value_r = synth(value, env, modules);
                match join2(cond_r, value_r) {
                    Ok(pair) => typed_arms.push(pair),
                    Err(mut e) => errors.append(&mut e),
                }
            }
            let typed_default = synth(default, env, modules);
            let typed_default = match typed_default {
                Ok(d) => Some(d),
                Err(mut e) => {
                    errors.append(&mut e);
                    None
                }
            };
            if !errors.is_empty() {
                return Err(errors);
            }
            let typed_default = typed_default.unwrap();
            let mut ty = typed_default.ty.clone();
            for (_, value) in &typed_arms {
                ty = ty.lub(&value.ty).ok_or_else(|| {
                    vec![CompileError::TypeMismatch {
                        expected: ty.clone(),
                        actual: value.ty.clone(),
                        span: span.clone(),
                    }]
                })?;
            }
            Ok(TypedExpr {
                kind: TypedExprKind::Branch {
                    arms: typed_arms,
                    default: Box::new(typed_default),
                },
                ty,
                span: span.clone(),
            })
        }

        Expr::ModuleCall {
            module,
            args,
            options,
            span,
        } => {
            let signature = modules.lookup(module).ok_or_else(|| {
                vec![CompileError::UndefinedModule {
                    name: module.clone(),
                    span: span.clone(),
                }]
            })?;

            let mut errors = CompileErrors::new();
            if let Err(mut e) = validate_options(options) {
                errors.append(&mut e);
            }

            if args.len() != signature.inputs.len() {
                errors.push(CompileError::ArityMismatch {
                    module: module.clone(),
                    expected: signature.inputs.len(),
                    actual: args.len(),
                    span: span.clone(),
                });
            }

            let mut typed_args = Vec::new();
            for (name, value_expr) in args {
                let declared = signature
                    .inputs
                    .iter()
                    .find(|(arg_name, _)| arg_name == name)
                    .map(|(_, ty)| ty.clone());
                match declared {
                    Some(ty) => match check(value_expr, &ty, env, modules) {
                        Ok(typed) => typed_args.push((name.clone(), typed)),
                        Err(mut e) => errors.append(&mut e),
                    },
                    None => errors.push(CompileError::ArityMismatch {
                        module: module.clone(),
                        expected: signature.inputs.len(),
                        actual: args.len(),
                        span: span.clone(),
                    }),
                }
            }

            if !errors.is_empty() {
                return Err(errors);
            }

            Ok(TypedExpr {
                kind: TypedExprKind::ModuleCall {
                    module: module.clone(),
                    args: typed_args,
                    options: options.clone(),
                },
                ty: signature.output.clone(),
                span: span.clone(),
            })
        }

        Expr::Lambda(Lambda { span, .. }) => Err(vec![CompileError::StandaloneLambda {
            span: span.clone(),
        }]),

        Expr::HigherOrder {
            op,
            list,
            lambda,
            span,
        } => {
            let typed_list = synth(list, env, modules)?;
            let elem_ty = match &typed_list.ty {
                Type::List(elem) => elem.as_ref().clone(),
                other => {
                    return Err(vec![CompileError::TypeMismatch {
                        expected: Type::list(other.clone()),
                        actual: other.clone(),
                        span: span.clone(),
                    }])
                }
            };
            if lambda.params.len() != 1 {
                return Err(vec![CompileError::ArityMismatch {
                    module: "<lambda>".into(),
                    expected: 1,
                    actual: lambda.params.len(),
                    span: lambda.span.clone(),
                }]);
            }
            let param_name = lambda.params[0].clone();
            let mut inner_env = env.clone();
            inner_env.insert(param_name.clone(), elem_ty.clone());

            let expected_body_ty = match op {
                HigherOrderOp::Filter | HigherOrderOp::All | HigherOrderOp::Any => Some(Type::Bool),
                HigherOrderOp::Map => None,
            };
            let typed_body = match expected_body_ty {
                Some(ty) => check(&lambda.body, &ty, &inner_env, modules)?,
                None => synth(&lambda.body, &inner_env, modules)?,
            };
            let result_ty = match op {
                HigherOrderOp::Filter => Type::list(elem_ty.clone()),
                HigherOrderOp::Map => Type::list(typed_body.ty.clone()),
                HigherOrderOp::All | HigherOrderOp::Any => Type::Bool,
            };
            let typed_lambda = TypedExpr {
                kind: TypedExprKind::Lambda {
                    params: vec![(param_name, elem_ty)],
                    body: Box::new(typed_body),
                },
                ty: result_ty.clone(),
                span: lambda.span.clone(),
            };
            Ok(TypedExpr {
                kind: TypedExprKind::HigherOrder {
                    op: *op,
                    list: Box::new(typed_list),
                    lambda: Box::new(typed_lambda),
                },
                ty: result_ty,
                span: span.clone(),
            })
        }

        Expr::Match { scrutinee, arms, span } => {
            let typed_scrutinee = synth(scrutinee, env, modules)?;
            let variants = match &typed_scrutinee.ty {
                Type::Union(variants) => variants.clone(),
                other => {
                    return Err(vec![CompileError::TypeMismatch {
                        expected: other.clone(),
                        actual: other.clone(),
                        span: span.clone(),
                    }])
                }
            };
            check_match_arms(arms, &variants, &typed_scrutinee, env, modules, span)
        }

        Expr::Binary { op, left, right, span } => {
            let (left_r, right_r) = (synth(left, env, modules), synth(right, env, modules));
            let (typed_left, typed_right) = join2(left_r, right_r)?;
            let ty = binary_result_type(*op, &typed_left.ty, &typed_right.ty, span)?;
            Ok(TypedExpr {
                kind: TypedExprKind::Binary {
                    op: *op,
                    left: Box::new(typed_left),
                    right: Box::new(typed_right),
                },
                ty,
                span: span.clone(),
            })
        }

        Expr::Not { inner, span } => {
            let typed_inner = check(inner, &Type::Bool, env, modules)?;
            Ok(TypedExpr {
                kind: TypedExprKind::Not(Box::new(typed_inner)),
                ty: Type::Bool,
                span: span.clone(),
            })
        }

        Expr::And { left, right, span } => {
            let (left_r, right_r) = (
                check(left, &Type::Bool, env, modules),
                check(right, &Type::Bool, env, modules),
            );
            let (typed_left, typed_right) = join2(left_r, right_r)?;
            Ok(TypedExpr {
                kind: TypedExprKind::And(Box::new(typed_left), Box::new(typed_right)),
                ty: Type::Bool,
                span: span.clone(),
            })
        }

        Expr::Or { left, right, span } => {
            let (left_r, right_r) = (
                check(left, &Type::Bool, env, modules),
                check(right, &Type::Bool, env, modules),
            );
            let (typed_left, typed_right) = join2(left_r, right_r)?;
            Ok(TypedExpr {
                kind: TypedExprKind::Or(Box::new(typed_left), Box::new(typed_right)),
                ty: Type::Bool,
                span: span.clone(),
            })
        }

        Expr::Interpolation { parts, span } => {
            let mut errors = CompileErrors::new();
            let mut typed_parts = Vec::new();
            for part in parts {
                match synth(part, env, modules) {
                    Ok(typed) if typed.ty.is_primitive() => typed_parts.push(typed),
                    Ok(typed) => errors.push(CompileError::TypeMismatch {
                        expected: Type::String,
                        actual: typed.ty,
                        span: part.span().clone(),
                    }),
                    Err(mut e) => errors.append(&mut e),
                }
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            Ok(TypedExpr {
                kind: TypedExprKind::Interpolation(typed_parts),
                ty: Type::String,
                span: span.clone(),
            })
        }
    }
}

fn check_match_arms(
    arms: &[MatchArm],
    variants: &std::collections::BTreeMap<String, Type>,
    scrutinee: &TypedExpr,
    env: &Env,
    modules: &dyn ModuleSignatureRegistry,
    span: &Span,
) -> Result<TypedExpr, CompileErrors> {
    let mut errors = CompileErrors::new();
    let mut typed_arms = Vec::new();
    let mut covered: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut has_wildcard = false;

    for arm in arms {
        let bind_ty = match &arm.pattern_tag {
            Some(tag) => match variants.get(tag) {
                Some(ty) => {
                    covered.insert(tag.clone());
                    ty.clone()
                }
                None => {
                    errors.push(CompileError::UnknownMatchTag {
                        tag: tag.clone(),
                        span: arm.span.clone(),
                    });
                    continue;
                }
            },
            None => {
                has_wildcard = true;
                scrutinee.ty.clone()
            }
        };
        let mut inner_env = env.clone();
        inner_env.insert(arm.bind_name.clone(), bind_ty);
        match synth(&arm.body, &inner_env, modules) {
            Ok(typed_body) => typed_arms.push(TypedMatchArm {
                pattern_tag: arm.pattern_tag.clone(),
                bind_name: arm.bind_name.clone(),
                body: Box::new(typed_body),
                span: arm.span.clone(),
            }),
            Err(mut e) => errors.append(&mut e),
        }
    }

    if !has_wildcard {
        let missing: Vec<String> = variants
            .keys()
            .filter(|tag| !covered.contains(*tag))
            .cloned()
            .collect();
        if !missing.is_empty() {
            errors.push(CompileError::NonExhaustiveMatch {
                missing,
                span: span.clone(),
            });
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut ty = typed_arms[0].body.ty.clone();
    for arm in &typed_arms[1..] {
        ty = ty.lub(&arm.body.ty).ok_or_else(|| {
            vec![CompileError::TypeMismatch {
                expected: ty.clone(),
                actual: arm.body.ty.clone(),
                span: span.clone(),
            }]
        })?;
    }

    Ok(TypedExpr {
        kind: TypedExprKind::Match {
            scrutinee: Box::new(scrutinee.clone()),
            arms: typed_arms,
        },
        ty,
        span: span.clone(),
    })
}

fn merge_types(left: &Type, right: &Type, span: &Span) -> Result<Type, CompileErrors> {
    match (left, right) {
        (Type::Product(a), Type::Product(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Type::Product(merged))
        }
        (Type::List(elem), Type::Product(b)) => match elem.as_ref() {
            Type::Product(a) => {
                let mut merged = a.clone();
                for (k, v) in b {
                    merged.insert(k.clone(), v.clone());
                }
                Ok(Type::list(Type::Product(merged)))
            }
            other => Err(vec![CompileError::TypeMismatch {
                expected: Type::product([]).unwrap(),
                actual: other.clone(),
                span: span.clone(),
            }]),
        },
        (Type::List(a_elem), Type::List(b_elem)) => match (a_elem.as_ref(), b_elem.as_ref()) {
            (Type::Product(a), Type::Product(b)) => {
                let mut merged = a.clone();
                for (k, v) in b {
                    merged.insert(k.clone(), v.clone());
                }
                Ok(Type::list(Type::Product(merged)))
            }
            _ => Err(vec![CompileError::TypeMismatch {
                expected: left.clone(),
                actual: right.clone(),
                span: span.clone(),
            }]),
        },
        _ => Err(vec![CompileError::TypeMismatch {
            expected: Type::product([]).unwrap(),
            actual: left.clone(),
            span: span.clone(),
        }]),
    }
}

fn binary_result_type(
    op: BinOp,
    left: &Type,
    right: &Type,
    span: &Span,
) -> Result<Type, CompileErrors> {
    use BinOp::*;
    let numeric = |t: &Type| matches!(t, Type::Int | Type::Float);
    match op {
        Add | Sub | Mul | Div => {
            if left == right && numeric(left) {
                Ok(left.clone())
            } else {
                Err(vec![CompileError::TypeMismatch {
                    expected: left.clone(),
                    actual: right.clone(),
                    span: span.clone(),
                }])
            }
        }
        Lt | Lte | Gt | Gte => {
            if left == right && numeric(left) {
                Ok(Type::Bool)
            } else {
                Err(vec![CompileError::TypeMismatch {
                    expected: left.clone(),
                    actual: right.clone(),
                    span: span.clone(),
                }])
            }
        }
        Eq | Neq => {
            if left == right {
                Ok(Type::Bool)
            } else {
                Err(vec![CompileError::TypeMismatch {
                    expected: left.clone(),
                    actual: right.clone(),
                    span: span.clone(),
                }])
            }
        }
    }
}

fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::List(items) => {
            let values: Vec<Value> = items.iter().map(literal_to_value).collect();
            let elem_ty = values
                .first()
                .map(|v| v.type_of())
                .unwrap_or(Type::product([]).unwrap());
            Value::list(elem_ty, values)
        }
        Literal::Product(fields) => {
            Value::product(fields.iter().map(|(k, v)| (k.clone(), literal_to_value(v))))
        }
    }
}

/// Merges two independent `synth`/`check` results, accumulating both
/// sides' errors if either failed, rather than short-circuiting on the
/// first.
fn join2<A, B>(
    a: Result<A, CompileErrors>,
    b: Result<B, CompileErrors>,
) -> Result<(A, B), CompileErrors> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(mut ea), Err(mut eb)) => {
            ea.append(&mut eb);
            Err(ea)
        }
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}

//! Whole-pipeline scenarios (spec §8, S1-S7): a `Program` hand-built the
//! way an external parser would deliver one, compiled with `constellation::compile`,
//! and run to completion with `constellation_runtime::Runtime`. No parser
//! lives in this workspace (spec §1), so every fixture here constructs
//! its AST directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use constellation::ast::{
    BinOp, Decl, Expr, HigherOrderOp, Lambda, Literal, MatchArm, ModuleSignature, OptionValue,
    OptionsBag, Program, Span,
};
use constellation::{compile, PipelineError};
use constellation_cache::{CacheBackend, CacheRegistry, InMemoryCacheBackend};
use constellation_checker::CompileError;
use constellation_runtime::{HostModuleRegistry, Runtime, RunOutcome, RuntimeError};
use constellation_types::{Type, Value};

fn span() -> Span {
    Span::synthetic()
}

fn output_of(decls: &mut Vec<Decl>, name: &str, expr: Expr) {
    decls.push(Decl::Output { name: name.to_string(), expr, span: span() });
}

/// S1: merging an input record with a fetched one, then projecting a
/// subset of the merged fields.
#[tokio::test]
async fn s1_merge_and_project_resolves_order_with_customer_tier() {
    let mut registry = HostModuleRegistry::new();
    registry.register(
        ModuleSignature {
            name: "FetchCustomer".into(),
            namespace: "crm".into(),
            version: "1.0.0".into(),
            inputs: vec![("id".into(), Type::String)],
            output: Type::product([("name".into(), Type::String), ("tier".into(), Type::String)]).unwrap(),
        },
        Arc::new(|inputs: HashMap<String, Value>| async move {
            match inputs.get("id") {
                Some(Value::String(id)) if id == "c" => Ok(Value::product([
                    ("name".to_string(), Value::String("A".into())),
                    ("tier".to_string(), Value::String("gold".into())),
                ])),
                other => anyhow::bail!("unexpected id: {other:?}"),
            }
        }),
    );

    let program = Program {
        decls: vec![
            Decl::Input {
                name: "order".into(),
                declared_type: Type::product([("id".into(), Type::String), ("total".into(), Type::Float)]).unwrap(),
                default: None,
                span: span(),
            },
            Decl::Let {
                name: "customer".into(),
                expr: Expr::ModuleCall {
                    module: "FetchCustomer".into(),
                    args: vec![(
                        "id".into(),
                        Expr::Literal { value: Literal::String("c".into()), span: span() },
                    )],
                    options: OptionsBag::default(),
                    span: span(),
                },
                span: span(),
            },
            Decl::Output {
                name: "result".into(),
                expr: Expr::Project {
                    base: Box::new(Expr::Merge {
                        left: Box::new(Expr::VarRef { name: "order".into(), span: span() }),
                        right: Box::new(Expr::VarRef { name: "customer".into(), span: span() }),
                        span: span(),
                    }),
                    fields: vec!["id".into(), "tier".into()],
                    span: span(),
                },
                span: span(),
            },
        ],
    };

    let dag = compile(&program, &registry).expect("program should compile");

    let mut inputs = HashMap::new();
    inputs.insert(
        "order".to_string(),
        Value::product([
            ("id".to_string(), Value::String("o1".into())),
            ("total".to_string(), Value::Float(10.0)),
        ]),
    );

    let runtime = Runtime::new(registry, CacheRegistry::new());
    match runtime.run(dag, inputs).await {
        RunOutcome::Success { outputs } => {
            assert_eq!(
                outputs.get("result"),
                Some(&Value::product([
                    ("id".to_string(), Value::String("o1".into())),
                    ("tier".to_string(), Value::String("gold".into())),
                ]))
            );
        }
        other => panic!("expected success, got a non-success outcome: {}", matches!(other, RunOutcome::Success { .. })),
    }
}

/// S2: a module that fails twice then succeeds recovers under `retry: 3`.
#[tokio::test]
async fn s2_retry_recovers_after_two_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_for_eval = calls.clone();

    let mut registry = HostModuleRegistry::new();
    registry.register(
        ModuleSignature { name: "Flaky".into(), namespace: "test".into(), version: "1.0.0".into(), inputs: vec![], output: Type::Int },
        Arc::new(move |_inputs: HashMap<String, Value>| {
            let calls = calls_for_eval.clone();
            async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    anyhow::bail!("attempt {attempt} failed");
                }
                Ok(Value::Int(attempt as i64))
            }
        }),
    );

    let mut options = OptionsBag::default();
    options.entries.push(("retry".into(), OptionValue::Int(3), span()));
    options.entries.push(("delay".into(), OptionValue::Duration(Duration::from_millis(1)), span()));
    options.entries.push(("backoff".into(), OptionValue::Ident("fixed".into()), span()));

    let mut decls = Vec::new();
    output_of(
        &mut decls,
        "result",
        Expr::ModuleCall { module: "Flaky".into(), args: vec![], options, span: span() },
    );
    let program = Program { decls };

    let dag = compile(&program, &registry).expect("program should compile");
    let runtime = Runtime::new(registry, CacheRegistry::new());

    match runtime.run(dag, HashMap::new()).await {
        RunOutcome::Success { outputs } => assert_eq!(outputs.get("result"), Some(&Value::Int(3))),
        RunOutcome::Failed { error, .. } => panic!("expected eventual success, got {error}"),
        RunOutcome::Suspended(_) => panic!("expected eventual success, got a suspended run"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// S3: a module that always fails still produces a value when `fallback`
/// is set — no error surfaces once attempts are exhausted.
#[tokio::test]
async fn s3_fallback_used_when_all_attempts_fail() {
    let mut registry = HostModuleRegistry::new();
    registry.register(
        ModuleSignature { name: "AlwaysFails".into(), namespace: "test".into(), version: "1.0.0".into(), inputs: vec![], output: Type::String },
        Arc::new(|_inputs: HashMap<String, Value>| async move { anyhow::bail!("always fails") }),
    );

    let mut options = OptionsBag::default();
    options.entries.push(("retry".into(), OptionValue::Int(2), span()));
    options.entries.push(("fallback".into(), OptionValue::Literal(Literal::String("X".into())), span()));

    let mut decls = Vec::new();
    output_of(
        &mut decls,
        "result",
        Expr::ModuleCall { module: "AlwaysFails".into(), args: vec![], options, span: span() },
    );
    let program = Program { decls };

    let dag = compile(&program, &registry).expect("program should compile");
    let runtime = Runtime::new(registry, CacheRegistry::new());

    match runtime.run(dag, HashMap::new()).await {
        RunOutcome::Success { outputs } => assert_eq!(outputs.get("result"), Some(&Value::String("X".into()))),
        other => panic!("expected fallback to produce a success, got {}", matches!(other, RunOutcome::Failed { .. })),
    }
}

/// S4: a module slower than its configured timeout fails the run instead
/// of hanging. A single exhausted attempt surfaces as `RetryExhausted`
/// (the decorator chain always funnels a timed-out attempt through the
/// same retry-history bookkeeping; with `retry: 0` that history holds
/// exactly the one timeout), so that's what's asserted here rather than
/// a bare `Timeout` variant.
#[tokio::test]
async fn s4_timeout_fails_a_slow_module() {
    let mut registry = HostModuleRegistry::new();
    registry.register(
        ModuleSignature { name: "Slow".into(), namespace: "test".into(), version: "1.0.0".into(), inputs: vec![], output: Type::Int },
        Arc::new(|_inputs: HashMap<String, Value>| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(Value::Int(1))
        }),
    );

    let mut options = OptionsBag::default();
    options.entries.push(("timeout".into(), OptionValue::Duration(Duration::from_millis(10)), span()));
    options.entries.push(("retry".into(), OptionValue::Int(0), span()));

    let mut decls = Vec::new();
    output_of(&mut decls, "result", Expr::ModuleCall { module: "Slow".into(), args: vec![], options, span: span() });
    let program = Program { decls };

    let dag = compile(&program, &registry).expect("program should compile");
    let runtime = Runtime::new(registry, CacheRegistry::new());

    match runtime.run(dag, HashMap::new()).await {
        RunOutcome::Failed { error, .. } => {
            assert!(matches!(error.as_ref(), RuntimeError::RetryExhausted { attempts: 1, .. }), "expected RetryExhausted, got {error}");
        }
        other => panic!("expected a timeout failure, got success={}", matches!(other, RunOutcome::Success { .. })),
    }
}

/// S5: `filter(numbers, x -> x > threshold)` binds its own lambda
/// parameter while still reading the outer `threshold` by capture.
#[tokio::test]
async fn s5_closure_filter_captures_outer_threshold() {
    let registry = HostModuleRegistry::new();

    let program = Program {
        decls: vec![
            Decl::Input { name: "numbers".into(), declared_type: Type::list(Type::Int), default: None, span: span() },
            Decl::Input { name: "threshold".into(), declared_type: Type::Int, default: None, span: span() },
            Decl::Output {
                name: "result".into(),
                expr: Expr::HigherOrder {
                    op: HigherOrderOp::Filter,
                    list: Box::new(Expr::VarRef { name: "numbers".into(), span: span() }),
                    lambda: Lambda {
                        params: vec!["x".into()],
                        body: Box::new(Expr::Binary {
                            op: BinOp::Gt,
                            left: Box::new(Expr::VarRef { name: "x".into(), span: span() }),
                            right: Box::new(Expr::VarRef { name: "threshold".into(), span: span() }),
                            span: span(),
                        }),
                        span: span(),
                    },
                    span: span(),
                },
                span: span(),
            },
        ],
    };

    let dag = compile(&program, &registry).expect("program should compile");

    let mut inputs = HashMap::new();
    inputs.insert("numbers".to_string(), Value::list(Type::Int, vec![1, 2, 3, 4].into_iter().map(Value::Int).collect()));
    inputs.insert("threshold".to_string(), Value::Int(2));

    let runtime = Runtime::new(registry, CacheRegistry::new());
    match runtime.run(dag, inputs).await {
        RunOutcome::Success { outputs } => {
            assert_eq!(outputs.get("result"), Some(&Value::list(Type::Int, vec![Value::Int(3), Value::Int(4)])));
        }
        other => panic!("expected success, got failed={}", matches!(other, RunOutcome::Failed { .. })),
    }
}

/// S6: the same `(module, inputs)` call twice with `cache: 10s` runs the
/// evaluator once; the second run is served from the cache.
#[tokio::test]
async fn s6_cache_hit_skips_second_evaluation() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_for_eval = calls.clone();

    let mut registry = HostModuleRegistry::new();
    registry.register(
        ModuleSignature {
            name: "Expensive".into(),
            namespace: "test".into(),
            version: "1.0.0".into(),
            inputs: vec![("x".into(), Type::Int)],
            output: Type::Int,
        },
        Arc::new(move |inputs: HashMap<String, Value>| {
            let calls = calls_for_eval.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                match inputs.get("x") {
                    Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
                    other => anyhow::bail!("missing x: {other:?}"),
                }
            }
        }),
    );

    let mut options = OptionsBag::default();
    options.entries.push(("cache".into(), OptionValue::Duration(Duration::from_secs(10)), span()));

    let mut decls = Vec::new();
    output_of(
        &mut decls,
        "result",
        Expr::ModuleCall {
            module: "Expensive".into(),
            args: vec![("x".into(), Expr::Literal { value: Literal::Int(21), span: span() })],
            options,
            span: span(),
        },
    );
    let program = Program { decls };

    let dag = compile(&program, &registry).expect("program should compile");

    let mut cache_registry = CacheRegistry::new();
    let backend = Arc::new(InMemoryCacheBackend::new());
    cache_registry.register("default", backend.clone());

    let runtime = Runtime::new(registry, cache_registry);

    let first = runtime.run(dag.clone(), HashMap::new()).await;
    assert!(matches!(first, RunOutcome::Success { .. }), "first run should succeed");
    let second = runtime.run(dag, HashMap::new()).await;
    assert!(matches!(second, RunOutcome::Success { .. }), "second run should succeed from cache");

    assert_eq!(calls.load(Ordering::SeqCst), 1, "evaluator should run exactly once across both calls");
    let stats = backend.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

/// S7: matching a two-variant union with only one arm and no wildcard is
/// a compile error naming the missing tag.
#[tokio::test]
async fn s7_nonexhaustive_match_names_the_missing_tag() {
    let registry = HostModuleRegistry::new();
    let union_ty = Type::union([("a".into(), Type::Int), ("b".into(), Type::Bool)]).unwrap();

    let program = Program {
        decls: vec![
            Decl::Input { name: "u".into(), declared_type: union_ty, default: None, span: span() },
            Decl::Output {
                name: "out".into(),
                expr: Expr::Match {
                    scrutinee: Box::new(Expr::VarRef { name: "u".into(), span: span() }),
                    arms: vec![MatchArm {
                        pattern_tag: Some("a".into()),
                        bind_name: "x".into(),
                        body: Box::new(Expr::VarRef { name: "x".into(), span: span() }),
                        span: span(),
                    }],
                    span: span(),
                },
                span: span(),
            },
        ],
    };

    match compile(&program, &registry) {
        Err(PipelineError::Check(errors)) => {
            let missing = errors.iter().find_map(|e| match e {
                CompileError::NonExhaustiveMatch { missing, .. } => Some(missing.clone()),
                _ => None,
            });
            let missing = missing.expect("expected a NonExhaustiveMatch error");
            assert_eq!(missing, vec!["b".to_string()]);
        }
        other => panic!("expected a check-phase error, got {}", matches!(other, Err(PipelineError::Compile(_)))),
    }
}

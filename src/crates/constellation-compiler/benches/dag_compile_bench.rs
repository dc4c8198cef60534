use constellation_ast::{ModuleSignature, StaticModuleRegistry};
use constellation_compiler::compile;
use constellation_ir::{IrGraph, IrNode, IrProgram};
use constellation_types::Type;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// A straight-line chain of `N` module calls, each depending on the
/// previous one's output, plus a single declared output at the end.
/// Exercises the DAG compiler's module-node wiring and its acyclicity
/// check over a graph wide enough to be a meaningful benchmark, not a
/// correctness fixture.
fn chain_program(len: usize) -> (IrProgram, StaticModuleRegistry) {
    let mut registry = StaticModuleRegistry::new();
    registry.register(ModuleSignature {
        name: "Step".into(),
        namespace: "bench".into(),
        version: "1.0.0".into(),
        inputs: vec![("x".into(), Type::Int)],
        output: Type::Int,
    });

    let mut graph = IrGraph::new();
    let mut prev = graph.insert(IrNode::Literal { value: constellation_types::Value::Int(0), ty: Type::Int });
    for _ in 0..len {
        prev = graph.insert(IrNode::ModuleCall {
            module: "Step".into(),
            args: vec![("x".into(), prev)],
            ty: Type::Int,
            options: Default::default(),
        });
    }

    (IrProgram { graph, outputs: vec![("result".to_string(), prev)] }, registry)
}

fn compile_chain_benchmark(c: &mut Criterion) {
    let (program, registry) = chain_program(200);
    c.bench_function("compile 200-node module chain", |b| {
        b.iter(|| {
            let dag = compile(black_box(&program), &registry).unwrap();
            black_box(dag);
        });
    });
}

fn structural_hash_benchmark(c: &mut Criterion) {
    let (program, registry) = chain_program(200);
    let dag = compile(&program, &registry).unwrap();
    c.bench_function("structural hash of a 200-node dag", |b| {
        b.iter(|| black_box(constellation_compiler::structural_hash(black_box(&dag))));
    });
}

criterion_group!(benches, compile_chain_benchmark, structural_hash_benchmark);
criterion_main!(benches);

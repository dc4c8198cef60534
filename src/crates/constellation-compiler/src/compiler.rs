use std::collections::{BTreeSet, HashSet};

use constellation_ast::{ModuleSignatureRegistry, OptionsBag};
use constellation_ir::{IrId, IrNode, IrProgram};

use crate::dag::{CompiledMatchArm, Dag, DataNode, InEdge, ModuleId, ModuleNode, ModuleRef, OutEdge, SyntheticKind};
use crate::error::{CompilationError, Result};

/// Lowers optimized IR into an executable DAG (spec §4.4).
pub fn compile(program: &IrProgram, registry: &dyn ModuleSignatureRegistry) -> Result<Dag> {
    let mut dag = Dag::new();
    let mut next_module = 0u32;

    for (id, node) in &program.graph.nodes {
        compile_node(*id, node, &mut dag, &mut next_module, registry)?;
    }

    dag.outputs = program.outputs.clone();
    check_acyclic(&dag)?;
    Ok(dag)
}

fn fresh_module(next_module: &mut u32) -> ModuleId {
    let id = ModuleId(*next_module);
    *next_module += 1;
    id
}

fn wire_module(dag: &mut Dag, data: IrId, module: ModuleId, args: &[(String, IrId)]) {
    for (nickname, arg_id) in args {
        dag.in_edges.push(InEdge { data: *arg_id, module, nickname: nickname.clone() });
    }
    dag.out_edges.push(OutEdge { module, data });
}

fn compile_node(
    id: IrId,
    node: &IrNode,
    dag: &mut Dag,
    next_module: &mut u32,
    registry: &dyn ModuleSignatureRegistry,
) -> Result<()> {
    match node {
        IrNode::Input { name, ty, default } => {
            dag.data_nodes.insert(
                id,
                DataNode { name: Some(name.clone()), ty: ty.clone(), producer: None, default: *default },
            );
        }
        IrNode::Literal { value, ty } => {
            dag.data_nodes.insert(id, DataNode { name: None, ty: ty.clone(), producer: None, default: None });
            dag.literals.insert(id, value.clone());
        }
        IrNode::ModuleCall { module, args, ty, options } => {
            let signature = registry
                .lookup(module)
                .ok_or_else(|| CompilationError::UnknownModule { name: module.clone() })?;

            if args.len() != signature.inputs.len() {
                return Err(CompilationError::ArityMismatch {
                    module: module.clone(),
                    expected: signature.inputs.len(),
                    found: args.len(),
                });
            }
            for (arg_name, arg_id) in args {
                let declared = signature
                    .inputs
                    .iter()
                    .find(|(name, _)| name == arg_name)
                    .map(|(_, ty)| ty)
                    .ok_or_else(|| CompilationError::UnknownParameter {
                        module: module.clone(),
                        param: arg_name.clone(),
                    })?;
                // Arg ids always precede the module call in generation
                // order, so the data node already exists in the DAG.
                let found_ty = &dag.data_nodes.get(arg_id).expect("arg data node must already be compiled").ty;
                if !found_ty.is_subtype(declared) {
                    return Err(CompilationError::TypeMismatch {
                        module: module.clone(),
                        param: arg_name.clone(),
                        expected: declared.clone(),
                        found: found_ty.clone(),
                    });
                }
            }

            let module_id = fresh_module(next_module);
            dag.module_nodes.insert(module_id, ModuleNode { module: ModuleRef::Named(module.clone()), options: options.clone() });
            let wired: Vec<(String, IrId)> = args.iter().map(|(n, i)| (n.clone(), *i)).collect();
            wire_module(dag, id, module_id, &wired);
            dag.data_nodes.insert(id, DataNode { name: None, ty: ty.clone(), producer: Some(module_id), default: None });
        }
        IrNode::MergeTransform { a, b, ty } => {
            synthetic(dag, next_module, id, ty.clone(), SyntheticKind::Merge, &[("a", *a), ("b", *b)]);
        }
        IrNode::ProjectTransform { src, fields, ty } => {
            synthetic(dag, next_module, id, ty.clone(), SyntheticKind::Project { fields: fields.clone() }, &[("src", *src)]);
        }
        IrNode::FieldAccess { src, field, ty } => {
            synthetic(dag, next_module, id, ty.clone(), SyntheticKind::Field { field: field.clone() }, &[("src", *src)]);
        }
        IrNode::Conditional { cond, then_branch, else_branch, ty } => {
            synthetic(
                dag,
                next_module,
                id,
                ty.clone(),
                SyntheticKind::Cond,
                &[("cond", *cond), ("then", *then_branch), ("else", *else_branch)],
            );
        }
        IrNode::Guard { src, cond, ty } => {
            synthetic(dag, next_module, id, ty.clone(), SyntheticKind::Guard, &[("src", *src), ("cond", *cond)]);
        }
        IrNode::Coalesce { a, b, ty } => {
            synthetic(dag, next_module, id, ty.clone(), SyntheticKind::Coalesce, &[("a", *a), ("b", *b)]);
        }
        IrNode::And { a, b } => {
            synthetic(dag, next_module, id, constellation_types::Type::Bool, SyntheticKind::And, &[("a", *a), ("b", *b)]);
        }
        IrNode::Or { a, b } => {
            synthetic(dag, next_module, id, constellation_types::Type::Bool, SyntheticKind::Or, &[("a", *a), ("b", *b)]);
        }
        IrNode::Not { a } => {
            synthetic(dag, next_module, id, constellation_types::Type::Bool, SyntheticKind::Not, &[("a", *a)]);
        }
        IrNode::Binary { op, a, b, ty } => {
            synthetic(dag, next_module, id, ty.clone(), SyntheticKind::Binary(*op), &[("a", *a), ("b", *b)]);
        }
        IrNode::Concat { parts } => {
            let wired: Vec<(&str, IrId)> = parts.iter().map(|p| ("part", *p)).collect();
            // Every part shares the nickname "part"; order is recovered
            // from in_edges' insertion order, which follows `parts`.
            synthetic(dag, next_module, id, constellation_types::Type::String, SyntheticKind::Concat, &wired);
        }
        IrNode::HigherOrder { op, list, lambda, captured_inputs, ty } => {
            let module_id = fresh_module(next_module);
            dag.module_nodes.insert(
                module_id,
                ModuleNode {
                    module: ModuleRef::Synthetic(SyntheticKind::HigherOrder { op: *op, lambda: lambda.clone() }),
                    options: OptionsBag::default(),
                },
            );
            let mut args: Vec<(String, IrId)> = vec![("list".to_string(), *list)];
            args.extend(captured_inputs.iter().map(|(name, outer_id)| (name.clone(), *outer_id)));
            wire_module(dag, id, module_id, &args);
            dag.data_nodes.insert(id, DataNode { name: None, ty: ty.clone(), producer: Some(module_id), default: None });
        }
        IrNode::Match { scrutinee, arms, captured_inputs, ty } => {
            let module_id = fresh_module(next_module);
            let compiled_arms = arms
                .iter()
                .map(|arm| CompiledMatchArm {
                    pattern_tag: arm.pattern_tag.clone(),
                    bind_name: arm.bind_name.clone(),
                    body_nodes: arm.body_nodes.clone(),
                    output: arm.output,
                    captured_bindings: arm.captured_bindings.clone(),
                })
                .collect();
            dag.module_nodes.insert(
                module_id,
                ModuleNode {
                    module: ModuleRef::Synthetic(SyntheticKind::Match { arms: compiled_arms }),
                    options: OptionsBag::default(),
                },
            );
            let mut args: Vec<(String, IrId)> = vec![("scrutinee".to_string(), *scrutinee)];
            args.extend(captured_inputs.iter().map(|(name, outer_id)| (name.clone(), *outer_id)));
            wire_module(dag, id, module_id, &args);
            dag.data_nodes.insert(id, DataNode { name: None, ty: ty.clone(), producer: Some(module_id), default: None });
        }
    }
    Ok(())
}

fn synthetic(
    dag: &mut Dag,
    next_module: &mut u32,
    id: IrId,
    ty: constellation_types::Type,
    kind: SyntheticKind,
    args: &[(&str, IrId)],
) {
    let module_id = fresh_module(next_module);
    dag.module_nodes.insert(module_id, ModuleNode { module: ModuleRef::Synthetic(kind), options: OptionsBag::default() });
    let owned: Vec<(String, IrId)> = args.iter().map(|(n, i)| (n.to_string(), *i)).collect();
    wire_module(dag, id, module_id, &owned);
    dag.data_nodes.insert(id, DataNode { name: None, ty, producer: Some(module_id), default: None });
}

/// Defensive Kahn's-algorithm check. The generator can never actually
/// produce a cycle (every IR id only ever references an earlier one),
/// but a hand-built or deserialized `Dag` has no such guarantee, and the
/// invariant is cheap to check once at compile time.
fn check_acyclic(dag: &Dag) -> Result<()> {
    let mut visited: HashSet<IrId> = HashSet::new();
    let mut in_progress: HashSet<IrId> = HashSet::new();

    fn visit(
        dag: &Dag,
        id: IrId,
        visited: &mut HashSet<IrId>,
        in_progress: &mut HashSet<IrId>,
    ) -> Result<()> {
        if visited.contains(&id) {
            return Ok(());
        }
        if !in_progress.insert(id) {
            return Err(CompilationError::Cycle { from: id });
        }
        if let Some(node) = dag.data_nodes.get(&id) {
            if let Some(module) = node.producer {
                for dep in dag.module_dependencies(module) {
                    visit(dag, dep, visited, in_progress)?;
                }
            }
            if let Some(default) = node.default {
                visit(dag, default, visited, in_progress)?;
            }
        }
        in_progress.remove(&id);
        visited.insert(id);
        Ok(())
    }

    let ids: BTreeSet<IrId> = dag.data_nodes.keys().copied().collect();
    for id in ids {
        visit(dag, id, &mut visited, &mut in_progress)?;
    }
    Ok(())
}

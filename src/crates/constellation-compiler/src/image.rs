use chrono::{DateTime, Utc};
use constellation_types::canon::sha256_base64url;
use serde::{Deserialize, Serialize};

use crate::dag::{Dag, ModuleRef, SyntheticKind};

/// Canonical, order-independent rendering of a `Dag`'s shape: node
/// types, edges, and synthetic-module kinds, but never a data node's own
/// id — renaming an id must not move the hash (testable property 9).
/// Ids only ever appear relative to each other, via the edge list's
/// structure, not their numeric value.
fn canonical_dag(dag: &Dag) -> String {
    let mut out = String::new();
    out.push_str("D{");
    for (id, node) in &dag.data_nodes {
        out.push_str(&format!("{}:{}", id, constellation_types::canon::canonical_type(&node.ty)));
        if let Some(literal) = dag.literals.get(id) {
            out.push('=');
            out.push_str(&constellation_types::canon::canonical_value(literal));
        }
        out.push(';');
    }
    out.push_str("}M{");
    for (id, node) in &dag.module_nodes {
        out.push_str(&format!("{}:{};", id, canonical_module_ref(&node.module)));
    }
    out.push_str("}I{");
    for edge in &dag.in_edges {
        out.push_str(&format!("{}->{}[{}];", edge.data, edge.module, edge.nickname));
    }
    out.push_str("}O{");
    for edge in &dag.out_edges {
        out.push_str(&format!("{}->{};", edge.module, edge.data));
    }
    out.push_str("}R{");
    for (name, id) in &dag.outputs {
        out.push_str(&format!("{}={};", name, id));
    }
    out.push('}');
    out
}

fn canonical_module_ref(module: &ModuleRef) -> String {
    match module {
        ModuleRef::Named(name) => format!("named({name})"),
        ModuleRef::Synthetic(kind) => format!("synthetic({})", canonical_synthetic_kind(kind)),
    }
}

fn canonical_synthetic_kind(kind: &SyntheticKind) -> String {
    match kind {
        SyntheticKind::Merge => "merge".to_string(),
        SyntheticKind::Project { fields } => format!("project({})", fields.join(",")),
        SyntheticKind::Field { field } => format!("field({field})"),
        SyntheticKind::Cond => "cond".to_string(),
        SyntheticKind::Guard => "guard".to_string(),
        SyntheticKind::Coalesce => "coalesce".to_string(),
        SyntheticKind::And => "and".to_string(),
        SyntheticKind::Or => "or".to_string(),
        SyntheticKind::Not => "not".to_string(),
        SyntheticKind::Binary(op) => format!("binary({op:?})"),
        SyntheticKind::Concat => "concat".to_string(),
        SyntheticKind::HigherOrder { op, .. } => format!("higher_order({op:?})"),
        SyntheticKind::Match { arms } => {
            format!("match({})", arms.iter().map(|a| a.pattern_tag.clone().unwrap_or_else(|| "_".into())).collect::<Vec<_>>().join(","))
        }
    }
}

/// The DAG's structural hash: stable across identifier renames, changes
/// only when the graph's shape changes (spec §3, "Content hashing &
/// images").
pub fn structural_hash(dag: &Dag) -> String {
    sha256_base64url(canonical_dag(dag).as_bytes())
}

/// A serializable compiled program, rehydratable without re-running the
/// type checker or IR generator (spec §3, "Pipeline image").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineImage {
    pub structural_hash: String,
    /// Present only when the host also tracks a hash of the raw source
    /// text, to distinguish a cosmetic edit from a semantic one.
    pub syntactic_hash: Option<String>,
    pub dag: Dag,
    pub compiled_at: DateTime<Utc>,
}

impl PipelineImage {
    pub fn new(dag: Dag, syntactic_hash: Option<String>, compiled_at: DateTime<Utc>) -> Self {
        PipelineImage { structural_hash: structural_hash(&dag), syntactic_hash, dag, compiled_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use constellation_ast::{ModuleSignatureRegistry, StaticModuleRegistry};
    use constellation_ir::{IrGraph, IrNode, IrProgram};
    use constellation_types::{Type, Value};

    fn build(registry: &dyn ModuleSignatureRegistry) -> Dag {
        let mut graph = IrGraph::new();
        let a = graph.insert(IrNode::Literal { value: Value::Int(1), ty: Type::Int });
        let b = graph.insert(IrNode::Literal { value: Value::Int(2), ty: Type::Int });
        let sum = graph.insert(IrNode::Binary { op: constellation_ast::BinOp::Add, a, b, ty: Type::Int });
        let program = IrProgram { graph, outputs: vec![("out".into(), sum)] };
        compile(&program, registry).unwrap()
    }

    #[test]
    fn structural_hash_is_stable_across_identical_rebuilds() {
        let registry = StaticModuleRegistry::new();
        let dag_a = build(&registry);
        let dag_b = build(&registry);
        assert_eq!(structural_hash(&dag_a), structural_hash(&dag_b));
    }

    #[test]
    fn structural_hash_changes_with_shape() {
        let registry = StaticModuleRegistry::new();
        let dag_a = build(&registry);
        let mut graph = IrGraph::new();
        let lit = graph.insert(IrNode::Literal { value: Value::Int(3), ty: Type::Int });
        let program = IrProgram { graph, outputs: vec![("out".into(), lit)] };
        let dag_b = compile(&program, &registry).unwrap();
        assert_ne!(structural_hash(&dag_a), structural_hash(&dag_b));
    }
}

use std::collections::BTreeMap;

use constellation_ast::{BinOp, HigherOrderOp, OptionsBag};
use constellation_ir::{IrId, IrLambda};
use constellation_types::{Type, Value};
use serde::{Deserialize, Serialize};

/// Data node ids are the IR node ids they were compiled from — every IR
/// node becomes exactly one data node, so there's no reason to mint a
/// second id space for the same thing.
pub type DataId = IrId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mod{}", self.0)
    }
}

/// A compiled `match` arm, the DAG-level counterpart of
/// `constellation_ir::MatchArmIr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledMatchArm {
    pub pattern_tag: Option<String>,
    pub bind_name: String,
    pub body_nodes: constellation_ir::IrGraph,
    pub output: IrId,
    pub captured_bindings: Vec<(String, IrId)>,
}

/// What a synthetic module node actually does — fixed by the runtime,
/// never by a host (spec §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyntheticKind {
    Merge,
    Project { fields: Vec<String> },
    Field { field: String },
    Cond,
    Guard,
    Coalesce,
    And,
    Or,
    Not,
    /// Not named in the synthetic-module table verbatim, but required to
    /// give the runtime somewhere to execute a lowered `Binary` IR node —
    /// every other inline transform has a synthetic module, arithmetic
    /// shouldn't be the one exception.
    Binary(BinOp),
    /// Same rationale as `Binary`: string interpolation's own
    /// desugaring (spec §4.2) produces a `Concat` IR node that needs a
    /// runtime home.
    Concat,
    HigherOrder { op: HigherOrderOp, lambda: IrLambda },
    Match { arms: Vec<CompiledMatchArm> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModuleRef {
    /// A host-registered module, looked up by name at runtime.
    Named(String),
    Synthetic(SyntheticKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleNode {
    pub module: ModuleRef,
    /// Always empty for synthetic modules (spec §4.4: "inline transforms
    /// never carry options").
    pub options: OptionsBag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNode {
    pub name: Option<String>,
    pub ty: Type,
    pub producer: Option<ModuleId>,
    /// Set only for `Input` nodes that declared a default expression —
    /// the id of the data node holding the default's value.
    pub default: Option<DataId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InEdge {
    pub data: DataId,
    pub module: ModuleId,
    /// The argument name this data node is known as to this particular
    /// consuming module (spec's "per-module nicknames").
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutEdge {
    pub module: ModuleId,
    pub data: DataId,
}

/// The compiled executable graph: two node tables plus the edges between
/// them (spec §3, "DAG").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dag {
    pub data_nodes: BTreeMap<DataId, DataNode>,
    pub module_nodes: BTreeMap<ModuleId, ModuleNode>,
    pub literals: BTreeMap<DataId, Value>,
    pub in_edges: Vec<InEdge>,
    pub out_edges: Vec<OutEdge>,
    pub outputs: Vec<(String, DataId)>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_edges_for(&self, module: ModuleId) -> impl Iterator<Item = &InEdge> {
        self.in_edges.iter().filter(move |e| e.module == module)
    }

    pub fn out_edge_for(&self, module: ModuleId) -> Option<&OutEdge> {
        self.out_edges.iter().find(|e| e.module == module)
    }

    /// Every data node a module directly depends on, as the topological
    /// check and the runtime's dependency walk need it.
    pub fn module_dependencies(&self, module: ModuleId) -> Vec<DataId> {
        self.in_edges_for(module).map(|e| e.data).collect()
    }
}

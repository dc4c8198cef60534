use std::collections::BTreeMap;

use constellation_ast::{BinOp, HigherOrderOp, OptionsBag};
use constellation_types::{Type, Value};
use serde::{Deserialize, Serialize};

/// A stable, deterministic-per-source identifier for an IR node. Ids are
/// assigned in generation order starting at zero, so recompiling
/// identical source text always produces identical ids — this is what
/// lets the DAG compiler's structural hash be stable across renames of
/// unrelated identifiers (only the graph shape, not these ids, feeds the
/// hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IrId(pub u32);

impl std::fmt::Display for IrId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ir{}", self.0)
    }
}

/// A single `match` arm, encoded the same way a `HigherOrder`'s lambda
/// is: the bound payload is a synthetic `Input` inside the arm's own
/// sub-graph rather than a node in the outer graph, since the outer
/// graph has no expression that actually produces "the union's payload,
/// assuming the tag matches" — only the runtime's `$match` evaluator
/// knows that at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArmIr {
    pub pattern_tag: Option<String>,
    pub bind_name: String,
    pub body_nodes: IrGraph,
    pub output: IrId,
    /// outer-name → inner `Input` node id, for any free variable other
    /// than `bind_name` that the arm body references.
    pub captured_bindings: Vec<(String, IrId)>,
}

/// A lambda's self-contained inner IR graph. Every captured outer value
/// is represented as a regular `Input` node inside `body_nodes` — the
/// sub-graph never reaches outside itself for a value, only for its id
/// space (the compiler wires the captured-inputs' *outer* data ids as
/// extra in-edges on the enclosing `HigherOrder` module node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrLambda {
    pub param_name: String,
    pub param_type: Type,
    pub body_nodes: IrGraph,
    pub output: IrId,
    /// outer-name → inner `Input` node id.
    pub captured_bindings: Vec<(String, IrId)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrNode {
    Input {
        name: String,
        ty: Type,
        default: Option<IrId>,
    },
    Literal {
        value: Value,
        ty: Type,
    },
    ModuleCall {
        module: String,
        args: Vec<(String, IrId)>,
        ty: Type,
        options: OptionsBag,
    },
    MergeTransform {
        a: IrId,
        b: IrId,
        ty: Type,
    },
    ProjectTransform {
        src: IrId,
        fields: Vec<String>,
        ty: Type,
    },
    FieldAccess {
        src: IrId,
        field: String,
        ty: Type,
    },
    Conditional {
        cond: IrId,
        then_branch: IrId,
        else_branch: IrId,
        ty: Type,
    },
    Guard {
        src: IrId,
        cond: IrId,
        ty: Type,
    },
    Coalesce {
        a: IrId,
        b: IrId,
        ty: Type,
    },
    And {
        a: IrId,
        b: IrId,
    },
    Or {
        a: IrId,
        b: IrId,
    },
    Not {
        a: IrId,
    },
    Binary {
        op: BinOp,
        a: IrId,
        b: IrId,
        ty: Type,
    },
    /// Sequence of primitive-typed parts concatenated into a `String`.
    /// The generator's desugaring of string interpolation (spec §4.2)
    /// into "a sequence of literal + field-access + concat operations"
    /// bottoms out here.
    Concat {
        parts: Vec<IrId>,
    },
    HigherOrder {
        op: HigherOrderOp,
        list: IrId,
        lambda: IrLambda,
        /// outer-name → outer IR id, so the DAG compiler can wire the
        /// captured values as additional in-edges on the synthetic
        /// module node.
        captured_inputs: Vec<(String, IrId)>,
        ty: Type,
    },
    Match {
        scrutinee: IrId,
        arms: Vec<MatchArmIr>,
        /// Union, across all arms, of each arm's own captured outer
        /// variables — the DAG compiler wires these as extra in-edges
        /// on the synthetic `$match` module node, same as
        /// `HigherOrder::captured_inputs`.
        captured_inputs: Vec<(String, IrId)>,
        ty: Type,
    },
}

impl IrNode {
    /// The declared output type of this node, used by the DAG compiler to
    /// validate edges and by the optimizer's constant folder.
    pub fn output_type(&self) -> &Type {
        match self {
            IrNode::Input { ty, .. }
            | IrNode::Literal { ty, .. }
            | IrNode::ModuleCall { ty, .. }
            | IrNode::MergeTransform { ty, .. }
            | IrNode::ProjectTransform { ty, .. }
            | IrNode::FieldAccess { ty, .. }
            | IrNode::Conditional { ty, .. }
            | IrNode::Guard { ty, .. }
            | IrNode::Coalesce { ty, .. }
            | IrNode::Binary { ty, .. }
            | IrNode::HigherOrder { ty, .. }
            | IrNode::Match { ty, .. } => ty,
            IrNode::And { .. } | IrNode::Or { .. } | IrNode::Not { .. } => &Type::Bool,
            IrNode::Concat { .. } => &Type::String,
        }
    }

    /// Every other IR node this node directly reads from, used by
    /// dead-code elimination's reachability walk. Does not descend into a
    /// lambda's `body_nodes` (that sub-graph is reachable transitively
    /// through the `HigherOrder`/`captured_inputs` entries it returns).
    pub fn direct_dependencies(&self) -> Vec<IrId> {
        match self {
            IrNode::Input { default, .. } => default.iter().copied().collect(),
            IrNode::Literal { .. } => vec![],
            IrNode::ModuleCall { args, .. } => args.iter().map(|(_, id)| *id).collect(),
            IrNode::MergeTransform { a, b, .. } => vec![*a, *b],
            IrNode::ProjectTransform { src, .. } => vec![*src],
            IrNode::FieldAccess { src, .. } => vec![*src],
            IrNode::Conditional { cond, then_branch, else_branch, .. } => {
                vec![*cond, *then_branch, *else_branch]
            }
            IrNode::Guard { src, cond, .. } => vec![*src, *cond],
            IrNode::Coalesce { a, b, .. } => vec![*a, *b],
            IrNode::And { a, b } | IrNode::Or { a, b } => vec![*a, *b],
            IrNode::Not { a } => vec![*a],
            IrNode::Binary { a, b, .. } => vec![*a, *b],
            IrNode::Concat { parts } => parts.clone(),
            IrNode::HigherOrder { list, captured_inputs, .. } => {
                let mut deps = vec![*list];
                deps.extend(captured_inputs.iter().map(|(_, id)| *id));
                deps
            }
            IrNode::Match { scrutinee, captured_inputs, .. } => {
                let mut deps = vec![*scrutinee];
                deps.extend(captured_inputs.iter().map(|(_, id)| *id));
                deps
            }
        }
    }
}

/// A graph of IR nodes. Both the top-level program and every lambda's
/// inner body are represented the same way, so traversal code (DCE,
/// constant folding, the DAG compiler's lambda mini-interpreter wiring)
/// is uniform over both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrGraph {
    pub nodes: BTreeMap<IrId, IrNode>,
    next_id: u32,
}

impl IrGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: IrNode) -> IrId {
        let id = IrId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    pub fn get(&self, id: IrId) -> Option<&IrNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Used by the optimizer after pruning nodes out of the map, so a
    /// later `insert` on the pruned graph still can't collide with an id
    /// that survived the prune.
    pub fn set_next_id(&mut self, next_id: u32) {
        self.next_id = next_id;
    }
}

use constellation_ast::{BinOp, HigherOrderOp, OptionsBag, Span};
use constellation_types::{Type, Value};

/// A fully type-annotated expression: every node carries the type the
/// checker assigned it, alongside its original span for diagnostics
/// downstream (e.g. the IR generator reporting a generation-time bug).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    VarRef(String),
    Literal(Value),
    FieldAccess {
        base: Box<TypedExpr>,
        field: String,
    },
    Project {
        base: Box<TypedExpr>,
        fields: Vec<String>,
    },
    Merge {
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    When {
        base: Box<TypedExpr>,
        cond: Box<TypedExpr>,
    },
    Coalesce {
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Conditional {
        cond: Box<TypedExpr>,
        then_branch: Box<TypedExpr>,
        else_branch: Box<TypedExpr>,
    },
    /// `branch { c1 -> v1; ...; else -> d }`, pre-desugaring. The IR
    /// generator rewrites this into a right-nested `Conditional`.
    Branch {
        arms: Vec<(TypedExpr, TypedExpr)>,
        default: Box<TypedExpr>,
    },
    ModuleCall {
        module: String,
        args: Vec<(String, TypedExpr)>,
        options: OptionsBag,
    },
    Lambda {
        params: Vec<(String, Type)>,
        body: Box<TypedExpr>,
    },
    HigherOrder {
        op: HigherOrderOp,
        list: Box<TypedExpr>,
        lambda: Box<TypedExpr>,
    },
    Match {
        scrutinee: Box<TypedExpr>,
        arms: Vec<TypedMatchArm>,
    },
    Binary {
        op: BinOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Not(Box<TypedExpr>),
    And(Box<TypedExpr>, Box<TypedExpr>),
    Or(Box<TypedExpr>, Box<TypedExpr>),
    Interpolation(Vec<TypedExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedMatchArm {
    pub pattern_tag: Option<String>,
    pub bind_name: String,
    pub body: Box<TypedExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedInput {
    pub name: String,
    pub declared_type: Type,
    pub default: Option<TypedExpr>,
    pub span: Span,
}

/// The output of [`crate::check_program`]: every declaration's
/// expressions fully typed, ready for the IR generator.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedProgram {
    pub inputs: Vec<TypedInput>,
    pub lets: Vec<(String, TypedExpr)>,
    pub outputs: Vec<(String, TypedExpr)>,
}

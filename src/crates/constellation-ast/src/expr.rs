use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// A literal value as written in source, before type-checking assigns it
/// a `constellation_types::Type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Literal>),
    Product(Vec<(String, Literal)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HigherOrderOp {
    Filter,
    Map,
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    /// Union tag this arm matches, or `None` for a wildcard arm.
    pub pattern_tag: Option<String>,
    /// Name the matched payload is bound to inside `body`.
    pub bind_name: String,
    pub body: Box<Expr>,
    pub span: Span,
}

/// A single recognized option key/value on a module call (spec §3,
/// "Options (per module call)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    Int(i64),
    Bool(bool),
    Duration(Duration),
    Ident(String),
    Literal(Literal),
    Throttle { rate: u64, window: Duration },
}

/// The raw, unvalidated options bag attached to a module call. The
/// checker is responsible for recognizing keys and rejecting the rest
/// (`CompileError::UnknownOption`) — this type makes no judgment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsBag {
    pub entries: Vec<(String, OptionValue, Span)>,
}

impl OptionsBag {
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _, _)| k == key).map(|(_, v, _)| v)
    }
}

/// A lambda expression: parameter names plus a body. Free-variable
/// analysis over `body` (performed by the IR generator, not here) decides
/// which outer names are captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    VarRef {
        name: String,
        span: Span,
    },
    Literal {
        value: Literal,
        span: Span,
    },
    FieldAccess {
        base: Box<Expr>,
        field: String,
        span: Span,
    },
    Project {
        base: Box<Expr>,
        fields: Vec<String>,
        span: Span,
    },
    Merge {
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// `x when cond` — desugars to `Guard` in the IR.
    When {
        base: Box<Expr>,
        cond: Box<Expr>,
        span: Span,
    },
    /// `a ?? b` — desugars to `Coalesce` in the IR.
    Coalesce {
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Conditional {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },
    /// `branch { c1 -> v1; ...; else -> d }` — desugars to right-nested
    /// `Conditional` in the IR.
    Branch {
        arms: Vec<(Expr, Expr)>,
        default: Box<Expr>,
        span: Span,
    },
    ModuleCall {
        module: String,
        args: Vec<(String, Expr)>,
        options: OptionsBag,
        span: Span,
    },
    Lambda(Lambda),
    HigherOrder {
        op: HigherOrderOp,
        list: Box<Expr>,
        lambda: Lambda,
        span: Span,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Not {
        inner: Box<Expr>,
        span: Span,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// String interpolation: an ordered sequence of literal and
    /// field-access/expr parts concatenated at runtime.
    Interpolation {
        parts: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::VarRef { span, .. }
            | Expr::Literal { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::Project { span, .. }
            | Expr::Merge { span, .. }
            | Expr::When { span, .. }
            | Expr::Coalesce { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Branch { span, .. }
            | Expr::ModuleCall { span, .. }
            | Expr::HigherOrder { span, .. }
            | Expr::Match { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Not { span, .. }
            | Expr::And { span, .. }
            | Expr::Or { span, .. }
            | Expr::Interpolation { span, .. } => span,
            Expr::Lambda(lambda) => &lambda.span,
        }
    }
}

/// A top-level declaration in a pipeline source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    Input {
        name: String,
        declared_type: constellation_types::Type,
        default: Option<Expr>,
        span: Span,
    },
    Let {
        name: String,
        expr: Expr,
        span: Span,
    },
    Output {
        name: String,
        expr: Expr,
        span: Span,
    },
}

/// A whole pipeline source, as the parser must deliver it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub decls: Vec<Decl>,
}

//! AST input contract: the shape the parser must deliver to the type
//! checker, plus the module-registration data the host provides.
//!
//! This crate has no checking or execution logic of its own — it is pure
//! data, mirroring how the teacher workspace keeps its graph node/edge
//! shapes separate from the engine that walks them.

mod expr;
mod module;
mod span;

pub use expr::{
    BinOp, Decl, Expr, HigherOrderOp, Lambda, Literal, MatchArm, OptionValue, OptionsBag, Program,
};
pub use module::{InputSignature, ModuleSignature, ModuleSignatureRegistry, StaticModuleRegistry};
pub use span::Span;

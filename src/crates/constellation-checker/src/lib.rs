//! Bidirectional type checker: AST → typed AST.
//!
//! `check(e, T, env)` succeeds if `e` can be given a type that is a
//! subtype of `T`; `synth(e, env)` infers a type outright. The checker
//! never stops at the first error: [`check_program`] accumulates every
//! compile error found across the whole program before returning, so a
//! host can report them all in one pass.

mod checker;
mod error;
mod options;
mod typed;

pub use checker::check_program;
pub use error::{CompileError, CompileErrors};
pub use options::validate_options;
pub use typed::{
    TypedExpr, TypedExprKind, TypedInput, TypedMatchArm, TypedProgram,
};

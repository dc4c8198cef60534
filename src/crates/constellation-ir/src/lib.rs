//! Typed AST → IR lowering, plus the optimizer that runs over the
//! lowered graph before the DAG compiler sees it.
//!
//! [`generate_program`] performs the desugaring spec §4.2 describes
//! (`branch`/`when`/`??`/string interpolation all bottom out as plain IR
//! nodes) and closure capture analysis for higher-order lambdas.
//! [`optimize`] then runs constant folding followed by dead code
//! elimination (spec §4.3).

mod generator;
mod node;
mod optimizer;

pub use generator::{generate_program, IrProgram};
pub use node::{IrGraph, IrId, IrLambda, IrNode, MatchArmIr};
pub use optimizer::optimize;

/// Convenience pipeline: lower a typed program straight to its
/// optimized IR.
pub fn lower(program: &constellation_checker::TypedProgram) -> IrProgram {
    optimize(generate_program(program))
}

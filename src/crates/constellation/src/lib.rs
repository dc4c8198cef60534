//! Constellation: a pipeline-orchestration DAG compiler and execution
//! runtime (spec §1). This crate is the thin facade wiring the
//! standalone compiler-front-end and runtime crates together into the
//! `source's typed AST -> DAG -> run` pipeline a host actually drives.
//!
//! ```rust,ignore
//! use constellation::{compile, ast::Program};
//! use constellation_runtime::Runtime;
//!
//! let program: Program = /* from an external parser */;
//! let dag = compile(&program, &module_registry)?;
//! let runtime = Runtime::new(host_modules, cache_registry);
//! let outcome = runtime.run(dag, inputs).await;
//! ```
//!
//! Parsing source text into a `Program` is out of scope here (spec §1,
//! "the text parser producing the AST" is an external collaborator);
//! `compile` starts from an already-parsed `Program`.

pub use constellation_ast as ast;
pub use constellation_cache as cache;
pub use constellation_checker as checker;
pub use constellation_compiler as compiler;
pub use constellation_ir as ir;
pub use constellation_resilience as resilience;
pub use constellation_runtime as runtime;
pub use constellation_scheduler as scheduler;
pub use constellation_types as types;

use constellation_ast::{ModuleSignatureRegistry, Program};
use constellation_checker::CompileError;
use constellation_compiler::{CompilationError, Dag};

/// Everything that can go wrong turning a parsed `Program` into a `Dag`
/// (spec §7: "a failed compilation returns the full error list").
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{} compile error(s): {0:?}", .0.len())]
    Check(Vec<CompileError>),

    #[error(transparent)]
    Compile(#[from] CompilationError),
}

/// Runs the whole front end: type-check, lower to IR, optimize, compile
/// to a DAG (spec §2's data flow, "type checker -> typed AST -> IR
/// generator -> IR -> optimizer -> DAG compiler -> DAG + options").
pub fn compile(program: &Program, modules: &dyn ModuleSignatureRegistry) -> Result<Dag, PipelineError> {
    let typed = constellation_checker::check_program(program, modules).map_err(PipelineError::Check)?;
    let ir_program = constellation_ir::lower(&typed);
    let dag = constellation_compiler::compile(&ir_program, modules)?;
    Ok(dag)
}

use constellation_ir::IrId;
use constellation_types::Type;
use thiserror::Error;

/// Failures the DAG compiler can raise while lowering IR into a DAG
/// (spec §4.4: "Fails with `CompilationError { cycle | unknown-module |
/// arity-mismatch | type-mismatch }`").
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompilationError {
    #[error("dependency graph contains a cycle reachable from {from}")]
    Cycle { from: IrId },

    #[error("module {name:?} is not registered")]
    UnknownModule { name: String },

    #[error("module {module:?} expects {expected} argument(s), got {found}")]
    ArityMismatch { module: String, expected: usize, found: usize },

    #[error("module {module:?} parameter {param:?} expects {expected}, got {found}")]
    TypeMismatch {
        module: String,
        param: String,
        expected: Type,
        found: Type,
    },

    #[error("module {module:?} has no declared parameter named {param:?}")]
    UnknownParameter { module: String, param: String },
}

pub type Result<T> = std::result::Result<T, CompilationError>;

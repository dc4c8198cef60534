//! IR → DAG compiler, plus the content-hashed pipeline image that lets a
//! compiled program be persisted and rehydrated without re-running the
//! checker or IR generator.

mod compiler;
mod dag;
mod error;
mod image;

pub use compiler::compile;
pub use dag::{
    CompiledMatchArm, Dag, DataId, DataNode, InEdge, ModuleId, ModuleNode, ModuleRef, OutEdge,
    SyntheticKind,
};
pub use error::{CompilationError, Result};
pub use image::{structural_hash, PipelineImage};

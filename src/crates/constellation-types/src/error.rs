use thiserror::Error;

/// Errors raised while constructing or comparing types and values.
///
/// These are distinct from the checker's `CompileError`: they fire during
/// type *construction* (building a `Type` value) rather than during
/// type-checking of a program against an AST.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("map key type must be a primitive (String, Int, Float, Bool), got {0:?}")]
    NonPrimitiveMapKey(crate::ty::Type),

    #[error("union must have at least one tag")]
    EmptyUnion,

    #[error("duplicate union tag {0:?}")]
    DuplicateUnionTag(String),

    #[error("duplicate product field {0:?}")]
    DuplicateProductField(String),
}

pub type Result<T> = std::result::Result<T, TypeError>;

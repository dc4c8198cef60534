use constellation_ast::Span;
use constellation_types::Type;
use thiserror::Error;

/// The compile-error taxonomy (spec §7). Every variant carries a source
/// span so a host can report it against the original text. The checker
/// never stops at the first error — see [`crate::check_program`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("{span}: field {field:?} not found (available: {available:?})")]
    FieldNotFound {
        field: String,
        available: Vec<String>,
        span: Span,
    },

    #[error("{span}: type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: Type,
        actual: Type,
        span: Span,
    },

    #[error("{span}: invalid projection: field {field:?} not found in source record")]
    InvalidProjection { field: String, span: Span },

    #[error("{span}: undefined variable {name:?}")]
    UndefinedVariable { name: String, span: Span },

    #[error("{span}: undefined module {name:?}")]
    UndefinedModule { name: String, span: Span },

    #[error("{span}: module {module:?} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        module: String,
        expected: usize,
        actual: usize,
        span: Span,
    },

    #[error("{span}: match is not exhaustive; missing arm(s) for {missing:?}")]
    NonExhaustiveMatch { missing: Vec<String>, span: Span },

    #[error("{span}: invalid value for option {key:?}")]
    InvalidOptionValue { key: String, span: Span },

    #[error("{span}: unknown option {key:?}")]
    UnknownOption { key: String, span: Span },

    #[error("{span}: map key type must be primitive, got {key_type}")]
    NonPrimitiveMapKey { key_type: Type, span: Span },

    #[error("{span}: coalesce requires an Optional<T> on the left, got {actual}")]
    CoalesceOnNonOptional { actual: Type, span: Span },

    #[error("{span}: duplicate input declaration {name:?}")]
    DuplicateDeclaration { name: String, span: Span },

    #[error("{span}: match arm references unknown tag {tag:?}")]
    UnknownMatchTag { tag: String, span: Span },

    #[error("{span}: lambda may only appear as a higher-order operation's argument")]
    StandaloneLambda { span: Span },
}

pub type CompileErrors = Vec<CompileError>;

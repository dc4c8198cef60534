//! Structural type and value model for Constellation pipelines.
//!
//! This crate has no notion of a pipeline, a DAG, or a module — it is the
//! leaf of the workspace. It defines:
//!
//! - [`Type`]: the structural type algebra (`String`, `Int`, `Float`,
//!   `Bool`, `List`, `Map`, `Product`, `Union`, `Optional`), its subtyping
//!   relation, and its least-upper-bound operation.
//! - [`Value`]: a tagged runtime value for every `Type` variant.
//! - [`canon`]: canonical (order-independent) serialization used for cache
//!   key derivation and structural hashing elsewhere in the workspace.
//!
//! # Quick start
//!
//! ```
//! use constellation_types::{Type, Value};
//!
//! let order_type = Type::product([
//!     ("id".to_string(), Type::String),
//!     ("total".to_string(), Type::Float),
//! ]).unwrap();
//!
//! let customer_type = Type::product([
//!     ("id".to_string(), Type::String),
//!     ("total".to_string(), Type::Float),
//!     ("tier".to_string(), Type::String),
//! ]).unwrap();
//!
//! // A superset of fields is a subtype of the smaller record.
//! assert!(customer_type.is_subtype(&order_type));
//! ```

mod canon;
mod error;
mod ty;
mod value;

pub use canon::{cache_key, canonical_type, canonical_value, sha256_base64url};
pub use error::{Result, TypeError};
pub use ty::Type;
pub use value::Value;

//! Error taxonomy for cache operations (spec §7, "Cache errors").

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Encode/decode of a cached value failed. Treated as a miss by callers,
    /// never surfaced as a hard failure.
    #[error("cache serde failure: {0}")]
    SerdeFailure(String),

    /// The backend itself (network, lock, etc.) could not service the
    /// request. Surfaced as a failure on `set`, treated as a miss on `get`.
    #[error("cache backend unavailable: {0}")]
    BackendUnavailable(String),

    /// `delete`/`get` found no entry for the key.
    #[error("cache entry not found")]
    NotFound,
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerdeFailure(err.to_string())
    }
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::SerdeFailure(err.to_string())
    }
}

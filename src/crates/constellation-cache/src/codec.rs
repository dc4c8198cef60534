//! Pluggable value encoding for cache entries, mirroring the teacher
//! crate's `SerializerProtocol` (`JsonSerializer`/`BincodeSerializer`).

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Protocol for turning a typed value into bytes and back. `CacheBackend`
/// stores raw bytes so it can stay object-safe; a `CacheCodec` is the layer
/// above that knows how to get there.
pub trait CacheCodec: Send + Sync {
    fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>>;
    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V>;
}

/// Default codec, used by the in-memory backend and by `CacheBackendExt`'s
/// generic convenience methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl CacheCodec for JsonCodec {
    fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Smaller wire size, used by backends that pay for bytes over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl CacheCodec for BincodeCodec {
    fn encode<V: Serialize>(&self, value: &V) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn json_round_trips() {
        let codec = JsonCodec;
        let p = Point { x: 1, y: 2 };
        let bytes = codec.encode(&p).unwrap();
        let back: Point = codec.decode(&bytes).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn bincode_round_trips() {
        let codec = BincodeCodec;
        let p = Point { x: 1, y: 2 };
        let bytes = codec.encode(&p).unwrap();
        let back: Point = codec.decode(&bytes).unwrap();
        assert_eq!(p, back);
    }
}

//! Serialization protocol for checkpoints and channel values
//!
//! Two layers live here. [`SerializerProtocol`] is the generic byte codec used
//! for whole checkpoints, with JSON and bincode implementations. On top of it,
//! [`TypedSerializer`] is the type-tagged boundary that channel values cross
//! when staged as pending writes: every payload is stored next to a tag naming
//! the codec that produced it, so a reader can refuse payloads it does not
//! understand instead of guessing.
//!
//! # Lossy boundary
//!
//! Values from richer in-memory model types (agent turns, device states,
//! anything `Serialize`) degrade to their plain structural projection when
//! they cross this boundary: deserializing returns the structural form
//! (`serde_json::Value`), not the original typed object. This is an explicit,
//! documented property, not a bug. The round-trip law
//! `loads_typed(dumps_typed(v)) == v` holds for structural values only.
//!
//! Unknown tags and unserializable values fail fast with an explicit error;
//! nothing is silently coerced or dropped.

use crate::error::{CheckpointError, Result};
use serde::{Deserialize, Serialize};

/// Type tag for JSON-encoded structural payloads
pub const TYPE_TAG_JSON: &str = "json";

/// Protocol for serializing and deserializing checkpoint data
///
/// Implementations can provide custom serialization strategies
/// (JSON, bincode, etc.)
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;

    /// Serialize to JSON value (for compatibility)
    fn dumps_json<T: Serialize>(&self, value: &T) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(value)?)
    }

    /// Deserialize from JSON value (for compatibility)
    fn loads_json<T: for<'de> Deserialize<'de>>(&self, value: &serde_json::Value) -> Result<T> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// JSON-based serializer (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Binary serializer using bincode
///
/// Only suitable for concrete types whose `Deserialize` impl does not rely on
/// a self-describing format; dynamic values go through [`TypedSerializer`].
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for BincodeSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Type-tagged codec for opaque channel values
///
/// Pending writes persist each value as a `(type_tag, payload)` pair. The tag
/// travels with the payload into storage (the `value_type` column) so that
/// decoding is explicit: a payload tagged with an unknown codec is an error at
/// the call site, never a best-effort guess.
#[derive(Debug, Clone, Default)]
pub struct TypedSerializer;

impl TypedSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Serialize a value to a `(type_tag, payload)` pair
    ///
    /// Any `Serialize` value is accepted; non-structural types degrade to
    /// their structural projection (see module docs). Values serde cannot
    /// represent (e.g. maps with non-string keys) fail fast with a
    /// `Serialization` error.
    pub fn dumps_typed<T: Serialize>(&self, value: &T) -> Result<(String, Vec<u8>)> {
        let payload = serde_json::to_vec(value)?;
        Ok((TYPE_TAG_JSON.to_string(), payload))
    }

    /// Deserialize a `(type_tag, payload)` pair back into a structural value
    ///
    /// Returns an error for tags this codec does not understand.
    pub fn loads_typed(&self, type_tag: &str, payload: &[u8]) -> Result<serde_json::Value> {
        match type_tag {
            TYPE_TAG_JSON => Ok(serde_json::from_slice(payload)?),
            _ => Err(CheckpointError::Invalid(format!(
                "unknown value type tag: {}",
                type_tag
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_json_serializer() {
        let serializer = JsonSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let bytes = serializer.dumps(&data).unwrap();
        let restored: TestData = serializer.loads(&bytes).unwrap();

        assert_eq!(data, restored);
    }

    #[test]
    fn test_bincode_serializer() {
        let serializer = BincodeSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let bytes = serializer.dumps(&data).unwrap();
        let restored: TestData = serializer.loads(&bytes).unwrap();

        assert_eq!(data, restored);
    }

    #[test]
    fn test_typed_round_trip_structural() {
        let serializer = TypedSerializer::new();
        let value = json!({"brightness": 80, "scenes": ["dusk", "movie"]});

        let (tag, payload) = serializer.dumps_typed(&value).unwrap();
        assert_eq!(tag, TYPE_TAG_JSON);

        let restored = serializer.loads_typed(&tag, &payload).unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn test_typed_degrades_rich_types_to_structural_projection() {
        let serializer = TypedSerializer::new();
        let turn = TestData {
            name: "thermostat_agent".to_string(),
            value: 7,
        };

        let (tag, payload) = serializer.dumps_typed(&turn).unwrap();
        let restored = serializer.loads_typed(&tag, &payload).unwrap();

        // The typed object comes back as its dict-equivalent form.
        assert_eq!(restored, json!({"name": "thermostat_agent", "value": 7}));
    }

    #[test]
    fn test_typed_unknown_tag_fails_fast() {
        let serializer = TypedSerializer::new();
        let err = serializer.loads_typed("pickle", b"\x80\x04").unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_typed_round_trip_law(
                name in ".*",
                count in any::<i64>(),
                enabled in any::<bool>(),
                rooms in prop::collection::vec("[a-z]{1,8}", 0..4),
            ) {
                let serializer = TypedSerializer::new();
                let value = json!({
                    "name": name,
                    "count": count,
                    "enabled": enabled,
                    "rooms": rooms,
                });

                let (tag, payload) = serializer.dumps_typed(&value).unwrap();
                let restored = serializer.loads_typed(&tag, &payload).unwrap();
                prop_assert_eq!(restored, value);
            }
        }
    }
}

//! Tagged, versioned envelope for protocol-specific pool fields.
//!
//! Each protocol's extra record is stored on the [`PoolEntity`](crate::entity::PoolEntity) as an
//! opaque string of the form `{"t": "<type tag>", "v": <schema version>, "d": {...}}`. Decoding
//! checks the tag and version before touching the payload so a blob written by another protocol,
//! or by an incompatible schema, is rejected instead of being misread.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed blob: {0}")]
    Malformed(String),
    #[error("blob tagged {found:?}, expected {expected:?}")]
    TagMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("unsupported {tag} schema version {found} (supported: {supported})")]
    UnsupportedVersion {
        tag: &'static str,
        found: u32,
        supported: u32,
    },
    #[error("missing field: {0}")]
    MissingField(String),
}

/// A protocol's extra record, identified by its type tag and schema version.
pub trait PoolExtraCodec: Serialize + DeserializeOwned {
    const TYPE_TAG: &'static str;
    const VERSION: u32;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    t: &'a str,
    v: u32,
    d: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    t: String,
    v: u32,
    d: Value,
}

pub fn encode<E: PoolExtraCodec>(extra: &E) -> Result<String, CodecError> {
    serde_json::to_string(&EnvelopeRef {
        t: E::TYPE_TAG,
        v: E::VERSION,
        d: extra,
    })
    .map_err(|e| CodecError::Malformed(e.to_string()))
}

pub fn decode<E: PoolExtraCodec>(blob: &str) -> Result<E, CodecError> {
    if blob.trim().is_empty() {
        return Err(CodecError::Malformed("empty blob".to_string()));
    }
    let envelope: Envelope =
        serde_json::from_str(blob).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if envelope.t != E::TYPE_TAG {
        return Err(CodecError::TagMismatch {
            expected: E::TYPE_TAG,
            found: envelope.t,
        });
    }
    if envelope.v != E::VERSION {
        return Err(CodecError::UnsupportedVersion {
            tag: E::TYPE_TAG,
            found: envelope.v,
            supported: E::VERSION,
        });
    }
    serde_json::from_value(envelope.d).map_err(classify)
}

/// Reads only the type tag of a blob, without decoding its payload.
pub fn peek_tag(blob: &str) -> Result<String, CodecError> {
    let envelope: Envelope =
        serde_json::from_str(blob).map_err(|e| CodecError::Malformed(e.to_string()))?;
    Ok(envelope.t)
}

fn classify(e: serde_json::Error) -> CodecError {
    let message = e.to_string();
    match message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        Some(field) => CodecError::MissingField(field.to_string()),
        None => CodecError::Malformed(message),
    }
}

/// `#[serde(skip_serializing_if = "codec::is_false")]` for flags that default to false.
pub fn is_false(value: &bool) -> bool {
    !*value
}

/// Serializes a `U256` as a decimal string (wei amounts routinely exceed JSON number precision).
pub mod u256_dec {
    use ethers::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub(crate) fn parse(raw: &str) -> Result<U256, String> {
        match raw.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("{}: {}", raw, e)),
            None => U256::from_dec_str(raw).map_err(|e| format!("{}: {}", raw, e)),
        }
    }
}

pub mod u256_vec_dec {
    use ethers::types::U256;
    use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|raw| super::u256_dec::parse(raw).map_err(D::Error::custom))
            .collect()
    }
}

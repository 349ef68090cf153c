// src/utils/serialization.rs
//! Serialization utilities for the credential engine.
//!
//! Provides serialization and deserialization functions for:
//! - JSON data structures
//! - Curve points and field elements (base64 of the arkworks compressed form)

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

use crate::error::{AnoncredsError, Result};

/// Serializes a value to a JSON string.
pub fn serialize<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string(data).map_err(Into::into)
}

/// Deserializes a value from a JSON string.
pub fn deserialize<'a, T: Deserialize<'a>>(data: &'a str) -> Result<T> {
    serde_json::from_str(data).map_err(Into::into)
}

/// Encodes an arkworks value as base64 of its compressed canonical bytes.
pub fn ark_to_base64<T: CanonicalSerialize>(value: &T) -> Result<String> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    value.serialize_compressed(&mut bytes)?;
    Ok(base64::encode(bytes))
}

/// Decodes a value produced by [`ark_to_base64`].
///
/// Point decoding validates subgroup membership, so a tampered point fails
/// here rather than inside a pairing.
pub fn ark_from_base64<T: CanonicalDeserialize>(data: &str) -> Result<T> {
    let bytes = base64::decode(data)
        .map_err(|e| AnoncredsError::Crypto(format!("Base64 decoding failed: {}", e)))?;
    T::deserialize_compressed(&bytes[..]).map_err(Into::into)
}

/// Serde adapter for a single arkworks value.
///
/// `#[serde(with = "crate::utils::serialization::ark_base64")]`
pub mod ark_base64 {
    use super::*;
    use serde::{de::Error as _, ser::Error as _, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let encoded = ark_to_base64(value).map_err(S::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<T, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        ark_from_base64(&encoded).map_err(D::Error::custom)
    }
}

/// Serde adapter for an ordered list of arkworks values.
pub mod ark_base64_vec {
    use super::*;
    use serde::{de::Error as _, ser::Error as _, Deserializer, Serializer};

    pub fn serialize<T, S>(values: &[T], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let encoded = values
            .iter()
            .map(ark_to_base64)
            .collect::<Result<Vec<_>>>()
            .map_err(S::Error::custom)?;
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| ark_from_base64(s))
            .collect::<Result<Vec<_>>>()
            .map_err(D::Error::custom)
    }
}

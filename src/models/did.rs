// src/models/did.rs
//! Decentralized Identifier (DID) data model.
//!
//! DIDs here are unqualified ledger identifiers: base58 of the first 16 bytes
//! of SHA-256 over the identity's compressed verkey. The ledger anchors each
//! DID with a [`NymRecord`] carrying the full verkey, which is what write
//! requests are checked against.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnoncredsError, Result};
use crate::utils::crypto::hash_data;

/// A ledger-anchored identity reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    pub fn from_verkey(verkey: &[u8]) -> Self {
        Did(bs58::encode(&hash_data(verkey)[..16]).into_string())
    }

    /// Parses a DID received from outside, checking it is base58 of 16 bytes.
    pub fn parse(value: &str) -> Result<Self> {
        let bytes = bs58::decode(value)
            .into_vec()
            .map_err(|_| AnoncredsError::Validation(format!("{:?} is not a base58 DID", value)))?;
        if bytes.len() != 16 {
            return Err(AnoncredsError::Validation(format!(
                "DID {:?} decodes to {} bytes, expected 16",
                value,
                bytes.len()
            )));
        }
        Ok(Did(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Did {
    type Error = AnoncredsError;

    fn try_from(value: String) -> Result<Self> {
        Did::parse(&value)
    }
}

impl From<Did> for String {
    fn from(value: Did) -> String {
        value.0
    }
}

/// Ledger role of a NYM. Only stewards may register new identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Steward,
    Endorser,
    User,
}

/// The ledger's record of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NymRecord {
    pub did: Did,
    /// Base58 compressed secp256k1 public key
    pub verkey: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_derived_dids() {
        let did = Did::from_verkey(b"some verkey bytes");
        assert_eq!(Did::parse(did.as_str()).unwrap(), did);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Did::parse("not-base58-0OIl").is_err());
        assert!(Did::parse("3mJr7AoUXx2Wqd").is_err());
    }

    #[test]
    fn test_did_serializes_as_plain_string() {
        let did = Did::from_verkey(b"k");
        let json = serde_json::to_string(&did).unwrap();
        assert_eq!(json, format!("\"{}\"", did));
    }
}

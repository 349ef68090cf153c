// src/models/credential.rs
//! Issued credential data model.
//!
//! A [`Credential`] is the third protocol message: attribute values plus the
//! issuer's signature over the holder's blinded link secret and the encoded
//! attributes. It only becomes verifiable against the definition's public key
//! after the holder removes the blinding with the factors kept in its
//! [`CredentialRequestMetadata`](crate::models::messages::CredentialRequestMetadata);
//! [`StoredCredential`] keeps the two together for that reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AnoncredsError, Result};
use crate::models::credential_definition::{CredentialDefinition, CredentialDefinitionId};
use crate::models::did::Did;
use crate::models::messages::CredentialRequestMetadata;
use crate::models::schema::SchemaId;
use crate::utils::encoding::{check_encoding, encode_attribute};
use crate::zkp::SignatureMaterial;

/// A raw attribute value and its integer encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeValue {
    pub raw: String,
    pub encoded: String,
}

impl AttributeValue {
    /// Builds a pair using the canonical encoding.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let encoded = encode_attribute(&raw);
        AttributeValue { raw, encoded }
    }
}

/// Attribute values keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialValues(pub BTreeMap<String, AttributeValue>);

impl CredentialValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute with its canonical encoding.
    pub fn with(mut self, name: &str, raw: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), AttributeValue::new(raw));
        self
    }

    /// Adds an attribute with a caller-supplied encoding.
    pub fn with_encoded(mut self, name: &str, raw: impl Into<String>, encoded: impl Into<String>) -> Self {
        self.0.insert(
            name.to_string(),
            AttributeValue { raw: raw.into(), encoded: encoded.into() },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    /// Checks the values cover `attributes` exactly and that every encoding
    /// is canonical.
    pub fn check_against(&self, attributes: &[String]) -> Result<()> {
        for name in attributes {
            let value = self.0.get(name).ok_or_else(|| AnoncredsError::AttributeEncodingMismatch {
                attribute: name.clone(),
                detail: "no value supplied".into(),
            })?;
            check_encoding(name, &value.raw, &value.encoded)?;
        }
        if let Some(extra) = self.0.keys().find(|k| !attributes.contains(k)) {
            return Err(AnoncredsError::AttributeEncodingMismatch {
                attribute: extra.clone(),
                detail: "not part of the schema".into(),
            });
        }
        Ok(())
    }

    /// Encoded values ordered by `attributes`.
    pub fn encoded_in_order(&self, attributes: &[String]) -> Result<Vec<String>> {
        attributes
            .iter()
            .map(|name| {
                self.0
                    .get(name)
                    .map(|v| v.encoded.clone())
                    .ok_or_else(|| AnoncredsError::AttributeEncodingMismatch {
                        attribute: name.clone(),
                        detail: "no value supplied".into(),
                    })
            })
            .collect()
    }
}

/// The issued credential (third protocol message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Credential {
    pub schema_id: SchemaId,
    pub cred_def_id: CredentialDefinitionId,
    pub values: CredentialValues,
    pub signature: SignatureMaterial,
    /// Reserved for a revocation registry; always absent while revocation is
    /// unsupported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<String>,
}

/// Holder-side record: the credential, the definition it verifies against,
/// and the request metadata that unblinds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub id: String,
    pub holder: Did,
    pub credential: Credential,
    pub definition: CredentialDefinition,
    pub metadata: CredentialRequestMetadata,
    pub stored_at: DateTime<Utc>,
}

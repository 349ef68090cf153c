// src/models/credential_definition.rs
//! Credential definition data model.
//!
//! A definition is the issuer's public commitment binding one schema to one
//! set of signing keys. Its id is derived from the issuer, the signature
//! type, the schema's ledger sequence number, and a free-form tag; a given
//! `(issuer, schema, tag)` therefore maps to exactly one definition id. The
//! private half of the key pair never appears in this structure.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnoncredsError, Result};
use crate::models::did::Did;
use crate::models::schema::SchemaId;
use crate::zkp::CredentialPublicKey;

const DEFINITION_MARKER: &str = "3";

/// `<issuer_did>:3:<signature_type>:<schema_seq_no>:<tag>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialDefinitionId(String);

impl CredentialDefinitionId {
    pub fn new(issuer: &Did, signature_type: &str, schema_seq_no: u64, tag: &str) -> Self {
        CredentialDefinitionId(format!(
            "{}:{}:{}:{}:{}",
            issuer, DEFINITION_MARKER, signature_type, schema_seq_no, tag
        ))
    }

    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.splitn(5, ':').collect();
        match parts.as_slice() {
            [did, DEFINITION_MARKER, sig_type, seq_no, tag]
                if !sig_type.is_empty() && !tag.is_empty() && seq_no.parse::<u64>().is_ok() =>
            {
                Did::parse(did)?;
                Ok(CredentialDefinitionId(value.to_string()))
            }
            _ => Err(AnoncredsError::Validation(format!(
                "malformed credential definition id {:?}",
                value
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CredentialDefinitionId {
    type Error = AnoncredsError;

    fn try_from(value: String) -> Result<Self> {
        CredentialDefinitionId::parse(&value)
    }
}

impl From<CredentialDefinitionId> for String {
    fn from(value: CredentialDefinitionId) -> String {
        value.0
    }
}

/// Options accepted when creating a definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionConfig {
    pub support_revocation: bool,
}

/// The public credential definition as written to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CredentialDefinition {
    pub id: CredentialDefinitionId,
    pub schema_id: SchemaId,
    pub issuer_id: Did,
    pub tag: String,
    #[serde(rename = "type")]
    pub signature_type: String,
    pub support_revocation: bool,
    pub public_key: CredentialPublicKey,
}

impl CredentialDefinition {
    /// Attribute names in signing order.
    pub fn attributes(&self) -> &[String] {
        self.public_key.attributes()
    }

    /// Checks the fields that must agree with one another.
    pub fn validate(&self) -> Result<()> {
        CredentialDefinitionId::parse(self.id.as_str())?;
        if self.public_key.signature_type() != self.signature_type {
            return Err(AnoncredsError::Validation(format!(
                "definition {} declares type {} but carries {} key material",
                self.id,
                self.signature_type,
                self.public_key.signature_type()
            )));
        }
        if !self.id.as_str().starts_with(&format!("{}:", self.issuer_id)) {
            return Err(AnoncredsError::Validation(format!(
                "definition {} is not owned by {}",
                self.id, self.issuer_id
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_tag(tag: &str) -> Result<()> {
    if tag.trim().is_empty() {
        return Err(AnoncredsError::Validation("definition tag must not be empty".into()));
    }
    Ok(())
}

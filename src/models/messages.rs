// src/models/messages.rs
//! Issuer/holder exchange messages.
//!
//! These shapes are the stable contract between issuer and holder processes.
//! On the wire every message is wrapped in [`ExchangeMessage`], an
//! adjacently-tagged enum whose tag carries the protocol step and version:
//!
//! ```json
//! { "type": "anoncreds/credential-offer/1.0", "body": { ... } }
//! ```
//!
//! Payload structs reject unknown fields, so a malformed message fails at
//! decode time instead of at first field access.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnoncredsError, Result};
use crate::models::credential::Credential;
use crate::models::credential_definition::CredentialDefinitionId;
use crate::models::did::Did;
use crate::models::schema::SchemaId;
use crate::utils::serialization;
use crate::zkp::{BlindedLinkSecret, BlindingFactors};

/// Unpredictable single-use challenge, decimal encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    /// 128 bits from the OS RNG.
    pub fn generate() -> Self {
        Nonce(OsRng.gen::<u128>().to_string())
    }

    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() || value.len() > 80 || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(AnoncredsError::Validation(format!("malformed nonce {:?}", value)));
        }
        Ok(Nonce(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Nonce {
    type Error = AnoncredsError;

    fn try_from(value: String) -> Result<Self> {
        Nonce::parse(&value)
    }
}

impl From<Nonce> for String {
    fn from(value: Nonce) -> String {
        value.0
    }
}

/// First message: issuer to holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CredentialOffer {
    pub schema_id: SchemaId,
    pub cred_def_id: CredentialDefinitionId,
    pub issuer_id: Did,
    pub nonce: Nonce,
}

/// Second message: holder to issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CredentialRequest {
    pub prover_did: Did,
    pub cred_def_id: CredentialDefinitionId,
    /// Commitment to the link secret and its proof of correct formation
    pub blinded_link_secret: BlindedLinkSecret,
    /// Echo of the offer nonce this request answers
    pub nonce: Nonce,
}

/// Holder-private data produced alongside a request. Never sent to the
/// issuer; required to store the resulting credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CredentialRequestMetadata {
    pub link_secret_id: String,
    pub blinding_factors: BlindingFactors,
    pub nonce: Nonce,
    pub cred_def_id: CredentialDefinitionId,
    pub prover_did: Did,
}

/// Reserved fourth message carrying a revocation witness. Revocation is not
/// supported, so the engine never emits it and rejects it on receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RevocationWitnessUpdate {
    pub cred_def_id: CredentialDefinitionId,
    pub rev_reg_id: String,
    pub witness: serde_json::Value,
}

/// Versioned envelope for every protocol step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum ExchangeMessage {
    #[serde(rename = "anoncreds/credential-offer/1.0")]
    Offer(CredentialOffer),
    #[serde(rename = "anoncreds/credential-request/1.0")]
    Request(CredentialRequest),
    #[serde(rename = "anoncreds/credential/1.0")]
    Credential(Credential),
    #[serde(rename = "anoncreds/revocation-witness/1.0")]
    RevocationWitness(RevocationWitnessUpdate),
}

impl ExchangeMessage {
    /// Decodes a message, mapping every shape error to `Validation`.
    pub fn from_json(data: &str) -> Result<Self> {
        serialization::deserialize(data).map_err(|e| match e {
            AnoncredsError::Serialization(e) => {
                AnoncredsError::Validation(format!("malformed exchange message: {}", e))
            }
            other => other,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serialization::serialize(self)
    }

    pub fn into_offer(self) -> Result<CredentialOffer> {
        match self {
            ExchangeMessage::Offer(offer) => Ok(offer),
            other => Err(unexpected("credential offer", &other)),
        }
    }

    pub fn into_request(self) -> Result<CredentialRequest> {
        match self {
            ExchangeMessage::Request(request) => Ok(request),
            other => Err(unexpected("credential request", &other)),
        }
    }

    pub fn into_credential(self) -> Result<Credential> {
        match self {
            ExchangeMessage::Credential(credential) => Ok(credential),
            other => Err(unexpected("credential", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ExchangeMessage::Offer(_) => "credential offer",
            ExchangeMessage::Request(_) => "credential request",
            ExchangeMessage::Credential(_) => "credential",
            ExchangeMessage::RevocationWitness(_) => "revocation witness",
        }
    }
}

fn unexpected(expected: &str, got: &ExchangeMessage) -> AnoncredsError {
    AnoncredsError::ProtocolSequence(format!("expected {}, received {}", expected, got.kind()))
}

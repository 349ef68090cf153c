// src/ledger/client.rs
//! Ledger client contract.
//!
//! The engine talks to the replicated ledger through [`LedgerClient`]: signed
//! write requests go in through `submit`, prior state comes back through
//! `read`. Writes become globally visible eventually, not immediately, and a
//! write that collides with an existing entity comes back as a
//! [`LedgerReply::Rejected`] value rather than an error, so callers can decide
//! whether a duplicate is fine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{AnoncredsError, Result};
use crate::models::credential_definition::{CredentialDefinition, CredentialDefinitionId};
use crate::models::did::{Did, NymRecord};
use crate::models::schema::{Schema, SchemaId};
use crate::wallet::key_management::KeyHandle;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// Entity written by a ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "txnType", content = "data")]
pub enum LedgerOperation {
    #[serde(rename = "NYM")]
    Nym(NymRecord),
    #[serde(rename = "SCHEMA")]
    Schema(Schema),
    #[serde(rename = "CRED_DEF")]
    CredentialDefinition(CredentialDefinition),
}

impl LedgerOperation {
    /// The query that reads this entity back.
    pub fn key(&self) -> LedgerQuery {
        match self {
            LedgerOperation::Nym(nym) => LedgerQuery::Nym(nym.did.clone()),
            LedgerOperation::Schema(schema) => LedgerQuery::Schema(schema.id.clone()),
            LedgerOperation::CredentialDefinition(def) => LedgerQuery::CredentialDefinition(def.id.clone()),
        }
    }
}

/// Read query by entity id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerQuery {
    Nym(Did),
    Schema(SchemaId),
    CredentialDefinition(CredentialDefinitionId),
}

impl std::fmt::Display for LedgerQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerQuery::Nym(did) => write!(f, "NYM {}", did),
            LedgerQuery::Schema(id) => write!(f, "SCHEMA {}", id),
            LedgerQuery::CredentialDefinition(id) => write!(f, "CRED_DEF {}", id),
        }
    }
}

/// Unsigned write request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRequest {
    pub identifier: Did,
    pub req_id: u64,
    pub operation: LedgerOperation,
}

impl LedgerRequest {
    pub fn new(identifier: Did, operation: LedgerOperation) -> Self {
        LedgerRequest {
            identifier,
            req_id: NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed),
            operation,
        }
    }

    /// Bytes covered by the submitter's signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    /// Signs with the submitter's identity key.
    ///
    /// # Errors
    /// `Validation` if `key` does not belong to the request's identifier.
    pub fn sign(self, key: &KeyHandle) -> Result<SignedRequest> {
        if key.did() != &self.identifier {
            return Err(AnoncredsError::Validation(format!(
                "key for {} cannot sign a request from {}",
                key.did(),
                self.identifier
            )));
        }
        let signature = base64::encode(key.sign(&self.signing_bytes()?));
        Ok(SignedRequest { request: self, signature })
    }
}

/// Write request plus the submitter's base64 ECDSA signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub request: LedgerRequest,
    pub signature: String,
}

impl SignedRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| AnoncredsError::Validation(format!("malformed ledger request: {}", e)))
    }
}

/// Proof of a committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub seq_no: u64,
    pub txn_time: DateTime<Utc>,
    pub entity: LedgerQuery,
}

/// A committed transaction as returned by reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub seq_no: u64,
    pub txn_time: DateTime<Utc>,
    pub submitter: Did,
    pub operation: LedgerOperation,
}

impl LedgerEntry {
    pub fn receipt(&self) -> Receipt {
        Receipt {
            seq_no: self.seq_no,
            txn_time: self.txn_time,
            entity: self.operation.key(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// An entity with the same id is already on the ledger
    Duplicate,
    /// Submitter unknown, signature invalid, or role insufficient
    Unauthorized,
    /// Payload failed ledger-side validation
    InvalidPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
    /// The entity already stored, for `Duplicate` rejections
    pub existing: Option<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerReply {
    Committed(Receipt),
    Rejected(Rejection),
}

/// Replicated, append-only ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, request: SignedRequest) -> Result<LedgerReply>;

    /// `Ok(None)` when the entity does not exist or is not visible yet.
    async fn read(&self, query: LedgerQuery) -> Result<Option<LedgerEntry>>;

    /// Disconnects from the pool. Later calls fail with `ContextClosed`.
    fn close(&self);
}

/// How a publish-type operation resolved against the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// The write committed
    Created(Receipt),
    /// The same payload was already on the ledger
    AlreadyPresentIdentical(Receipt),
    /// A different payload occupies the id
    Conflict { existing: LedgerEntry },
}

impl PublishOutcome {
    /// Classifies a ledger reply for `operation`.
    ///
    /// # Errors
    /// `LedgerRejected` for rejections other than duplicates (bad signature,
    /// missing role, invalid payload); those are never tolerable.
    pub fn classify(reply: LedgerReply, operation: &LedgerOperation) -> Result<Self> {
        match reply {
            LedgerReply::Committed(receipt) => Ok(PublishOutcome::Created(receipt)),
            LedgerReply::Rejected(Rejection {
                reason: RejectReason::Duplicate,
                existing: Some(existing),
                ..
            }) => {
                if &existing.operation == operation {
                    Ok(PublishOutcome::AlreadyPresentIdentical(existing.receipt()))
                } else {
                    Ok(PublishOutcome::Conflict { existing })
                }
            }
            LedgerReply::Rejected(rejection) => Err(AnoncredsError::LedgerRejected {
                id: operation.key().to_string(),
                reason: rejection.message,
            }),
        }
    }

    /// Strict callers: anything but a fresh write is `LedgerRejected`.
    pub fn require_created(self) -> Result<Receipt> {
        match self {
            PublishOutcome::Created(receipt) => Ok(receipt),
            PublishOutcome::AlreadyPresentIdentical(receipt) => Err(AnoncredsError::LedgerRejected {
                id: receipt.entity.to_string(),
                reason: "already exists".into(),
            }),
            PublishOutcome::Conflict { existing } => Err(conflict(&existing)),
        }
    }

    /// Idempotent callers: an identical duplicate counts as success, a
    /// conflicting one does not.
    pub fn tolerate_identical(self) -> Result<Receipt> {
        match self {
            PublishOutcome::Created(receipt) | PublishOutcome::AlreadyPresentIdentical(receipt) => Ok(receipt),
            PublishOutcome::Conflict { existing } => Err(conflict(&existing)),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, PublishOutcome::Created(_))
    }
}

fn conflict(existing: &LedgerEntry) -> AnoncredsError {
    AnoncredsError::LedgerRejected {
        id: existing.operation.key().to_string(),
        reason: format!("conflicts with entry at seq_no {}", existing.seq_no),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::did::Role;

    fn nym(key: &KeyHandle) -> LedgerOperation {
        LedgerOperation::Nym(NymRecord {
            did: key.did().clone(),
            verkey: key.verkey(),
            role: Role::User,
        })
    }

    fn entry(operation: LedgerOperation, submitter: Did) -> LedgerEntry {
        LedgerEntry {
            seq_no: 4,
            txn_time: Utc::now(),
            submitter,
            operation,
        }
    }

    #[test]
    fn test_sign_requires_matching_key() {
        let a = KeyHandle::generate();
        let b = KeyHandle::generate();
        let request = LedgerRequest::new(a.did().clone(), nym(&a));
        assert!(request.clone().sign(&a).is_ok());
        assert!(matches!(request.sign(&b), Err(AnoncredsError::Validation(_))));
    }

    #[test]
    fn test_signed_request_bytes_round_trip() {
        let key = KeyHandle::generate();
        let signed = LedgerRequest::new(key.did().clone(), nym(&key)).sign(&key).unwrap();
        let back = SignedRequest::from_bytes(&signed.to_bytes().unwrap()).unwrap();
        assert_eq!(back, signed);
        assert!(SignedRequest::from_bytes(b"{}").is_err());
    }

    #[test]
    fn test_classify_duplicates() {
        let key = KeyHandle::generate();
        let op = nym(&key);
        let same = LedgerReply::Rejected(Rejection {
            reason: RejectReason::Duplicate,
            message: "exists".into(),
            existing: Some(entry(op.clone(), key.did().clone())),
        });
        let outcome = PublishOutcome::classify(same, &op).unwrap();
        assert!(matches!(outcome, PublishOutcome::AlreadyPresentIdentical(_)));
        assert!(outcome.clone().tolerate_identical().is_ok());
        assert!(matches!(outcome.require_created(), Err(AnoncredsError::LedgerRejected { .. })));

        let other = nym(&KeyHandle::generate());
        let different = LedgerReply::Rejected(Rejection {
            reason: RejectReason::Duplicate,
            message: "exists".into(),
            existing: Some(entry(other, key.did().clone())),
        });
        let outcome = PublishOutcome::classify(different, &op).unwrap();
        assert!(matches!(outcome, PublishOutcome::Conflict { .. }));
        assert!(outcome.tolerate_identical().is_err());
    }

    #[test]
    fn test_classify_unauthorized_is_an_error() {
        let key = KeyHandle::generate();
        let reply = LedgerReply::Rejected(Rejection {
            reason: RejectReason::Unauthorized,
            message: "unknown submitter".into(),
            existing: None,
        });
        assert!(matches!(
            PublishOutcome::classify(reply, &nym(&key)),
            Err(AnoncredsError::LedgerRejected { .. })
        ));
    }
}

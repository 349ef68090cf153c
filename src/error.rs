// src/error.rs
//! Error taxonomy for the credential engine.
//!
//! Every operation surfaces its failure synchronously to the immediate caller.
//! The only place an error is tolerated rather than propagated is publish-time
//! duplicate handling, which is expressed through [`crate::ledger::PublishOutcome`]
//! instead of an error variant.

use thiserror::Error;

/// Errors raised by the schema registry, definition manager, issuance engine,
/// credential store, and their collaborators.
#[derive(Error, Debug)]
pub enum AnoncredsError {
    /// Malformed input shape. Local and never retried automatically.
    #[error("validation error: {0}")]
    Validation(String),

    /// The ledger refused a write because a conflicting or duplicate entity
    /// already exists under the same id.
    #[error("ledger rejected {id}: {reason}")]
    LedgerRejected {
        /// Id of the entity the write targeted
        id: String,
        /// Ledger-supplied reason
        reason: String,
    },

    /// A protocol message arrived out of order for its issuance flow.
    #[error("protocol sequence error: {0}")]
    ProtocolSequence(String),

    /// The offer nonce was already consumed by an earlier credential.
    #[error("offer {nonce} already consumed")]
    OfferAlreadyConsumed {
        /// Nonce of the replayed offer
        nonce: String,
    },

    /// Signature or blinding proof did not verify.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// An attribute's encoded value does not match the canonical encoding of
    /// its raw value, or an attribute is missing or unexpected.
    #[error("attribute '{attribute}' encoding mismatch: {detail}")]
    AttributeEncodingMismatch {
        /// Attribute name
        attribute: String,
        /// What was wrong with it
        detail: String,
    },

    #[error("unsupported signature type '{0}'")]
    UnsupportedSignatureType(String),

    #[error("schema {0} not found on ledger")]
    SchemaNotFound(String),

    #[error("credential definition {0} not found")]
    DefinitionNotFound(String),

    #[error("stored credential {0} not found")]
    CredentialNotFound(String),

    #[error("link secret '{0}' not found")]
    LinkSecretNotFound(String),

    /// No signing key or credential private key under the given handle.
    #[error("key not found for {0}")]
    KeyNotFound(String),

    /// A collaborator call exceeded its caller-supplied deadline.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// Name of the aborted call
        operation: &'static str,
        /// Deadline that elapsed
        millis: u128,
    },

    /// The ledger pool or wallet was used after its context closed.
    #[error("{0} is closed")]
    ContextClosed(&'static str),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Low-level cryptographic failure (point decoding, key parsing).
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl AnoncredsError {
    /// Only deadline expiry is worth retrying; every other category is
    /// either a caller bug or a fatal protocol violation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnoncredsError::Timeout { .. })
    }
}

impl From<ark_serialize::SerializationError> for AnoncredsError {
    fn from(err: ark_serialize::SerializationError) -> Self {
        AnoncredsError::Crypto(err.to_string())
    }
}

impl From<k256::ecdsa::Error> for AnoncredsError {
    fn from(err: k256::ecdsa::Error) -> Self {
        AnoncredsError::Crypto(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AnoncredsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_are_retryable() {
        let timeout = AnoncredsError::Timeout { operation: "ledger.read", millis: 10 };
        assert!(timeout.is_retryable());
        assert!(!AnoncredsError::Validation("x".into()).is_retryable());
        assert!(!AnoncredsError::OfferAlreadyConsumed { nonce: "1".into() }.is_retryable());
    }

    #[test]
    fn test_display_carries_context() {
        let err = AnoncredsError::AttributeEncodingMismatch {
            attribute: "age".into(),
            detail: "expected 28".into(),
        };
        assert_eq!(err.to_string(), "attribute 'age' encoding mismatch: expected 28");
    }
}

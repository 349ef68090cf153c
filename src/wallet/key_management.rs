// src/wallet/key_management.rs
//! Identity key management for the wallet.
//!
//! Every identity (steward, issuer, holder) owns a secp256k1 signing key. The
//! key signs ledger write requests; its compressed public key is the
//! identity's verkey, and the DID is derived from the verkey.
//!
//! Uses the following cryptographic primitives:
//! - secp256k1 ECDSA with SHA-256 prehashing (via `k256`)
//! - SHA-256 for seed stretching and DID derivation (via `ring`)
//! - base58 for textual DIDs and verkeys (via `bs58`)

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{AnoncredsError, Result};
use crate::models::did::Did;
use crate::utils::crypto::hash_data;

/// Handle to an identity signing key held by the secret store.
///
/// The secret scalar never leaves this struct; callers can only ask it to
/// sign.
#[derive(Clone)]
pub struct KeyHandle {
    did: Did,
    signing_key: SigningKey,
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle").field("did", &self.did).finish_non_exhaustive()
    }
}

impl KeyHandle {
    /// Generates a new identity with a random key.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Derives the identity deterministically from a seed, the way stewards
    /// are bootstrapped from a well-known seed.
    ///
    /// # Errors
    /// `Validation` if the seed is empty, `Crypto` in the negligible case that
    /// the stretched seed is not a valid scalar.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        if seed.is_empty() {
            return Err(AnoncredsError::Validation("seed must not be empty".into()));
        }
        let signing_key = SigningKey::from_slice(&hash_data(seed))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verkey = verkey_bytes(signing_key.verifying_key());
        KeyHandle {
            did: Did::from_verkey(&verkey),
            signing_key,
        }
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    /// Base58 of the compressed SEC1 public key.
    pub fn verkey(&self) -> String {
        bs58::encode(verkey_bytes(self.signing_key.verifying_key())).into_string()
    }

    /// Signs a message using ECDSA (secp256k1) over its SHA-256 digest.
    ///
    /// # Returns
    /// 64-byte compact ECDSA signature (R || S values)
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

fn verkey_bytes(key: &VerifyingKey) -> Vec<u8> {
    key.to_encoded_point(true).as_bytes().to_vec()
}

/// Verifies a compact signature against a base58 verkey.
pub fn verify_signature(verkey: &str, message: &[u8], signature: &[u8]) -> Result<()> {
    let key_bytes = bs58::decode(verkey)
        .into_vec()
        .map_err(|e| AnoncredsError::Crypto(format!("invalid verkey: {}", e)))?;
    let key = VerifyingKey::from_sec1_bytes(&key_bytes)?;
    let signature = Signature::from_slice(signature)?;
    key.verify(message, &signature)
        .map_err(|_| AnoncredsError::SignatureVerification("request signature is invalid".into()))
}

/// Recomputes the DID a verkey should map to.
pub fn did_for_verkey(verkey: &str) -> Result<Did> {
    let key_bytes = bs58::decode(verkey)
        .into_vec()
        .map_err(|e| AnoncredsError::Crypto(format!("invalid verkey: {}", e)))?;
    Ok(Did::from_verkey(&key_bytes))
}

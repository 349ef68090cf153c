// src/zkp/scheme.rs
//! # Signature scheme seam
//!
//! Credential definitions name their `signature_type`; the definition
//! manager and the issuance engine look the scheme up in a
//! [`SchemeRegistry`] and only ever talk to it through [`SignatureScheme`].
//! Key and signature material is carried in per-scheme enum variants so the
//! serialized shapes stay tagged with the scheme that produced them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AnoncredsError, Result};
use crate::utils::encoding::encoded_to_scalar;
use crate::wallet::secret_store::LinkSecretHandle;
use crate::zkp::cl::{self, ClBlindedSecret, ClBlindingFactor, ClPrivateKey, ClPublicKey, ClSignature};

pub const CL_SIGNATURE_TYPE: &str = "CL";

/// Public key material published inside a credential definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CredentialPublicKey {
    #[serde(rename = "CL")]
    Cl(ClPublicKey),
}

impl CredentialPublicKey {
    pub fn signature_type(&self) -> &'static str {
        match self {
            CredentialPublicKey::Cl(_) => CL_SIGNATURE_TYPE,
        }
    }

    /// Attribute names in signing order.
    pub fn attributes(&self) -> &[String] {
        match self {
            CredentialPublicKey::Cl(pk) => &pk.attributes,
        }
    }
}

/// Issuer private key material. Lives only inside the secret store.
#[derive(Clone, Debug)]
pub enum CredentialPrivateKey {
    Cl(ClPrivateKey),
}

/// Blinded link secret with its correctness proof, sent in a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BlindedLinkSecret {
    #[serde(rename = "CL")]
    Cl(ClBlindedSecret),
}

/// Holder-side unblinding capability, retained in request metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BlindingFactors {
    #[serde(rename = "CL")]
    Cl(ClBlindingFactor),
}

/// Issuer signature over the blinded secret and encoded attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SignatureMaterial {
    #[serde(rename = "CL")]
    Cl(ClSignature),
}

/// Values a blinding proof is bound to, so a request cannot be lifted onto a
/// different offer or holder.
#[derive(Debug, Clone, Copy)]
pub struct IssuanceContext<'a> {
    pub definition_id: &'a str,
    pub nonce: &'a str,
    pub holder_did: &'a str,
}

impl<'a> IssuanceContext<'a> {
    fn transcript(&self) -> [&'a [u8]; 3] {
        [
            self.definition_id.as_bytes(),
            self.nonce.as_bytes(),
            self.holder_did.as_bytes(),
        ]
    }
}

/// A blind-issuance signature scheme.
///
/// `encoded` arguments are the canonical decimal encodings in the order of
/// [`CredentialPublicKey::attributes`].
pub trait SignatureScheme: Send + Sync {
    fn signature_type(&self) -> &'static str;

    fn generate_keys(&self, attributes: &[String]) -> Result<(CredentialPublicKey, CredentialPrivateKey)>;

    /// Structural and cryptographic sanity check of a published key.
    fn check_public_key(&self, public_key: &CredentialPublicKey) -> Result<()>;

    fn blind_link_secret(
        &self,
        public_key: &CredentialPublicKey,
        link_secret: &LinkSecretHandle,
        context: IssuanceContext<'_>,
    ) -> Result<(BlindedLinkSecret, BlindingFactors)>;

    fn verify_blinded_secret(
        &self,
        public_key: &CredentialPublicKey,
        blinded: &BlindedLinkSecret,
        context: IssuanceContext<'_>,
    ) -> Result<()>;

    fn sign(
        &self,
        public_key: &CredentialPublicKey,
        private_key: &CredentialPrivateKey,
        blinded: &BlindedLinkSecret,
        encoded: &[String],
    ) -> Result<SignatureMaterial>;

    /// Unblinds `signature` with `factors` and verifies it for `link_secret`.
    fn unblind_and_verify(
        &self,
        public_key: &CredentialPublicKey,
        signature: &SignatureMaterial,
        factors: &BlindingFactors,
        link_secret: &LinkSecretHandle,
        encoded: &[String],
    ) -> Result<()>;
}

/// Pairing-based CL-family scheme, see [`crate::zkp::cl`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ClScheme;

impl ClScheme {
    fn scalars(attributes: &[String], encoded: &[String]) -> Result<Vec<ark_bn254::Fr>> {
        if attributes.len() != encoded.len() {
            return Err(AnoncredsError::Validation(format!(
                "expected {} encoded values, got {}",
                attributes.len(),
                encoded.len()
            )));
        }
        attributes
            .iter()
            .zip(encoded)
            .map(|(name, value)| encoded_to_scalar(name, value))
            .collect()
    }
}

impl SignatureScheme for ClScheme {
    fn signature_type(&self) -> &'static str {
        CL_SIGNATURE_TYPE
    }

    fn generate_keys(&self, attributes: &[String]) -> Result<(CredentialPublicKey, CredentialPrivateKey)> {
        let (public, private) = cl::generate_keys(attributes);
        Ok((CredentialPublicKey::Cl(public), CredentialPrivateKey::Cl(private)))
    }

    fn check_public_key(&self, public_key: &CredentialPublicKey) -> Result<()> {
        match public_key {
            CredentialPublicKey::Cl(pk) => cl::check_public_key(pk),
        }
    }

    fn blind_link_secret(
        &self,
        public_key: &CredentialPublicKey,
        link_secret: &LinkSecretHandle,
        context: IssuanceContext<'_>,
    ) -> Result<(BlindedLinkSecret, BlindingFactors)> {
        match public_key {
            CredentialPublicKey::Cl(pk) => {
                let (blinded, factor) =
                    cl::blind_link_secret(pk, &link_secret.scalar(), &context.transcript())?;
                Ok((BlindedLinkSecret::Cl(blinded), BlindingFactors::Cl(factor)))
            }
        }
    }

    fn verify_blinded_secret(
        &self,
        public_key: &CredentialPublicKey,
        blinded: &BlindedLinkSecret,
        context: IssuanceContext<'_>,
    ) -> Result<()> {
        match (public_key, blinded) {
            (CredentialPublicKey::Cl(pk), BlindedLinkSecret::Cl(blinded)) => {
                cl::verify_blinded_secret(pk, blinded, &context.transcript())
            }
        }
    }

    fn sign(
        &self,
        public_key: &CredentialPublicKey,
        private_key: &CredentialPrivateKey,
        blinded: &BlindedLinkSecret,
        encoded: &[String],
    ) -> Result<SignatureMaterial> {
        match (public_key, private_key, blinded) {
            (
                CredentialPublicKey::Cl(pk),
                CredentialPrivateKey::Cl(sk),
                BlindedLinkSecret::Cl(blinded),
            ) => {
                let messages = Self::scalars(&pk.attributes, encoded)?;
                Ok(SignatureMaterial::Cl(cl::sign(pk, sk, blinded, &messages)?))
            }
        }
    }

    fn unblind_and_verify(
        &self,
        public_key: &CredentialPublicKey,
        signature: &SignatureMaterial,
        factors: &BlindingFactors,
        link_secret: &LinkSecretHandle,
        encoded: &[String],
    ) -> Result<()> {
        match (public_key, signature, factors) {
            (
                CredentialPublicKey::Cl(pk),
                SignatureMaterial::Cl(signature),
                BlindingFactors::Cl(factor),
            ) => {
                let messages = Self::scalars(&pk.attributes, encoded)
                    .map_err(|e| AnoncredsError::SignatureVerification(e.to_string()))?;
                let unblinded = cl::unblind(signature, factor);
                cl::verify(pk, &unblinded, &link_secret.scalar(), &messages)
            }
        }
    }
}

/// Lookup table from `signature_type` names to scheme implementations.
#[derive(Clone)]
pub struct SchemeRegistry {
    schemes: HashMap<&'static str, Arc<dyn SignatureScheme>>,
}

impl SchemeRegistry {
    /// An empty registry; every lookup fails until a scheme is registered.
    pub fn empty() -> Self {
        Self { schemes: HashMap::new() }
    }

    pub fn register(&mut self, scheme: Arc<dyn SignatureScheme>) {
        self.schemes.insert(scheme.signature_type(), scheme);
    }

    pub fn get(&self, signature_type: &str) -> Result<Arc<dyn SignatureScheme>> {
        self.schemes
            .get(signature_type)
            .cloned()
            .ok_or_else(|| AnoncredsError::UnsupportedSignatureType(signature_type.to_string()))
    }

    pub fn supported(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.schemes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ClScheme));
        registry
    }
}

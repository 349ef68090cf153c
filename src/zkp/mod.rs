// src/zkp/mod.rs
//! Blind-issuance signature schemes.
//!
//! `cl` holds the curve arithmetic; `scheme` is the seam the services use.

pub mod cl;
pub mod scheme;

pub use scheme::{
    BlindedLinkSecret, BlindingFactors, ClScheme, CredentialPrivateKey, CredentialPublicKey,
    IssuanceContext, SchemeRegistry, SignatureMaterial, SignatureScheme, CL_SIGNATURE_TYPE,
};

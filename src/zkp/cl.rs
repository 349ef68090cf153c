// src/zkp/cl.rs
//! # CL-family blind signatures over BN254
//!
//! Pairing-based Camenisch-Lysyanskaya-family signature in the
//! Pointcheval-Sanders form. It signs an ordered vector of attribute scalars
//! plus one hidden scalar (the holder's link secret) that the issuer only
//! ever sees inside a Pedersen commitment.
//!
//! ## Keys
//! - secret: `x`, `y_1..y_n` (`y_link` is discarded after key generation;
//!   the commitment already carries `Y_link^s`)
//! - public: `Y_link = g^y_link` in G1 (commitment base), and
//!   `X~ = h^x`, `Y~_link = h^y_link`, `Y~_i = h^y_i` in G2
//!
//! ## Issuance
//! 1. Holder commits `C = g^t * Y_link^s` and proves knowledge of `(t, s)`.
//! 2. Issuer picks `u`, returns `s1 = g^u`, `s2 = (g^(x + sum y_i m_i) * C)^u`.
//! 3. Holder unblinds `s2' = s2 / s1^t` and checks
//!    `e(s1, X~ * Y~_link^s * prod Y~_i^m_i) == e(s2', h)`.

use ark_bn254::{Bn254, Fr, G1Projective, G2Projective};
use ark_ec::pairing::Pairing;
use ark_ec::PrimeGroup;
use ark_serialize::CanonicalSerialize;
use ark_std::{UniformRand, Zero};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{AnoncredsError, Result};
use crate::utils::crypto::hash_to_scalar;
use crate::utils::serialization::{ark_base64, ark_base64_vec};

const BLINDING_DOMAIN: &[u8] = b"did-anoncreds/cl/blinding/v1";

/// Issuer public key. Attribute bases are aligned with `attributes`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClPublicKey {
    #[serde(with = "ark_base64")]
    pub y_link: G1Projective,
    #[serde(with = "ark_base64")]
    pub x_tilde: G2Projective,
    #[serde(with = "ark_base64")]
    pub y_link_tilde: G2Projective,
    pub attributes: Vec<String>,
    #[serde(with = "ark_base64_vec")]
    pub y_tilde: Vec<G2Projective>,
}

/// Issuer secret key. Deliberately not serializable.
#[derive(Clone)]
pub struct ClPrivateKey {
    x: Fr,
    y: Vec<Fr>,
}

impl std::fmt::Debug for ClPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClPrivateKey(<private>)")
    }
}

/// Pedersen commitment to the link secret plus its proof of knowledge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClBlindedSecret {
    #[serde(with = "ark_base64")]
    pub commitment: G1Projective,
    #[serde(with = "ark_base64")]
    pub challenge: Fr,
    #[serde(with = "ark_base64")]
    pub response_blinding: Fr,
    #[serde(with = "ark_base64")]
    pub response_secret: Fr,
}

/// The blinding factor `t`. Holder-only; losing it makes the credential
/// permanently unusable.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClBlindingFactor {
    #[serde(with = "ark_base64")]
    pub blinding: Fr,
}

impl std::fmt::Debug for ClBlindingFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClBlindingFactor(<private>)")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClSignature {
    #[serde(with = "ark_base64")]
    pub sigma_1: G1Projective,
    #[serde(with = "ark_base64")]
    pub sigma_2: G1Projective,
}

/// Generates a fresh key pair for the given ordered attribute names.
pub fn generate_keys(attributes: &[String]) -> (ClPublicKey, ClPrivateKey) {
    let mut rng = OsRng;
    let g = G1Projective::generator();
    let h = G2Projective::generator();

    let x = Fr::rand(&mut rng);
    let y_link = Fr::rand(&mut rng);
    let y: Vec<Fr> = attributes.iter().map(|_| Fr::rand(&mut rng)).collect();

    let public = ClPublicKey {
        y_link: g * y_link,
        x_tilde: h * x,
        y_link_tilde: h * y_link,
        attributes: attributes.to_vec(),
        y_tilde: y.iter().map(|yi| h * yi).collect(),
    };
    (public, ClPrivateKey { x, y })
}

/// Checks the structural consistency of a published public key: one base
/// per attribute and the same `y_link` exponent in both groups.
pub fn check_public_key(pk: &ClPublicKey) -> Result<()> {
    if pk.y_tilde.len() != pk.attributes.len() {
        return Err(AnoncredsError::Validation(format!(
            "public key has {} attribute bases for {} attributes",
            pk.y_tilde.len(),
            pk.attributes.len()
        )));
    }
    if pk.y_link.is_zero() || pk.x_tilde.is_zero() {
        return Err(AnoncredsError::Validation("public key contains the identity".into()));
    }
    let lhs = Bn254::pairing(pk.y_link, G2Projective::generator());
    let rhs = Bn254::pairing(G1Projective::generator(), pk.y_link_tilde);
    if lhs != rhs {
        return Err(AnoncredsError::SignatureVerification(
            "link secret bases do not share an exponent".into(),
        ));
    }
    Ok(())
}

/// Commits to `link_secret` and proves knowledge of the opening, bound to
/// `context` (definition id, offer nonce, holder DID).
pub fn blind_link_secret(
    pk: &ClPublicKey,
    link_secret: &Fr,
    context: &[&[u8]],
) -> Result<(ClBlindedSecret, ClBlindingFactor)> {
    let mut rng = OsRng;
    let g = G1Projective::generator();

    let t = Fr::rand(&mut rng);
    let commitment = g * t + pk.y_link * link_secret;

    let r_t = Fr::rand(&mut rng);
    let r_s = Fr::rand(&mut rng);
    let announcement = g * r_t + pk.y_link * r_s;
    let challenge = blinding_challenge(&commitment, &announcement, context)?;

    let blinded = ClBlindedSecret {
        commitment,
        challenge,
        response_blinding: r_t + challenge * t,
        response_secret: r_s + challenge * link_secret,
    };
    Ok((blinded, ClBlindingFactor { blinding: t }))
}

/// Issuer-side check of the blinding proof.
pub fn verify_blinded_secret(
    pk: &ClPublicKey,
    blinded: &ClBlindedSecret,
    context: &[&[u8]],
) -> Result<()> {
    let g = G1Projective::generator();
    let announcement = g * blinded.response_blinding + pk.y_link * blinded.response_secret
        - blinded.commitment * blinded.challenge;
    let expected = blinding_challenge(&blinded.commitment, &announcement, context)?;
    if expected != blinded.challenge {
        return Err(AnoncredsError::SignatureVerification(
            "blinded link secret proof does not verify".into(),
        ));
    }
    Ok(())
}

/// Signs the attribute scalars together with the committed link secret.
pub fn sign(
    pk: &ClPublicKey,
    sk: &ClPrivateKey,
    blinded: &ClBlindedSecret,
    messages: &[Fr],
) -> Result<ClSignature> {
    if messages.len() != sk.y.len() || messages.len() != pk.attributes.len() {
        return Err(AnoncredsError::Validation(format!(
            "expected {} attribute values, got {}",
            sk.y.len(),
            messages.len()
        )));
    }
    let mut rng = OsRng;
    let g = G1Projective::generator();

    let mut u = Fr::rand(&mut rng);
    while u.is_zero() {
        u = Fr::rand(&mut rng);
    }
    let exponent = messages
        .iter()
        .zip(sk.y.iter())
        .fold(sk.x, |acc, (m, y)| acc + *y * m);
    let base = g * exponent + blinded.commitment;

    Ok(ClSignature {
        sigma_1: g * u,
        sigma_2: base * u,
    })
}

/// Removes the holder's blinding factor from an issued signature.
pub fn unblind(signature: &ClSignature, factor: &ClBlindingFactor) -> ClSignature {
    ClSignature {
        sigma_1: signature.sigma_1,
        sigma_2: signature.sigma_2 - signature.sigma_1 * factor.blinding,
    }
}

/// Verifies an unblinded signature over `messages` and `link_secret`.
pub fn verify(
    pk: &ClPublicKey,
    signature: &ClSignature,
    link_secret: &Fr,
    messages: &[Fr],
) -> Result<()> {
    if messages.len() != pk.y_tilde.len() {
        return Err(AnoncredsError::SignatureVerification(format!(
            "expected {} attribute values, got {}",
            pk.y_tilde.len(),
            messages.len()
        )));
    }
    if signature.sigma_1.is_zero() {
        return Err(AnoncredsError::SignatureVerification("degenerate signature".into()));
    }
    let aggregate = messages
        .iter()
        .zip(pk.y_tilde.iter())
        .fold(pk.x_tilde + pk.y_link_tilde * link_secret, |acc, (m, y)| acc + *y * m);

    let lhs = Bn254::pairing(signature.sigma_1, aggregate);
    let rhs = Bn254::pairing(signature.sigma_2, G2Projective::generator());
    if lhs != rhs {
        return Err(AnoncredsError::SignatureVerification(
            "credential signature does not match the definition public key".into(),
        ));
    }
    Ok(())
}

fn blinding_challenge(
    commitment: &G1Projective,
    announcement: &G1Projective,
    context: &[&[u8]],
) -> Result<Fr> {
    let mut commitment_bytes = Vec::new();
    commitment.serialize_compressed(&mut commitment_bytes)?;
    let mut announcement_bytes = Vec::new();
    announcement.serialize_compressed(&mut announcement_bytes)?;

    let mut parts: Vec<&[u8]> = vec![
        BLINDING_DOMAIN,
        commitment_bytes.as_slice(),
        announcement_bytes.as_slice(),
    ];
    parts.extend_from_slice(context);
    Ok(hash_to_scalar(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Vec<String> {
        ["age", "sex", "height", "name"].iter().map(|s| s.to_string()).collect()
    }

    fn messages() -> Vec<Fr> {
        vec![Fr::from(28u64), Fr::from(1u64), Fr::from(175u64), Fr::from(99u64)]
    }

    const CONTEXT: [&[u8]; 3] = [b"def", b"nonce", b"holder"];

    #[test]
    fn test_blind_sign_unblind_verify() {
        let (pk, sk) = generate_keys(&attrs());
        check_public_key(&pk).unwrap();

        let secret = Fr::from(424242u64);
        let (blinded, factor) = blind_link_secret(&pk, &secret, &CONTEXT).unwrap();
        verify_blinded_secret(&pk, &blinded, &CONTEXT).unwrap();

        let sig = sign(&pk, &sk, &blinded, &messages()).unwrap();
        let unblinded = unblind(&sig, &factor);
        verify(&pk, &unblinded, &secret, &messages()).unwrap();
    }

    #[test]
    fn test_blinded_signature_does_not_verify_directly() {
        let (pk, sk) = generate_keys(&attrs());
        let secret = Fr::from(7u64);
        let (blinded, _) = blind_link_secret(&pk, &secret, &CONTEXT).unwrap();
        let sig = sign(&pk, &sk, &blinded, &messages()).unwrap();
        assert!(verify(&pk, &sig, &secret, &messages()).is_err());
    }

    #[test]
    fn test_wrong_secret_or_message_fails() {
        let (pk, sk) = generate_keys(&attrs());
        let secret = Fr::from(7u64);
        let (blinded, factor) = blind_link_secret(&pk, &secret, &CONTEXT).unwrap();
        let sig = unblind(&sign(&pk, &sk, &blinded, &messages()).unwrap(), &factor);

        assert!(verify(&pk, &sig, &Fr::from(8u64), &messages()).is_err());
        let mut tampered = messages();
        tampered[0] = Fr::from(29u64);
        assert!(verify(&pk, &sig, &secret, &tampered).is_err());
    }

    #[test]
    fn test_blinding_proof_is_bound_to_context() {
        let (pk, _) = generate_keys(&attrs());
        let (blinded, _) = blind_link_secret(&pk, &Fr::from(3u64), &CONTEXT).unwrap();
        let other: [&[u8]; 3] = [b"def", b"other-nonce", b"holder"];
        assert!(verify_blinded_secret(&pk, &blinded, &other).is_err());
    }

    #[test]
    fn test_inconsistent_public_key_is_rejected() {
        let (mut pk, _) = generate_keys(&attrs());
        pk.y_link = pk.y_link + G1Projective::generator();
        assert!(check_public_key(&pk).is_err());

        let (mut short, _) = generate_keys(&attrs());
        short.y_tilde.pop();
        assert!(matches!(check_public_key(&short), Err(AnoncredsError::Validation(_))));
    }

    #[test]
    fn test_public_key_serde_round_trip() {
        let (pk, _) = generate_keys(&attrs());
        let json = serde_json::to_string(&pk).unwrap();
        let back: ClPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }
}

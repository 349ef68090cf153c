// src/utils/crypto.rs
//! Hashing helpers shared by the signature scheme and the identity layer.
//!
//! SHA-256 comes from `ring`; transcripts are length-prefixed so that
//! adjacent parts cannot be shifted into one another.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ring::digest::{self, Context, SHA256};

/// Computes a SHA-256 hash of the input data.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest::digest(&SHA256, data).as_ref());
    out
}

/// Hashes a sequence of byte strings, each prefixed by its length.
///
/// Used as the Fiat-Shamir transcript for blinding proofs and as the
/// preimage for identifier derivation.
pub fn hash_transcript<'a, I>(parts: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut ctx = Context::new(&SHA256);
    for part in parts {
        ctx.update(&(part.len() as u64).to_be_bytes());
        ctx.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(ctx.finish().as_ref());
    out
}

/// Maps a transcript onto the BN254 scalar field.
pub fn hash_to_scalar<'a, I>(parts: I) -> Fr
where
    I: IntoIterator<Item = &'a [u8]>,
{
    Fr::from_be_bytes_mod_order(&hash_transcript(parts))
}

// src/utils/encoding.rs
//! Canonical attribute encoding.
//!
//! A credential signs integers, not strings. Each attribute therefore travels
//! as a `(raw, encoded)` pair and the issuer refuses any pair whose `encoded`
//! half is not the canonical encoding of its `raw` half:
//!
//! - raw values that parse as a 32-bit signed decimal integer encode to
//!   themselves, written in canonical decimal form;
//! - every other raw value encodes to the decimal form of the big-endian
//!   integer SHA-256(raw).

use ark_bn254::Fr;
use num_bigint::{BigInt, BigUint, Sign};

use crate::error::{AnoncredsError, Result};
use crate::utils::crypto::{hash_data, hash_to_scalar};

/// Returns the canonical encoded form of a raw attribute value.
pub fn encode_attribute(raw: &str) -> String {
    match raw.parse::<i32>() {
        Ok(number) => number.to_string(),
        Err(_) => BigUint::from_bytes_be(&hash_data(raw.as_bytes())).to_string(),
    }
}

/// Checks that `encoded` is exactly the canonical encoding of `raw`.
pub fn check_encoding(attribute: &str, raw: &str, encoded: &str) -> Result<()> {
    let expected = encode_attribute(raw);
    if expected == encoded {
        Ok(())
    } else {
        Err(AnoncredsError::AttributeEncodingMismatch {
            attribute: attribute.to_string(),
            detail: format!("raw {:?} encodes to {}, got {}", raw, expected, encoded),
        })
    }
}

/// Parses a decimal encoded value into the scalar field.
///
/// Only the canonical decimal form is accepted. Values in the 32-bit range
/// embed as integers; wider values (hash digests, at most 256 bits) are
/// hashed into the field rather than reduced, so no two canonical encodings
/// share a scalar.
pub fn encoded_to_scalar(attribute: &str, encoded: &str) -> Result<Fr> {
    let mismatch = |detail: String| AnoncredsError::AttributeEncodingMismatch {
        attribute: attribute.to_string(),
        detail,
    };
    let value = BigInt::parse_bytes(encoded.as_bytes(), 10)
        .ok_or_else(|| mismatch(format!("{:?} is not a decimal integer", encoded)))?;
    if value.to_string() != encoded {
        return Err(mismatch(format!("{:?} is not in canonical decimal form", encoded)));
    }

    if let Ok(number) = i32::try_from(&value) {
        let scalar = Fr::from(number.unsigned_abs() as u64);
        return Ok(if number < 0 { -scalar } else { scalar });
    }
    if value.sign() == Sign::Minus || value.bits() > 256 {
        return Err(mismatch(format!("{} is outside the encodable range", encoded)));
    }
    Ok(hash_to_scalar([WIDE_VALUE_DOMAIN, encoded.as_bytes()]))
}

const WIDE_VALUE_DOMAIN: &[u8] = b"anoncreds/encoded-value";

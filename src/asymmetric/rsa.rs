//! Reconstruction of the issuer's RSA public key.
//!
//! The key arrives as two base64 strings. The modulus is a plain big-endian
//! integer. The exponent may carry one leading type byte (`0x03`) that is not
//! part of the number and has to be dropped before use.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::contract::PublicKeyMaterial;
use crate::error::{Error, Result};

/// Largest public exponent accepted (`2^31 - 1`).
pub const MAX_EXPONENT: u64 = (1 << 31) - 1;

/// Largest modulus accepted, in bits. The `rsa` crate alone stops at 4096.
pub const MAX_MODULUS_BITS: usize = 16384;

/// Type byte the key service puts in front of the exponent.
const EXPONENT_TYPE_PREFIX: u8 = 0x03;

/// Builds an [`RsaPublicKey`] from the issuer's wire encoding.
///
/// Moduli up to [`MAX_MODULUS_BITS`] are accepted.
pub fn build_rsa_public_key(material: &PublicKeyMaterial) -> Result<RsaPublicKey> {
    let modulus = decode_component(&material.modulus_base64, "modulus")?;
    let exponent_bytes = decode_component(&material.public_exponent_base64, "public exponent")?;
    let exponent = parse_exponent(strip_exponent_prefix(&exponent_bytes))?;

    RsaPublicKey::new_with_max_size(
        BigUint::from_bytes_be(&modulus),
        BigUint::from(exponent),
        MAX_MODULUS_BITS,
    )
        .map_err(|e| Error::InvalidKey(format!("rejected RSA key components: {e}")))
}

/// Drops the single `0x03` type byte when the exponent carries one.
///
/// Only that one byte is removed and only when something follows it; a lone
/// `0x03` is the exponent 3.
pub fn strip_exponent_prefix(bytes: &[u8]) -> &[u8] {
    match bytes {
        [EXPONENT_TYPE_PREFIX, rest @ ..] if !rest.is_empty() => rest,
        _ => bytes,
    }
}

fn decode_component(encoded: &str, field: &'static str) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|source| Error::InvalidBase64 { field, source })?;
    if bytes.is_empty() {
        return Err(Error::InvalidKey(format!("{field} is empty")));
    }
    Ok(bytes)
}

fn parse_exponent(bytes: &[u8]) -> Result<u64> {
    let first_significant = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[first_significant..];
    if significant.len() > 8 {
        return Err(Error::InvalidKey(
            "public exponent too large to fit in int64".to_string(),
        ));
    }

    let value = significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    if value > i64::MAX as u64 {
        return Err(Error::InvalidKey(
            "public exponent too large to fit in int64".to_string(),
        ));
    }
    if value > MAX_EXPONENT {
        return Err(Error::InvalidKey(format!(
            "public exponent {value} exceeds limit ({MAX_EXPONENT})"
        )));
    }
    if value == 0 {
        return Err(Error::InvalidKey(
            "public exponent must be positive".to_string(),
        ));
    }
    Ok(value)
}

/// OAEP capacity of `key` when `D` is both the label hash and the MGF hash.
///
/// `k - 2 * hLen - 2`, where `k` is the modulus length in bytes.
pub fn oaep_capacity<D: Digest>(key: &RsaPublicKey) -> Result<usize> {
    let key_size = key.size();
    let overhead = 2 * <D as Digest>::output_size() + 2;
    match key_size.checked_sub(overhead) {
        Some(max) if max > 0 => Ok(max),
        _ => Err(Error::KeyTooSmall { key_size }),
    }
}

/// Largest plaintext [`crate::sealer::seal`] accepts for this key.
pub fn max_plaintext_size(material: &PublicKeyMaterial) -> Result<usize> {
    let key = build_rsa_public_key(material)?;
    oaep_capacity::<Sha256>(&key)
}

impl PublicKeyMaterial {
    /// Shorthand for [`build_rsa_public_key`].
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey> {
        build_rsa_public_key(self)
    }
}

//! The seal transform: RSA-OAEP(SHA-256) over the plaintext, framed as a
//! `string:///` sealed secret.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::rand_core::OsRng;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::asymmetric::rsa::{build_rsa_public_key, oaep_capacity};
use crate::contract::{PolicyDocument, PublicKeyMaterial, SealedSecret};
use crate::error::{Error, Result};

/// Encrypts `plaintext` for the holder of `key`, bound to `policy`.
///
/// Returns `string:///<base64 of JSON>`. Output is randomized: sealing the
/// same input twice yields different strings.
pub fn seal(plaintext: &[u8], key: &PublicKeyMaterial, policy: &PolicyDocument) -> Result<String> {
    PolicySealer::new(key, policy)?.seal(plaintext)
}

/// Like [`seal`], but takes the plaintext base64 encoded.
pub fn seal_base64(
    plaintext_base64: &str,
    key: &PublicKeyMaterial,
    policy: &PolicyDocument,
) -> Result<String> {
    let plaintext = decode_plaintext(plaintext_base64)?;
    seal(&plaintext, key, policy)
}

pub(crate) fn decode_plaintext(plaintext_base64: &str) -> Result<Zeroizing<Vec<u8>>> {
    STANDARD
        .decode(plaintext_base64)
        .map(Zeroizing::new)
        .map_err(|source| Error::InvalidBase64 {
            field: "plaintext",
            source,
        })
}

/// A reconstructed key bound to one policy, reusable across many seals.
#[derive(Debug, Clone)]
pub struct PolicySealer {
    key: RsaPublicKey,
    capacity: usize,
    key_version: u32,
    tenant: String,
    policy_id: String,
}

impl PolicySealer {
    /// Rebuilds the RSA key and checks the policy carries an identifier.
    pub fn new(key: &PublicKeyMaterial, policy: &PolicyDocument) -> Result<Self> {
        if policy.policy_id.is_empty() {
            return Err(Error::EmptyParameter { name: "policy_id" });
        }
        let rsa_key = build_rsa_public_key(key)?;
        let capacity = oaep_capacity::<Sha256>(&rsa_key)?;

        Ok(Self {
            key: rsa_key,
            capacity,
            key_version: key.key_version,
            tenant: key.tenant.clone(),
            policy_id: policy.policy_id.clone(),
        })
    }

    /// Maximum plaintext length in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Seals `plaintext` and returns the framed string.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let sealed = self.seal_to_struct(plaintext)?;
        let wire = sealed.to_wire()?;
        tracing::info!(
            key_version = self.key_version,
            policy_id = %self.policy_id,
            tenant = %self.tenant,
            plaintext_len = plaintext.len(),
            "sealed secret"
        );
        Ok(wire)
    }

    /// Seals `plaintext` without the wire framing.
    pub fn seal_to_struct(&self, plaintext: &[u8]) -> Result<SealedSecret> {
        if plaintext.is_empty() {
            return Err(Error::EmptyPlaintext);
        }
        if plaintext.len() > self.capacity {
            return Err(Error::PlaintextTooLarge {
                len: plaintext.len(),
                max: self.capacity,
            });
        }

        let ciphertext = self
            .key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(Error::Encryption)?;

        Ok(SealedSecret {
            key_version: self.key_version,
            policy_id: self.policy_id.clone(),
            tenant: self.tenant.clone(),
            data: STANDARD.encode(ciphertext),
        })
    }
}

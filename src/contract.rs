//! Defines the data structures exchanged with the secret management API and
//! the sealed-secret wire format handed back to callers.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scheme marker in front of every sealed secret.
pub const SEALED_PREFIX: &str = "string:///";

/// The RSA public key issued by the secret management API.
///
/// Fields are kept in their wire encoding; [`crate::asymmetric::rsa`] turns
/// them into a usable key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PublicKeyMaterial {
    /// Version of the key, used by the decrypting side to pick the private key.
    pub key_version: u32,
    /// Big-endian RSA modulus, base64 encoded.
    pub modulus_base64: String,
    /// RSA public exponent, base64 encoded, possibly carrying a vendor prefix byte.
    pub public_exponent_base64: String,
    /// Tenant that owns the key.
    pub tenant: String,
}

/// A secret policy naming which clients may later ask for decryption.
///
/// Only `policy_id` takes part in sealing; the rules are evaluated server side.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyDocument {
    pub name: String,
    pub namespace: String,
    pub tenant: String,
    pub policy_id: String,
    pub policy_info: PolicyInfo,
}

/// Algorithm tag plus the ordered access rules of a policy.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyInfo {
    /// e.g. "RSA-OAEP"
    pub algo: String,
    pub rules: Vec<PolicyRule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyAction {
    Allow,
    Deny,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single access rule. All matchers are optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyRule {
    pub action: PolicyAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name_matcher: Option<Matcher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_selector: Option<LabelSelector>,
}

/// String matching on client names.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Matcher {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exact_values: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regex_values: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<String>,
}

/// Kubernetes-style label selection on clients.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LabelSelector {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<String>,
}

/// The `{"data": ...}` wrapper some API responses come in.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

/// The result of a seal operation, before wire framing.
///
/// Serializes to exactly four snake_case fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SealedSecret {
    pub key_version: u32,
    pub policy_id: String,
    pub tenant: String,
    /// RSA-OAEP ciphertext, base64 encoded.
    pub data: String,
}

impl SealedSecret {
    /// Frames the secret as `string:///<base64 of JSON>`.
    pub fn to_wire(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("{SEALED_PREFIX}{}", STANDARD.encode(json)))
    }

    /// Parses a `string:///` framed secret back into its fields.
    pub fn parse(sealed: &str) -> Result<Self> {
        let encoded = sealed.strip_prefix(SEALED_PREFIX).ok_or_else(|| {
            Error::malformed("sealed secret", format!("missing {SEALED_PREFIX} prefix"), "")
        })?;
        let json = STANDARD
            .decode(encoded)
            .map_err(|source| Error::InvalidBase64 {
                field: "sealed secret",
                source,
            })?;
        serde_json::from_slice(&json)
            .map_err(|e| Error::malformed("sealed secret", e.to_string(), ""))
    }
}

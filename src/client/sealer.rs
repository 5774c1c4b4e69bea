//! Provides a high-level client-side sealer: fetch the key and policy, check
//! the size, seal.

use std::path::Path;

use zeroize::Zeroizing;

use crate::client::cancel::Cancellation;
use crate::client::provider::RemoteKeyProvider;
use crate::error::{Error, Result};
use crate::sealer::{PolicySealer, decode_plaintext};

/// A client-side sealer that fetches a fresh public key and policy for every
/// call and seals locally. The plaintext never leaves the process.
#[derive(Debug, Clone)]
pub struct SecretSealer {
    provider: RemoteKeyProvider,
    key_version: Option<u32>,
}

impl SecretSealer {
    /// Creates a new `SecretSealer` that seals under the latest key version.
    pub fn new(provider: RemoteKeyProvider) -> Self {
        Self {
            provider,
            key_version: None,
        }
    }

    /// Pins a specific public key version.
    pub fn with_key_version(mut self, version: u32) -> Self {
        self.key_version = Some(version);
        self
    }

    /// Seals base64-encoded plaintext under the named policy.
    ///
    /// # Arguments
    ///
    /// * `plaintext_base64`: The secret, base64 encoded.
    /// * `policy_name`: Secret policy controlling who may decrypt.
    /// * `namespace`: Namespace holding the policy.
    pub async fn seal_base64(
        &self,
        cancel: &Cancellation,
        plaintext_base64: &str,
        policy_name: &str,
        namespace: &str,
    ) -> Result<String> {
        if plaintext_base64.is_empty() {
            return Err(Error::EmptyParameter { name: "plaintext" });
        }
        validate_policy_arguments(policy_name, namespace)?;
        let plaintext = decode_plaintext(plaintext_base64)?;
        self.seal_validated(cancel, &plaintext, policy_name, namespace)
            .await
    }

    /// Seals raw bytes under the named policy.
    pub async fn seal_bytes(
        &self,
        cancel: &Cancellation,
        plaintext: &[u8],
        policy_name: &str,
        namespace: &str,
    ) -> Result<String> {
        if plaintext.is_empty() {
            return Err(Error::EmptyPlaintext);
        }
        validate_policy_arguments(policy_name, namespace)?;
        self.seal_validated(cancel, plaintext, policy_name, namespace)
            .await
    }

    /// Seals the contents of a regular, non-empty file.
    pub async fn seal_file(
        &self,
        cancel: &Cancellation,
        path: impl AsRef<Path>,
        policy_name: &str,
        namespace: &str,
    ) -> Result<String> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::EmptyParameter { name: "path" });
        }
        validate_policy_arguments(policy_name, namespace)?;

        let plaintext = read_plaintext_file(path).await?;
        self.seal_validated(cancel, &plaintext, policy_name, namespace)
            .await
    }

    async fn seal_validated(
        &self,
        cancel: &Cancellation,
        plaintext: &[u8],
        policy_name: &str,
        namespace: &str,
    ) -> Result<String> {
        let key = self.provider.public_key(cancel, self.key_version).await?;
        let policy = self.provider.policy(cancel, namespace, policy_name).await?;

        PolicySealer::new(&key, &policy)?.seal(plaintext)
    }
}

fn validate_policy_arguments(policy_name: &str, namespace: &str) -> Result<()> {
    if policy_name.is_empty() {
        return Err(Error::EmptyParameter {
            name: "policy_name",
        });
    }
    if namespace.is_empty() {
        return Err(Error::EmptyParameter { name: "namespace" });
    }
    Ok(())
}

async fn read_plaintext_file(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let file_error = |reason: String| Error::PlaintextFile {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => file_error("file not found".to_string()),
        std::io::ErrorKind::PermissionDenied => file_error("permission denied reading file".to_string()),
        _ => file_error(format!("error accessing file ({e})")),
    })?;
    if !metadata.is_file() {
        return Err(file_error("path is not a regular file".to_string()));
    }

    let contents = tokio::fs::read(path)
        .await
        .map(Zeroizing::new)
        .map_err(|e| file_error(format!("failed to read file ({e})")))?;
    if contents.is_empty() {
        return Err(file_error("file is empty".to_string()));
    }
    Ok(contents)
}

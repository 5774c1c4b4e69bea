//! Fetches the sealing public key and secret policy documents from the
//! secret management API.
//!
//! 从远端 API 获取公钥与访问策略文档。

use serde::de::DeserializeOwned;

use crate::auth::{AuthenticatedTransport, validate_base_url};
use crate::client::cancel::Cancellation;
use crate::client::retry::{FetchedResponse, RetryPolicy, RetryingFetcher};
use crate::contract::{ApiEnvelope, PolicyDocument, PublicKeyMaterial};
use crate::error::{Error, Result};

/// Path of the public key endpoint, relative to the API base URL.
pub const PUBLIC_KEY_PATH: &str = "/secret_management/get_public_key";

/// Path of the policy document endpoint for a namespace and policy name.
/// Both segments are percent-encoded.
pub fn policy_document_path(namespace: &str, name: &str) -> String {
    format!(
        "/secret_management/namespaces/{}/secret_policys/{}/get_policy_document",
        urlencoding::encode(namespace),
        urlencoding::encode(name),
    )
}

/// A key provider that retrieves the public key and policy documents from
/// the remote API.
///
/// Nothing is cached; every call goes to the server.
///
/// 远端密钥提供者，每次调用都会访问服务器，不做缓存。
#[derive(Debug, Clone)]
pub struct RemoteKeyProvider {
    fetcher: RetryingFetcher,
}

impl RemoteKeyProvider {
    /// Uses the transport's base URL and the default [`RetryPolicy`].
    pub fn new(transport: AuthenticatedTransport) -> Self {
        Self::with_retry_policy(transport, RetryPolicy::default())
    }

    pub fn with_retry_policy(transport: AuthenticatedTransport, policy: RetryPolicy) -> Self {
        Self {
            fetcher: RetryingFetcher::new(transport, policy),
        }
    }

    pub fn base_url(&self) -> &str {
        self.fetcher.transport().base_url()
    }

    /// Fetches the public key; `None` or `Some(0)` means the latest version.
    pub async fn public_key(
        &self,
        cancel: &Cancellation,
        version: Option<u32>,
    ) -> Result<PublicKeyMaterial> {
        get_public_key(&self.fetcher, cancel, self.base_url(), version).await
    }

    /// Fetches the policy document `name` in `namespace`.
    pub async fn policy(
        &self,
        cancel: &Cancellation,
        namespace: &str,
        name: &str,
    ) -> Result<PolicyDocument> {
        get_policy_document(&self.fetcher, cancel, self.base_url(), namespace, name).await
    }
}

/// Fetches the public key from `base_url` with the default retry policy.
pub async fn fetch_public_key(
    cancel: &Cancellation,
    transport: &AuthenticatedTransport,
    base_url: &str,
    version: Option<u32>,
) -> Result<PublicKeyMaterial> {
    let fetcher = RetryingFetcher::new(transport.clone(), RetryPolicy::default());
    get_public_key(&fetcher, cancel, base_url, version).await
}

/// Fetches a policy document from `base_url` with the default retry policy.
pub async fn fetch_policy(
    cancel: &Cancellation,
    transport: &AuthenticatedTransport,
    base_url: &str,
    namespace: &str,
    name: &str,
) -> Result<PolicyDocument> {
    let fetcher = RetryingFetcher::new(transport.clone(), RetryPolicy::default());
    get_policy_document(&fetcher, cancel, base_url, namespace, name).await
}

async fn get_public_key(
    fetcher: &RetryingFetcher,
    cancel: &Cancellation,
    base_url: &str,
    version: Option<u32>,
) -> Result<PublicKeyMaterial> {
    validate_base_url(base_url)?;

    let mut url = format!("{}{PUBLIC_KEY_PATH}", base_url.trim_end_matches('/'));
    if let Some(version) = version.filter(|v| *v > 0) {
        url.push_str(&format!("?key_version={version}"));
    }

    let FetchedResponse { status, body } = fetcher.get(cancel, &url).await?;
    if !status.is_success() {
        return Err(Error::unexpected_status(&url, status, &body));
    }

    let key: PublicKeyMaterial = decode_enveloped(&url, &body)?;
    if key.modulus_base64.is_empty() {
        return Err(Error::missing_field("modulus", &body));
    }
    if key.public_exponent_base64.is_empty() {
        return Err(Error::missing_field("public exponent", &body));
    }

    tracing::debug!(key_version = key.key_version, tenant = %key.tenant, "fetched public key");
    Ok(key)
}

async fn get_policy_document(
    fetcher: &RetryingFetcher,
    cancel: &Cancellation,
    base_url: &str,
    namespace: &str,
    name: &str,
) -> Result<PolicyDocument> {
    validate_base_url(base_url)?;
    if namespace.is_empty() {
        return Err(Error::EmptyParameter { name: "namespace" });
    }
    if name.is_empty() {
        return Err(Error::EmptyParameter {
            name: "policy name",
        });
    }

    let url = format!(
        "{}{}",
        base_url.trim_end_matches('/'),
        policy_document_path(namespace, name)
    );

    let FetchedResponse { status, body } = fetcher.get(cancel, &url).await?;
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::PolicyNotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
    }
    if !status.is_success() {
        return Err(Error::unexpected_status(&url, status, &body));
    }

    let mut policy: PolicyDocument = decode_enveloped(&url, &body)?;
    if policy.policy_id.is_empty() {
        return Err(Error::missing_field("policy_id", &body));
    }
    if policy.name.is_empty() {
        policy.name = name.to_string();
    }
    if policy.namespace.is_empty() {
        policy.namespace = namespace.to_string();
    }

    tracing::debug!(policy_id = %policy.policy_id, namespace, name, "fetched policy document");
    Ok(policy)
}

/// Decodes `{"data": T}` first and a bare `T` second.
fn decode_enveloped<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T> {
    match serde_json::from_str::<ApiEnvelope<T>>(body) {
        Ok(envelope) => Ok(envelope.data),
        Err(envelope_err) => serde_json::from_str::<T>(body).map_err(|bare_err| {
            Error::malformed(endpoint, format!("{bare_err} (envelope: {envelope_err})"), body)
        }),
    }
}

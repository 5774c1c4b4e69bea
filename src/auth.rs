//! Authentication configuration and the authenticated HTTP transport.
//!
//! An [`AuthConfig`] names at most two credentials. The API token wins when
//! both are present; the PKCS#12 client certificate is only used without one.

#[cfg(feature = "client-cert")]
pub mod pkcs12;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

pub const ENV_API_URL: &str = "F5XC_API_URL";
pub const ENV_API_TOKEN: &str = "F5XC_API_TOKEN";
pub const ENV_P12_FILE: &str = "F5XC_P12_FILE";
pub const ENV_P12_PASSWORD: &str = "F5XC_P12_PASSWORD";

/// Used when no API URL is configured.
pub const DEFAULT_API_URL: &str = "https://console.ves.volterra.io/api";

/// Per-request timeout of the transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials and endpoint for the secret management API.
#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default, deserialize_with = "optional_secret")]
    pub api_token: Option<SecretString>,
    #[serde(default)]
    pub p12_file: Option<PathBuf>,
    #[serde(default, deserialize_with = "optional_secret")]
    pub p12_password: Option<SecretString>,
}

fn optional_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()).map(SecretString::from))
}

/// Which credential a transport authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    None,
    Token,
    ClientCertificate,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::None => f.write_str("None"),
            AuthMethod::Token => f.write_str("API Token"),
            AuthMethod::ClientCertificate => f.write_str("P12 Certificate"),
        }
    }
}

impl AuthConfig {
    /// Token-only configuration.
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: Some(SecretString::from(token.into())),
            ..Default::default()
        }
    }

    /// Client-certificate configuration.
    pub fn with_p12(
        base_url: impl Into<String>,
        p12_file: impl Into<PathBuf>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            p12_file: Some(p12_file.into()),
            p12_password: Some(SecretString::from(password.into())),
            ..Default::default()
        }
    }

    /// Reads the `F5XC_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let config = Self {
            base_url: get(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_token: get(ENV_API_TOKEN).map(SecretString::from),
            p12_file: get(ENV_P12_FILE).map(PathBuf::from),
            p12_password: get(ENV_P12_PASSWORD).map(SecretString::from),
        };

        if config.method() == AuthMethod::None {
            return Err(Error::MissingAuthMethod);
        }
        Ok(config)
    }

    /// The method a transport built from this configuration would use.
    pub fn method(&self) -> AuthMethod {
        if self.token().is_some() {
            AuthMethod::Token
        } else if self.certificate_path().is_some() {
            AuthMethod::ClientCertificate
        } else {
            AuthMethod::None
        }
    }

    fn token(&self) -> Option<&str> {
        self.api_token
            .as_ref()
            .map(|t| t.expose_secret())
            .filter(|t| !t.is_empty())
    }

    fn certificate_path(&self) -> Option<&Path> {
        self.p12_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn certificate_password(&self) -> &str {
        self.p12_password
            .as_ref()
            .map(|p| p.expose_secret())
            .unwrap_or("")
    }
}

/// Rejects base URLs that cannot carry a request: empty, relative, or not
/// `http`/`https`.
pub fn validate_base_url(base_url: &str) -> Result<()> {
    if base_url.is_empty() {
        return Err(Error::MissingBaseUrl);
    }
    let invalid = |reason: String| Error::InvalidBaseUrl {
        base_url: base_url.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// Checks a configuration without building a transport or touching the network.
pub fn validate_config(config: Option<&AuthConfig>) -> Result<()> {
    let config = config.ok_or(Error::MissingConfig)?;

    validate_base_url(&config.base_url)?;
    if config.method() == AuthMethod::None {
        return Err(Error::MissingAuthMethod);
    }
    if let Some(path) = config.certificate_path() {
        if !path.exists() {
            return Err(Error::CertificateNotFound {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// An HTTP client carrying the configured credential.
///
/// Immutable once built and cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct AuthenticatedTransport {
    client: reqwest::Client,
    method: AuthMethod,
    base_url: String,
    token: Option<Arc<SecretString>>,
}

impl fmt::Debug for AuthenticatedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedTransport")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AuthenticatedTransport {
    /// Builds a transport with [`DEFAULT_TIMEOUT`].
    pub fn new(config: &AuthConfig) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    /// Builds a transport with a custom per-request timeout.
    pub fn with_timeout(config: &AuthConfig, timeout: Duration) -> Result<Self> {
        validate_base_url(&config.base_url)?;

        let builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .min_tls_version(reqwest::tls::Version::TLS_1_2);

        let transport = match config.method() {
            AuthMethod::Token => {
                let token = config.token().unwrap_or_default();
                let mut headers = HeaderMap::new();
                let mut value = HeaderValue::from_str(&format!("APIToken {token}"))
                    .map_err(|_| Error::InvalidToken)?;
                value.set_sensitive(true);
                headers.insert(header::AUTHORIZATION, value);

                let client = builder
                    .default_headers(headers)
                    .build()
                    .map_err(Error::HttpClient)?;
                Self {
                    client,
                    method: AuthMethod::Token,
                    base_url: config.base_url.clone(),
                    token: Some(Arc::new(SecretString::from(token.to_string()))),
                }
            }
            AuthMethod::ClientCertificate => {
                let path = config.certificate_path().unwrap_or(Path::new(""));
                let client = client_certificate_builder(builder, path, config.certificate_password())?
                    .build()
                    .map_err(Error::HttpClient)?;
                Self {
                    client,
                    method: AuthMethod::ClientCertificate,
                    base_url: config.base_url.clone(),
                    token: None,
                }
            }
            AuthMethod::None => return Err(Error::MissingAuthMethod),
        };

        tracing::debug!(
            method = %transport.method,
            base_url = %transport.base_url,
            "built authenticated transport"
        );
        Ok(transport)
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The API token, for token transports.
    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_deref()
    }

    /// A GET request with `Accept: application/json`. The credential header,
    /// if any, is added by the client itself.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(header::ACCEPT, "application/json")
    }
}

#[cfg(feature = "client-cert")]
fn client_certificate_builder(
    builder: reqwest::ClientBuilder,
    path: &Path,
    password: &str,
) -> Result<reqwest::ClientBuilder> {
    let identity = pkcs12::load_client_identity(path, password)?;
    let mut builder = builder
        .tls_built_in_root_certs(true)
        .identity(identity.identity);
    for ca in identity.ca_certificates {
        builder = builder.add_root_certificate(ca);
    }
    Ok(builder)
}

#[cfg(not(feature = "client-cert"))]
fn client_certificate_builder(
    _builder: reqwest::ClientBuilder,
    _path: &Path,
    _password: &str,
) -> Result<reqwest::ClientBuilder> {
    Err(Error::Pkcs12(
        "client certificate support is not enabled (feature `client-cert`)".to_string(),
    ))
}

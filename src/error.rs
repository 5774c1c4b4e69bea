//! Defines the custom error type for the `blindfold-seal` crate.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Upper bound on how much of a response body is echoed back in an error.
pub const MAX_ERROR_BODY: usize = 512;

/// The main error type for the `blindfold-seal` crate.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration ---
    #[error("no authentication method configured: set an API token or a P12 certificate file")]
    MissingAuthMethod,

    #[error("configuration is missing")]
    MissingConfig,

    #[error("base URL is required")]
    MissingBaseUrl,

    #[error("invalid base URL {base_url:?}: {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("P12 file does not exist: {}", path.display())]
    CertificateNotFound { path: PathBuf },

    #[error("failed to read P12 file {}: {source}", path.display())]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode P12 file: {0}")]
    Pkcs12(String),

    #[error("P12 file missing required {missing}")]
    IncompleteIdentity { missing: &'static str },

    #[error("API token contains characters that are not valid in an HTTP header")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    // --- Transport ---
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} was cancelled")]
    Cancelled { endpoint: String },

    // --- Remote protocol ---
    #[error("unexpected status {} from {endpoint}: {body}", status.as_u16())]
    UnexpectedStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("secret policy {name:?} not found in namespace {namespace:?}")]
    PolicyNotFound { name: String, namespace: String },

    #[error("failed to parse response from {endpoint}: {detail}; body: {body}")]
    MalformedResponse {
        endpoint: String,
        detail: String,
        body: String,
    },

    #[error("response missing {field}; body: {body}")]
    MissingField { field: &'static str, body: String },

    // --- Cryptographic ---
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("plaintext too large ({len} bytes); maximum size for this key is {max} bytes")]
    PlaintextTooLarge { len: usize, max: usize },

    #[error("key too small for RSA-OAEP with SHA-256 ({key_size} byte modulus)")]
    KeyTooSmall { key_size: usize },

    #[error("RSA-OAEP encryption failed: {0}")]
    Encryption(#[source] rsa::Error),

    // --- Input validation ---
    #[error("{name} cannot be empty")]
    EmptyParameter { name: &'static str },

    #[error("plaintext cannot be empty")]
    EmptyPlaintext,

    #[error("failed to decode base64 {field}: {source}")]
    InvalidBase64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{reason}: {}", path.display())]
    PlaintextFile { path: PathBuf, reason: String },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Whether the retrying fetcher may try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            // builder errors come from bad configuration
            Error::Transport { source, .. } => !source.is_builder(),
            Error::UnexpectedStatus { status, .. } => crate::client::retry::is_retryable_status(*status),
            _ => false,
        }
    }

    pub(crate) fn unexpected_status(endpoint: &str, status: StatusCode, body: &str) -> Self {
        Error::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status,
            body: truncate_body(body),
        }
    }

    pub(crate) fn missing_field(field: &'static str, body: &str) -> Self {
        Error::MissingField {
            field,
            body: truncate_body(body),
        }
    }

    pub(crate) fn malformed(endpoint: &str, detail: String, body: &str) -> Self {
        Error::MalformedResponse {
            endpoint: endpoint.to_string(),
            detail,
            body: truncate_body(body),
        }
    }
}

/// Cuts a response body down to [`MAX_ERROR_BODY`] bytes on a char boundary.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &body[..end])
}

pub type Result<T> = std::result::Result<T, Error>;

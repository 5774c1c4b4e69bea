//!
//! 集成测试的通用辅助函数
//!
//! A scripted stand-in for the secret management API, served by axum on a
//! loopback port, plus key fixtures.
//!
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use blindfold_seal::auth::{AuthConfig, AuthenticatedTransport};
use blindfold_seal::client::RetryPolicy;
use blindfold_seal::contract::PublicKeyMaterial;
use rsa::RsaPrivateKey;
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;

pub const TEST_TOKEN: &str = "test-token";
pub const PUBLIC_KEY_PATH: &str = "/api/secret_management/get_public_key";

pub fn policy_path(namespace: &str, name: &str) -> String {
    format!("/api/secret_management/namespaces/{namespace}/secret_policys/{name}/get_policy_document")
}

/// One request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, VecDeque<(u16, String)>>,
    delays: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
}

/// Replies are queued per path; the last queued reply repeats forever.
#[derive(Clone, Default)]
pub struct MockApi {
    script: Arc<Mutex<Script>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, path: &str, status: u16, body: impl Into<String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .entry(path.to_string())
            .or_default()
            .push_back((status, body.into()));
        self
    }

    /// Holds every reply on `path` back for `delay`.
    pub fn delay(&self, path: &str, delay: Duration) -> &Self {
        self.script
            .lock()
            .unwrap()
            .delays
            .insert(path.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    /// Serves on an ephemeral port and returns the API base URL.
    pub async fn start(&self) -> String {
        let router = Router::new().fallback(handle).with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api")
    }
}

async fn handle(State(api): State<MockApi>, uri: Uri, headers: HeaderMap) -> (StatusCode, String) {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let (reply, delay) = {
        let mut script = api.script.lock().unwrap();
        script.requests.push(RecordedRequest {
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            authorization: header_value(header::AUTHORIZATION),
            accept: header_value(header::ACCEPT),
        });

        let reply = match script.replies.get_mut(uri.path()) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        (reply, script.delays.get(uri.path()).copied())
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    match reply {
        Some((status, body)) => (StatusCode::from_u16(status).unwrap(), body),
        None => (StatusCode::NOT_FOUND, "no such route".to_string()),
    }
}

pub fn token_transport(base_url: &str) -> AuthenticatedTransport {
    AuthenticatedTransport::new(&AuthConfig::with_token(base_url, TEST_TOKEN)).unwrap()
}

/// Millisecond backoff so retry tests stay fast.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Generates a 2048-bit key pair and its wire encoding, with the exponent
/// carrying the 0x03 type prefix the API adds.
pub fn generate_key_material(key_version: u32) -> (RsaPrivateKey, PublicKeyMaterial) {
    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let mut exponent = vec![0x03];
    exponent.extend_from_slice(&private_key.e().to_bytes_be());
    let material = PublicKeyMaterial {
        key_version,
        modulus_base64: STANDARD.encode(private_key.n().to_bytes_be()),
        public_exponent_base64: STANDARD.encode(exponent),
        tenant: "acme-tenant".to_string(),
    };
    (private_key, material)
}

pub fn enveloped(value: &serde_json::Value) -> String {
    serde_json::json!({ "data": value }).to_string()
}

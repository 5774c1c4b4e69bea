//! # Blindfold-Seal: client-side secret sealing
//!
//! `blindfold-seal` encrypts a secret locally under an RSA public key issued by
//! a remote secret management API, binding it to a named access policy. The
//! plaintext never leaves the process; only the decrypting service, holding
//! the private key, can recover it once the policy allows.
//!
//! ## Core Concepts
//!
//! - **`AuthConfig` / `AuthenticatedTransport`**: API token or PKCS#12 client
//!   certificate authentication.
//! - **`RetryingFetcher`**: GET with exponential backoff on 429/502/503/504
//!   and external cancellation.
//! - **`RemoteKeyProvider`**: fetches the public key and policy documents.
//! - **`PolicySealer`** / [`seal`]: RSA-OAEP(SHA-256) sealing into the
//!   `string:///` wire format.
//! - **`SecretSealer`**: all of the above, end to end.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use blindfold_seal::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AuthConfig::from_env()?;
//!     let transport = AuthenticatedTransport::new(&config)?;
//!     let sealer = SecretSealer::new(RemoteKeyProvider::new(transport));
//!
//!     let sealed = sealer
//!         .seal_bytes(&Cancellation::none(), b"db-password", "my-policy", "shared")
//!         .await?;
//!     assert!(sealed.starts_with("string:///"));
//!     Ok(())
//! }
//! ```

pub mod asymmetric;
pub mod auth;
pub mod client;
pub mod contract;
pub mod error;
pub mod sealer;

pub use error::{Error, Result};
pub use sealer::{PolicySealer, seal, seal_base64};

// --- Prelude ---
// The types needed for a typical seal call.
pub mod prelude {
    pub use crate::auth::{AuthConfig, AuthMethod, AuthenticatedTransport};
    pub use crate::client::{
        CancelHandle, Cancellation, RemoteKeyProvider, RetryPolicy, SecretSealer,
    };
    pub use crate::contract::{PolicyDocument, PublicKeyMaterial, SealedSecret};
    pub use crate::error::{Error, Result};
    pub use crate::sealer::{PolicySealer, seal, seal_base64};
}

/// The version of the `blindfold-seal` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

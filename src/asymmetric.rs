//! 非对称密钥处理
//!
//! Rebuilds the issuer's RSA public key from its wire encoding and answers
//! capacity questions for OAEP padding.
pub mod rsa;

pub use self::rsa::{MAX_EXPONENT, MAX_MODULUS_BITS, build_rsa_public_key, max_plaintext_size, oaep_capacity};

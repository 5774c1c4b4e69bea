//! PKCS#12 client identities.
//!
//! An archive is split into the client certificate with its private key (the
//! TLS identity) and any CA certificates (extra trust roots).

use std::path::Path;

use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// The DER contents of a PKCS#12 archive, sorted by role.
pub struct Pkcs12Contents {
    /// The first non-CA certificate.
    pub leaf_certificate: Vec<u8>,
    /// Further non-CA certificates, sent after the leaf.
    pub chain: Vec<Vec<u8>>,
    /// PKCS#8 private key of the leaf.
    pub private_key: Zeroizing<Vec<u8>>,
    pub ca_certificates: Vec<Vec<u8>>,
}

impl Pkcs12Contents {
    /// PEM bundle of key, leaf and chain, as `reqwest::Identity::from_pem` expects.
    fn identity_pem(&self) -> Zeroizing<String> {
        let mut blocks = vec![pem::Pem::new("PRIVATE KEY", self.private_key.to_vec())];
        blocks.push(pem::Pem::new("CERTIFICATE", self.leaf_certificate.clone()));
        blocks.extend(
            self.chain
                .iter()
                .map(|der| pem::Pem::new("CERTIFICATE", der.clone())),
        );
        Zeroizing::new(pem::encode_many(&blocks))
    }
}

/// Identity and trust roots ready for a `reqwest::ClientBuilder`.
pub(crate) struct ClientIdentity {
    pub identity: reqwest::Identity,
    pub ca_certificates: Vec<reqwest::Certificate>,
}

/// Decodes a PKCS#12 archive and sorts its certificates.
pub fn split_pkcs12(der: &[u8], password: &str) -> Result<Pkcs12Contents> {
    let pfx = p12::PFX::parse(der).map_err(|e| Error::Pkcs12(format!("{e:?}")))?;
    if !pfx.verify_mac(password) {
        return Err(Error::Pkcs12(
            "MAC verification failed (wrong password or corrupt file)".to_string(),
        ));
    }

    let certificates = pfx
        .cert_x509_bags(password)
        .map_err(|e| Error::Pkcs12(format!("cannot read certificates: {e:?}")))?;
    let mut keys = pfx
        .key_bags(password)
        .map_err(|e| Error::Pkcs12(format!("cannot read private key: {e:?}")))?;

    let mut leaf = None;
    let mut chain = Vec::new();
    let mut ca_certificates = Vec::new();
    for certificate in certificates {
        if is_ca(&certificate)? {
            ca_certificates.push(certificate);
        } else if leaf.is_none() {
            leaf = Some(certificate);
        } else {
            chain.push(certificate);
        }
    }

    let leaf_certificate = leaf.ok_or(Error::IncompleteIdentity {
        missing: "client certificate",
    })?;
    if keys.is_empty() {
        return Err(Error::IncompleteIdentity {
            missing: "private key",
        });
    }
    let private_key = Zeroizing::new(keys.swap_remove(0));

    Ok(Pkcs12Contents {
        leaf_certificate,
        chain,
        private_key,
        ca_certificates,
    })
}

fn is_ca(der: &[u8]) -> Result<bool> {
    let (_, certificate) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| Error::Pkcs12(format!("failed to parse certificate: {e}")))?;
    Ok(certificate.is_ca())
}

/// Reads `path` and turns it into a TLS client identity.
pub(crate) fn load_client_identity(path: &Path, password: &str) -> Result<ClientIdentity> {
    let der = std::fs::read(path).map_err(|source| Error::CertificateRead {
        path: path.to_path_buf(),
        source,
    })?;
    let contents = split_pkcs12(&der, password)?;

    let identity = reqwest::Identity::from_pem(contents.identity_pem().as_bytes())
        .map_err(|e| Error::Pkcs12(format!("failed to create X509 key pair: {e}")))?;
    let ca_certificates = contents
        .ca_certificates
        .iter()
        .map(|der| reqwest::Certificate::from_der(der))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Pkcs12(format!("invalid CA certificate: {e}")))?;

    tracing::debug!(
        path = %path.display(),
        ca_certificates = ca_certificates.len(),
        "loaded PKCS#12 client identity"
    );
    Ok(ClientIdentity {
        identity,
        ca_certificates,
    })
}

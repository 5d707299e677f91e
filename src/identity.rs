//! Client certificate material
//!
//! A `ClientIdentity` is one certificate + private key pair (plus any issuer
//! chain shipped alongside it) ready to present during a mutual-TLS
//! handshake. Identities come from a PKCS#12/PFX bundle on disk; loading the
//! bundle is the only file I/O this crate performs.

use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Certificate bundle loading errors
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("certificate bundle not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read certificate bundle {}: {1}", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("certificate bundle {} is not valid PKCS#12: {1}", .0.display())]
    BadFormat(PathBuf, #[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("incorrect password for certificate bundle {}", .0.display())]
    WrongPassword(PathBuf),
}

/// A loaded client certificate with its private key
///
/// Cloning is cheap: the underlying OpenSSL handles are reference-counted.
#[derive(Clone)]
pub struct ClientIdentity {
    /// Leaf certificate presented to the server
    pub cert: X509,
    /// Private key matching the leaf certificate
    pub key: PKey<Private>,
    /// Issuer chain shipped with the bundle, if any
    pub chain: Vec<X509>,
}

impl ClientIdentity {
    /// Subject Common Name of the leaf certificate, if present and UTF-8
    pub fn subject_common_name(&self) -> Option<String> {
        self.cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|s| s.to_string())
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("subject", &self.subject_common_name())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Load client identities from a PKCS#12/PFX bundle.
///
/// An empty password is a valid password for unencrypted bundles. On any
/// failure no identities are returned; a caller must not proceed with a
/// partial collection.
pub fn load_pkcs12(path: &Path, password: &str) -> Result<Vec<ClientIdentity>, CertError> {
    let der = std::fs::read(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            CertError::NotFound(path.to_owned())
        } else {
            CertError::Io(path.to_owned(), e)
        }
    })?;

    let bundle =
        Pkcs12::from_der(&der).map_err(|e| CertError::BadFormat(path.to_owned(), e.into()))?;

    let parsed = bundle.parse2(password).map_err(|e| {
        if is_mac_failure(&e) {
            CertError::WrongPassword(path.to_owned())
        } else {
            CertError::BadFormat(path.to_owned(), e.into())
        }
    })?;

    let (cert, key) = match (parsed.cert, parsed.pkey) {
        (Some(cert), Some(key)) => (cert, key),
        _ => {
            return Err(CertError::BadFormat(
                path.to_owned(),
                "bundle holds no certificate and private key".into(),
            ))
        }
    };

    let chain = parsed
        .ca
        .map(|stack| stack.into_iter().collect())
        .unwrap_or_default();

    Ok(vec![ClientIdentity { cert, key, chain }])
}

/// OpenSSL reports a wrong PKCS#12 password as a MAC verification failure.
fn is_mac_failure(err: &ErrorStack) -> bool {
    err.errors()
        .iter()
        .any(|e| e.reason().is_some_and(|r| r.contains("mac verify")))
}

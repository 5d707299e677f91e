//! TLS policy and its materialized snapshot
//!
//! `TlsPolicy` is the caller-authored, mutable description of how a client
//! connection should negotiate TLS. `TlsSnapshot` is the immutable value the
//! transport layer actually consumes: the same flags, with any file-based
//! client certificate loaded into the in-memory collection.
//!
//! Snapshotting never mutates the policy's observable state. The bundle on
//! disk is read at most once per policy; repeated snapshots reuse the loaded
//! identities as long as the path and password are unchanged.

use crate::identity::{self, CertError, ClientIdentity};
use crate::version::{ProtocolSet, TlsVersion};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// TLS settings for outbound connections
///
/// Plain mutable fields; fill in what differs from [`TlsPolicy::new`] and
/// call [`snapshot`](TlsPolicy::snapshot) before handing the result to the
/// connection layer. Do not mutate a policy while a snapshot of it is in
/// flight on another thread.
pub struct TlsPolicy {
    /// Minimum negotiable protocol version (default: the newest version the
    /// linked OpenSSL supports)
    pub min_version: TlsVersion,

    /// Accept any server certificate and host name without verification.
    ///
    /// The transport layer must bypass certificate validation entirely when
    /// this is set, which leaves the connection open to man-in-the-middle
    /// attacks. Testing only. Takes precedence over `check_revocation`.
    pub insecure_skip_verify: bool,

    /// Whether the transport layer should check certificate revocation
    /// (default: true). Ignored by the transport when `insecure_skip_verify`
    /// is set.
    pub check_revocation: bool,

    /// Already-loaded client identities, presented in order
    pub client_identities: Vec<ClientIdentity>,

    /// Path to a PKCS#12/PFX bundle to load on snapshot. An empty path is
    /// treated as unset.
    pub client_cert_path: Option<PathBuf>,

    /// Decryption password for `client_cert_path`. `None` and an empty
    /// string both mean the empty password.
    pub client_cert_password: Option<String>,

    // Identities loaded from client_cert_path, kept so repeated snapshots
    // read the bundle once. Invalidated when path or password change.
    loaded: Mutex<Option<LoadedBundle>>,
}

struct LoadedBundle {
    path: PathBuf,
    password: String,
    identities: Vec<ClientIdentity>,
}

impl TlsPolicy {
    /// Create a policy with the default settings
    pub fn new() -> TlsPolicy {
        TlsPolicy::default()
    }

    /// The protocol versions a handshake under this policy may negotiate
    pub fn enabled_protocols(&self) -> ProtocolSet {
        ProtocolSet::at_least(self.min_version)
    }

    /// Materialize an immutable snapshot of this policy.
    ///
    /// Scalar fields are copied verbatim. The snapshot's identity collection
    /// is this policy's `client_identities` followed by the identities from
    /// `client_cert_path`, if set. A load failure aborts the snapshot; the
    /// policy itself is left unchanged either way.
    pub fn snapshot(&self) -> Result<TlsSnapshot, CertError> {
        let mut client_identities = self.client_identities.clone();
        if let Some(path) = self.bundle_path() {
            client_identities.extend(self.bundle_identities(path)?);
        }

        Ok(TlsSnapshot {
            min_version: self.min_version,
            insecure_skip_verify: self.insecure_skip_verify,
            check_revocation: self.check_revocation,
            client_identities,
        })
    }

    fn bundle_path(&self) -> Option<&Path> {
        self.client_cert_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn bundle_identities(&self, path: &Path) -> Result<Vec<ClientIdentity>, CertError> {
        let password = self.client_cert_password.as_deref().unwrap_or("");

        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bundle) = loaded.as_ref() {
            if bundle.path == path && bundle.password == password {
                return Ok(bundle.identities.clone());
            }
        }

        let identities = identity::load_pkcs12(path, password)?;
        *loaded = Some(LoadedBundle {
            path: path.to_owned(),
            password: password.to_owned(),
            identities: identities.clone(),
        });
        Ok(identities)
    }
}

impl Default for TlsPolicy {
    fn default() -> TlsPolicy {
        TlsPolicy {
            min_version: TlsVersion::highest_supported(),
            insecure_skip_verify: false,
            check_revocation: true,
            client_identities: Vec::new(),
            client_cert_path: None,
            client_cert_password: None,
            loaded: Mutex::new(None),
        }
    }
}

impl Clone for TlsPolicy {
    /// Clones the policy's settings. The clone starts with a cold load
    /// cache; its first snapshot re-reads the bundle.
    fn clone(&self) -> TlsPolicy {
        TlsPolicy {
            min_version: self.min_version,
            insecure_skip_verify: self.insecure_skip_verify,
            check_revocation: self.check_revocation,
            client_identities: self.client_identities.clone(),
            client_cert_path: self.client_cert_path.clone(),
            client_cert_password: self.client_cert_password.clone(),
            loaded: Mutex::new(None),
        }
    }
}

impl fmt::Debug for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsPolicy")
            .field("min_version", &self.min_version)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("check_revocation", &self.check_revocation)
            .field("client_identities", &self.client_identities)
            .field("client_cert_path", &self.client_cert_path)
            .finish()
    }
}

/// Immutable, fully materialized TLS settings
///
/// Produced by [`TlsPolicy::snapshot`]. The transport layer treats this as
/// read-only for the lifetime of a connection attempt; clone it to share
/// across concurrent attempts (identity handles are reference-counted, so
/// the clone is cheap).
#[derive(Clone)]
pub struct TlsSnapshot {
    min_version: TlsVersion,
    insecure_skip_verify: bool,
    check_revocation: bool,
    client_identities: Vec<ClientIdentity>,
}

impl TlsSnapshot {
    /// Minimum negotiable protocol version
    pub fn min_version(&self) -> TlsVersion {
        self.min_version
    }

    /// Whether the transport must skip server certificate verification
    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Whether the transport should check certificate revocation
    pub fn check_revocation(&self) -> bool {
        self.check_revocation
    }

    /// Client identities to present, in order
    pub fn client_identities(&self) -> &[ClientIdentity] {
        &self.client_identities
    }

    /// The protocol versions a handshake under this snapshot may negotiate
    pub fn enabled_protocols(&self) -> ProtocolSet {
        ProtocolSet::at_least(self.min_version)
    }
}

impl fmt::Debug for TlsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSnapshot")
            .field("min_version", &self.min_version)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("check_revocation", &self.check_revocation)
            .field("client_identities", &self.client_identities)
            .finish()
    }
}

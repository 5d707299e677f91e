//! TLS policy resolution for client connections
//!
//! This crate turns a user-authored TLS policy (minimum protocol version,
//! revocation-checking preference, verification override, optional client
//! certificate material) into the two artifacts a connection layer consumes:
//! the set of protocol versions a handshake may negotiate, and an immutable
//! snapshot of the policy with any file-based client certificate loaded.
//!
//! # Architecture
//!
//! 1. `TlsPolicy` holds the caller's declared intent (mutable, plain fields)
//! 2. `ProtocolSet::at_least` derives the negotiable version set from the
//!    policy's floor version
//! 3. `TlsPolicy::snapshot` materializes an immutable `TlsSnapshot`, loading
//!    a PKCS#12 bundle from disk at most once per source policy
//!
//! The transport layer owns everything past that point: the socket, the
//! handshake, certificate-chain validation, and revocation checking. This
//! crate only produces their inputs and performs no network I/O.
//!
//! # Examples
//!
//! ```no_run
//! use tlspolicy::{TlsPolicy, TlsVersion};
//!
//! let mut policy = TlsPolicy::new();
//! policy.min_version = TlsVersion::Tls12;
//! policy.client_cert_path = Some("client.p12".into());
//! policy.client_cert_password = Some("secret".into());
//!
//! let snapshot = policy.snapshot().unwrap();
//! assert!(snapshot.enabled_protocols().contains(TlsVersion::Tls13));
//! assert_eq!(snapshot.client_identities().len(), 1);
//! ```

pub mod config;
pub mod identity;
pub mod version;

pub use config::{TlsPolicy, TlsSnapshot};
pub use identity::{CertError, ClientIdentity};
pub use version::{InvalidVersion, ProtocolSet, TlsVersion};

/// Result type for certificate loading operations
pub type Result<T> = std::result::Result<T, CertError>;

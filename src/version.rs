//! Protocol versions and the negotiable version set
//!
//! A `TlsVersion` names one wire-protocol revision; a `ProtocolSet` is the
//! bitset of revisions a handshake is allowed to negotiate. The set is
//! always derived from a floor version: everything at least as new as the
//! floor is in, everything older is out.

use openssl::error::ErrorStack;
use openssl::ssl::{SslContextBuilder, SslOptions, SslVersion};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use std::sync::OnceLock;

/// TLS protocol version, ordered oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

/// Error returned when parsing an unrecognized TLS version string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid TLS version: {0}")]
pub struct InvalidVersion(pub String);

impl TlsVersion {
    /// Every supported version, in protocol order
    pub const ALL: [TlsVersion; 4] = [
        TlsVersion::Tls10,
        TlsVersion::Tls11,
        TlsVersion::Tls12,
        TlsVersion::Tls13,
    ];

    /// The newest version the linked OpenSSL can negotiate.
    ///
    /// TLS 1.3 requires OpenSSL 1.1.1; older libraries top out at TLS 1.2.
    /// Probed once per process and cached.
    pub fn highest_supported() -> TlsVersion {
        static HIGHEST: OnceLock<TlsVersion> = OnceLock::new();
        *HIGHEST.get_or_init(|| {
            if openssl::version::number() >= 0x1010_1000 {
                TlsVersion::Tls13
            } else {
                TlsVersion::Tls12
            }
        })
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(self) -> SslVersion {
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsVersion {
    type Err = InvalidVersion;

    /// Parse TLS version from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, InvalidVersion> {
        match s.to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(InvalidVersion(s.to_string())),
        }
    }
}

/// Set of TLS versions a handshake may negotiate
///
/// Built by OR-ing versions together, most commonly via [`ProtocolSet::at_least`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProtocolSet(u8);

impl ProtocolSet {
    /// The empty set
    pub const EMPTY: ProtocolSet = ProtocolSet(0);

    /// Every version at least as new as `min`.
    ///
    /// The result always contains `min` itself, so it is never empty, and it
    /// never contains a version older than `min`.
    pub fn at_least(min: TlsVersion) -> ProtocolSet {
        let mut set = ProtocolSet::EMPTY;
        for version in TlsVersion::ALL {
            if version >= min {
                set.insert(version);
            }
        }
        set
    }

    /// Whether `version` is in the set
    pub fn contains(self, version: TlsVersion) -> bool {
        self.0 & version.bit() != 0
    }

    /// Add `version` to the set
    pub fn insert(&mut self, version: TlsVersion) {
        self.0 |= version.bit();
    }

    /// Number of versions in the set
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Oldest version in the set
    pub fn lowest(self) -> Option<TlsVersion> {
        self.iter().next()
    }

    /// Newest version in the set
    pub fn highest(self) -> Option<TlsVersion> {
        self.iter().last()
    }

    /// Iterate the set's versions, oldest first
    pub fn iter(self) -> impl Iterator<Item = TlsVersion> {
        TlsVersion::ALL.into_iter().filter(move |v| self.contains(*v))
    }

    /// Apply the set to an SSL context builder.
    ///
    /// Pins the builder's negotiable versions to exactly this set: the
    /// min/max protocol version knobs bound the span, and versions inside
    /// the span that are not in the set are switched off individually. An
    /// empty set leaves the builder untouched.
    pub fn configure(self, ctx: &mut SslContextBuilder) -> Result<(), ErrorStack> {
        if self.is_empty() {
            return Ok(());
        }
        ctx.set_min_proto_version(self.lowest().map(TlsVersion::to_openssl_version))?;
        ctx.set_max_proto_version(self.highest().map(TlsVersion::to_openssl_version))?;

        // Only TLS 1.1 and 1.2 can sit strictly between two other versions;
        // the bounds above already exclude everything outside the span.
        let mut off = SslOptions::empty();
        if !self.contains(TlsVersion::Tls11) {
            off |= SslOptions::NO_TLSV1_1;
        }
        if !self.contains(TlsVersion::Tls12) {
            off |= SslOptions::NO_TLSV1_2;
        }
        ctx.set_options(off);
        Ok(())
    }
}

impl BitOr for ProtocolSet {
    type Output = ProtocolSet;

    fn bitor(self, rhs: ProtocolSet) -> ProtocolSet {
        ProtocolSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProtocolSet {
    fn bitor_assign(&mut self, rhs: ProtocolSet) {
        self.0 |= rhs.0;
    }
}

impl From<TlsVersion> for ProtocolSet {
    fn from(version: TlsVersion) -> ProtocolSet {
        ProtocolSet(version.bit())
    }
}

impl fmt::Debug for ProtocolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

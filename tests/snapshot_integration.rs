//! Snapshot integration tests
//!
//! These tests exercise policy snapshotting against real PKCS#12 bundles on
//! disk: loading with the correct, wrong, and empty password, malformed
//! bundles, missing files, repeated snapshots, and the ordering of
//! pre-loaded versus file-loaded identities. Bundles are generated with
//! OpenSSL's own builders rather than checked in as binary fixtures.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tlspolicy::{identity, CertError, TlsPolicy, TlsVersion};

/// Generate a self-signed certificate and key for `common_name`
fn generate_identity(common_name: &str) -> (X509, PKey<Private>) {
    let rsa = Rsa::generate(2048).unwrap();
    let pkey = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    let not_before = Asn1Time::days_from_now(0).unwrap();
    builder.set_not_before(&not_before).unwrap();
    let not_after = Asn1Time::days_from_now(30).unwrap();
    builder.set_not_after(&not_after).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();

    (builder.build(), pkey)
}

/// Write a PKCS#12 bundle for `common_name` to `dir`, encrypted with `password`
fn write_bundle(dir: &Path, file_name: &str, password: &str, common_name: &str) -> PathBuf {
    let (cert, pkey) = generate_identity(common_name);

    let bundle = Pkcs12::builder()
        .name(common_name)
        .pkey(&pkey)
        .cert(&cert)
        .build2(password)
        .unwrap();

    let path = dir.join(file_name);
    fs::write(&path, bundle.to_der().unwrap()).unwrap();
    path
}

#[test]
fn test_snapshot_loads_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bundle(dir.path(), "client.p12", "swordfish", "client.example.com");

    let mut policy = TlsPolicy::new();
    policy.min_version = TlsVersion::Tls12;
    policy.client_cert_path = Some(path);
    policy.client_cert_password = Some("swordfish".to_string());

    let snapshot = policy.snapshot().unwrap();
    assert_eq!(snapshot.client_identities().len(), 1);
    assert_eq!(
        snapshot.client_identities()[0].subject_common_name().as_deref(),
        Some("client.example.com")
    );
    assert_eq!(snapshot.min_version(), TlsVersion::Tls12);

    // Loading never grows the source policy's own collection.
    assert!(policy.client_identities.is_empty());
}

#[test]
fn test_wrong_password_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bundle(dir.path(), "client.p12", "swordfish", "client.example.com");

    let mut policy = TlsPolicy::new();
    policy.client_cert_path = Some(path);
    policy.client_cert_password = Some("marlin".to_string());

    let err = policy.snapshot().unwrap_err();
    assert!(matches!(err, CertError::WrongPassword(_)), "got {err:?}");
    assert!(policy.client_identities.is_empty());
}

#[test]
fn test_empty_password_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bundle(dir.path(), "client.p12", "", "client.example.com");

    // An unset password means the empty password.
    let mut policy = TlsPolicy::new();
    policy.client_cert_path = Some(path);

    let snapshot = policy.snapshot().unwrap();
    assert_eq!(snapshot.client_identities().len(), 1);
}

#[test]
fn test_garbage_bundle_is_bad_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.p12");
    fs::write(&path, b"this is not a PKCS#12 bundle").unwrap();

    let mut policy = TlsPolicy::new();
    policy.client_cert_path = Some(path);

    let err = policy.snapshot().unwrap_err();
    assert!(matches!(err, CertError::BadFormat(_, _)), "got {err:?}");
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_missing_bundle_is_not_found() {
    let dir = tempfile::tempdir().unwrap();

    let mut policy = TlsPolicy::new();
    policy.client_cert_path = Some(dir.path().join("absent.p12"));

    let err = policy.snapshot().unwrap_err();
    assert!(matches!(err, CertError::NotFound(_)), "got {err:?}");
}

#[test]
fn test_repeated_snapshots_do_not_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bundle(dir.path(), "client.p12", "swordfish", "client.example.com");

    let mut policy = TlsPolicy::new();
    policy.client_cert_path = Some(path);
    policy.client_cert_password = Some("swordfish".to_string());

    let first = policy.snapshot().unwrap();
    let second = policy.snapshot().unwrap();
    assert_eq!(first.client_identities().len(), 1);
    assert_eq!(second.client_identities().len(), 1);
}

#[test]
fn test_bundle_read_at_most_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bundle(dir.path(), "client.p12", "swordfish", "client.example.com");

    let mut policy = TlsPolicy::new();
    policy.client_cert_path = Some(path.clone());
    policy.client_cert_password = Some("swordfish".to_string());

    policy.snapshot().unwrap();

    // The first snapshot loaded the bundle; later snapshots must not touch
    // the file again.
    fs::remove_file(&path).unwrap();
    let snapshot = policy.snapshot().unwrap();
    assert_eq!(snapshot.client_identities().len(), 1);

    // A changed password invalidates the cached load.
    policy.client_cert_password = Some("marlin".to_string());
    let err = policy.snapshot().unwrap_err();
    assert!(matches!(err, CertError::NotFound(_)), "got {err:?}");
}

#[test]
fn test_preloaded_identities_come_first() {
    let dir = tempfile::tempdir().unwrap();
    let preloaded_path = write_bundle(dir.path(), "first.p12", "", "first.example.com");
    let bundle_path = write_bundle(dir.path(), "second.p12", "", "second.example.com");

    let preloaded = identity::load_pkcs12(&preloaded_path, "").unwrap();

    let mut policy = TlsPolicy::new();
    policy.client_identities = preloaded;
    policy.client_cert_path = Some(bundle_path);

    let snapshot = policy.snapshot().unwrap();
    let names: Vec<_> = snapshot
        .client_identities()
        .iter()
        .map(|id| id.subject_common_name().unwrap())
        .collect();
    assert_eq!(names, vec!["first.example.com", "second.example.com"]);
}

#[test]
fn test_snapshot_is_independent_of_later_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bundle(dir.path(), "client.p12", "", "client.example.com");

    let mut policy = TlsPolicy::new();
    policy.min_version = TlsVersion::Tls12;
    policy.client_cert_path = Some(path);

    let snapshot = policy.snapshot().unwrap();

    policy.min_version = TlsVersion::Tls13;
    policy.client_cert_path = None;

    assert_eq!(snapshot.min_version(), TlsVersion::Tls12);
    assert_eq!(snapshot.client_identities().len(), 1);
}

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use tenure_core::*;

// ---------------------------------------------------------------------------
// 1. Error Display and From impls
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    let config_err = TenureError::config("TTL must be positive");
    assert_eq!(
        config_err.to_string(),
        "Configuration error: TTL must be positive"
    );
    assert!(config_err.is_configuration());
    assert!(!config_err.is_persistence());

    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let persist_err = TenureError::persistence(
        "writing session file",
        "/var/lib/tenure/abc.json",
        io_err,
    );
    assert!(persist_err.is_persistence());
    assert_eq!(
        persist_err.to_string(),
        "Persistence error while writing session file /var/lib/tenure/abc.json: read-only"
    );

    // The I/O failure stays reachable through the source chain
    let source = std::error::Error::source(&persist_err).unwrap();
    assert_eq!(source.to_string(), "read-only");

    // From<serde_json::Error> conversion
    let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    let tenure_err: TenureError = serde_err.into();
    assert!(tenure_err.to_string().starts_with("Serialization error:"));
}

// ---------------------------------------------------------------------------
// 2. Full TOML document
// ---------------------------------------------------------------------------

#[test]
fn full_config_document() {
    let config = TenureConfig::from_toml_str(
        r#"
        [store]
        default_ttl_secs = 900
        storage_path = "./data/sessions"

        [sweep]
        interval_secs = 15
        "#,
    )
    .unwrap();

    assert_eq!(config.store.default_ttl_secs, 900);
    assert_eq!(
        config.store.storage_path,
        Some(PathBuf::from("./data/sessions"))
    );
    assert_eq!(config.sweep.interval_secs, 15);
}

#[test]
fn partial_config_keeps_other_defaults() {
    let config = TenureConfig::from_toml_str("[store]\ndefault_ttl_secs = 5\n").unwrap();
    assert_eq!(config.store.default_ttl_secs, 5);
    assert_eq!(config.sweep, SweepConfig::default());
}

#[test]
fn empty_storage_path_is_rejected() {
    let err = TenureConfig::from_toml_str("[store]\nstorage_path = \"\"\n").unwrap_err();
    assert!(err.is_configuration());
}

// ---------------------------------------------------------------------------
// 3. Loading from disk
// ---------------------------------------------------------------------------

#[test]
fn load_reads_file_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tenure.toml");
    std::fs::write(&path, "[store]\ndefault_ttl_secs = 42\n").unwrap();

    let config = TenureConfig::load(&path).unwrap();
    assert_eq!(config.store.default_ttl_secs, 42);
}

#[test]
fn load_missing_file_is_configuration_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = TenureConfig::load(&tmp.path().join("absent.toml")).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn load_or_default_tolerates_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let config = TenureConfig::load_or_default(&tmp.path().join("absent.toml")).unwrap();
    assert_eq!(config.store, StoreConfig::default());
}

#[test]
fn validate_ttl_boundaries() {
    assert!(validate_ttl(0).unwrap_err().is_configuration());
    validate_ttl(1).unwrap();
    validate_ttl(u64::MAX).unwrap();
}

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use super::*;

#[test]
fn defaults_are_valid() {
    let config = ChangedeskConfig::default();
    config.validate().expect("defaults validate");
    assert_eq!(config.storage.bucket, "4cm-prod-ccoe-change-management-metadata");
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.survey.base_url, "https://api.typeform.com");
    assert_eq!(config.fanout.max_concurrency, 4);
    assert!(config.audit.enabled);
    assert!(!config.dry_run);
}

#[test]
fn toml_round_trip_parses_nested_sections() {
    let raw = r#"
        dry_run = true

        [server]
        bind = "127.0.0.1:9000"
        max_inflight = 16

        [storage]
        backend = "memory"
        bucket = "test-bucket"

        [auth]
        allowed_domains = ["example.com"]
        admin_users = ["root@example.com"]

        [mail]
        sender = "ccoe@example.com"

        [customers]
        hts = "HTS Corp"
        cds = "CDS Inc"
    "#;
    let config: ChangedeskConfig = toml::from_str(raw).expect("parse");
    config.validate().expect("validate");
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.storage.bucket, "test-bucket");
    assert_eq!(config.server.bind, "127.0.0.1:9000");
    assert_eq!(config.auth.allowed_domains, vec!["example.com".to_string()]);
    assert!(config.dry_run);
    let directory = config.customer_directory().expect("directory");
    assert_eq!(directory.len(), 2);
    let hts = CustomerCode::parse("hts").expect("code");
    assert_eq!(directory.get(&hts).map(String::as_str), Some("HTS Corp"));
}

#[test]
fn validation_fails_closed() {
    let mut config = ChangedeskConfig::default();
    config.storage.bucket = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = ChangedeskConfig::default();
    config.server.max_inflight = 0;
    assert!(config.validate().is_err());

    let mut config = ChangedeskConfig::default();
    config.customers.insert("NOT-VALID".to_string(), "Bad".to_string());
    assert!(config.validate().is_err());

    let mut config = ChangedeskConfig::default();
    config.auth.allowed_domains = vec!["user@example.com".to_string()];
    assert!(config.validate().is_err());
}

#[test]
fn load_rejects_oversized_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("changedesk.toml");
    let huge = format!("log_level = \"{}\"", "x".repeat(MAX_CONFIG_FILE_SIZE + 16));
    std::fs::write(&path, huge).expect("write");
    let error = ChangedeskConfig::load(Some(&path)).expect_err("oversized");
    assert!(matches!(error, ConfigError::Invalid(_)));
}

#[test]
fn load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let config = ChangedeskConfig::load(Some(&path)).expect("defaults");
    assert_eq!(config.storage.bucket, "4cm-prod-ccoe-change-management-metadata");
}

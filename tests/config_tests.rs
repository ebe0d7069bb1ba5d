use netprint::config::{FingerprintConfig, MdnsBackend};
use netprint::errors::FingerprintError;
use netprint::MacVendorDatabase;
use std::time::Duration;

#[test]
fn test_defaults_are_valid() {
    let config = FingerprintConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.per_host_timeout(), Duration::from_secs(4));
    assert_eq!(config.rescan_interval(), Duration::from_secs(3600));
    assert_eq!(config.mdns_backend, MdnsBackend::Avahi);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let path = std::env::temp_dir().join(format!("netprint-config-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{"max_concurrency": 4, "mdns_backend": "native", "http_ports": [80, 8080]}"#,
    )
    .unwrap();

    let config = FingerprintConfig::from_file(&path).unwrap();
    assert_eq!(config.max_concurrency, 4);
    assert_eq!(config.mdns_backend, MdnsBackend::Native);
    assert_eq!(config.http_ports, vec![80, 8080]);
    assert_eq!(config.confidence_threshold, 0.5);
    assert_eq!(config.snmp_community, "public");

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_unreadable_file_is_a_config_error() {
    let missing = std::path::Path::new("/nonexistent/netprint.json");
    assert!(matches!(
        FingerprintConfig::from_file(missing),
        Err(FingerprintError::Config(_))
    ));
}

#[test]
fn test_validation_rejects_unusable_settings() {
    let bad = [
        FingerprintConfig {
            confidence_threshold: 0.0,
            ..Default::default()
        },
        FingerprintConfig {
            confidence_threshold: 1.5,
            early_exit_confidence: 1.5,
            ..Default::default()
        },
        FingerprintConfig {
            confidence_threshold: 0.7,
            early_exit_confidence: 0.6,
            ..Default::default()
        },
        FingerprintConfig {
            per_host_concurrency: 0,
            ..Default::default()
        },
        FingerprintConfig {
            port_scan_concurrency: 0,
            ..Default::default()
        },
        FingerprintConfig {
            http_max_requests: 0,
            ..Default::default()
        },
    ];
    for config in bad {
        assert!(matches!(config.validate(), Err(FingerprintError::Config(_))));
    }
}

#[test]
fn test_environment_overrides() {
    std::env::set_var("NETPRINT_HOST_TIMEOUT_MS", "1234");
    std::env::set_var("NETPRINT_MAX_CONCURRENCY", "not a number");

    let config = FingerprintConfig::default().apply_env();
    assert_eq!(config.per_host_timeout_ms, 1234);
    assert_eq!(config.max_concurrency, 16);

    std::env::remove_var("NETPRINT_HOST_TIMEOUT_MS");
    std::env::remove_var("NETPRINT_MAX_CONCURRENCY");
}

#[test]
fn test_vendor_lookup_uses_builtin_table() {
    let db = MacVendorDatabase::new(None);

    let vendor = db.lookup_vendor("b8:27:eb:12:34:56").unwrap();
    assert!(vendor.contains("Raspberry Pi"));
    // Cached answers stay the same
    assert_eq!(db.lookup_vendor("B8-27-EB-12-34-56").unwrap(), vendor);
    assert_eq!(db.lookup_vendor("02:00:00:00:00:01"), None);
}

#[test]
fn test_vendor_lookup_falls_back_when_file_is_missing() {
    let db = MacVendorDatabase::new(Some("/nonexistent/manuf".into()));
    let vendor = db.lookup_vendor("00:11:32:aa:bb:cc").unwrap();
    assert!(vendor.contains("Synology"));
}

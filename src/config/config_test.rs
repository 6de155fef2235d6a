// ABOUTME: Tests for ring configuration validation and loading.
// ABOUTME: Covers defaults, the K < N constraint, and JSON file parsing.

use std::io::Write;

use super::{AcquireOrder, ArbiterKind, RingConfig};
use crate::error::ConfigError;

#[test]
fn test_defaults_are_reference_values() {
    let config = RingConfig::default();
    assert_eq!(config.ring_size, 5);
    assert_eq!(config.capacity, 2);
    assert_eq!(config.quota, 3);
    assert_eq!(config.arbiter, ArbiterKind::Gate);
    assert_eq!(config.acquire_order, AcquireOrder::LeftFirst);
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder_rejects_each_invalid_field() {
    assert!(matches!(
        RingConfig::builder().ring_size(1).capacity(1).build(),
        Err(ConfigError::RingTooSmall(1))
    ));
    assert!(matches!(
        RingConfig::builder().capacity(0).build(),
        Err(ConfigError::ZeroCapacity)
    ));
    assert!(matches!(
        RingConfig::builder().ring_size(4).capacity(4).build(),
        Err(ConfigError::CapacityNotBelowRingSize {
            capacity: 4,
            ring_size: 4
        })
    ));
    assert!(matches!(
        RingConfig::builder().quota(0).build(),
        Err(ConfigError::ZeroQuota)
    ));
}

#[test]
fn test_builder_accepts_maximum_safe_capacity() {
    let config = RingConfig::builder()
        .ring_size(10)
        .capacity(9)
        .quota(5)
        .arbiter(ArbiterKind::Host)
        .acquire_order(AcquireOrder::RightFirst)
        .build()
        .unwrap();

    assert_eq!(config.capacity, 9);
    assert_eq!(config.arbiter, ArbiterKind::Host);
}

#[test]
fn test_json_fills_missing_fields_with_defaults() {
    let json = r#"{"ring_size": 7, "arbiter": "host", "acquire_order": "right_first"}"#;
    let config = RingConfig::from_json_str(json).unwrap();

    assert_eq!(config.ring_size, 7);
    assert_eq!(config.capacity, 2);
    assert_eq!(config.arbiter, ArbiterKind::Host);
    assert_eq!(config.acquire_order, AcquireOrder::RightFirst);
}

#[test]
fn test_json_is_validated() {
    let result = RingConfig::from_json_str(r#"{"ring_size": 2, "capacity": 2}"#);
    assert!(matches!(
        result,
        Err(ConfigError::CapacityNotBelowRingSize { .. })
    ));
}

#[test]
fn test_json_parse_error() {
    let result = RingConfig::from_json_str("{ring_size: }");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"ring_size": 3, "capacity": 1, "quota": 1}}"#).unwrap();

    let config = RingConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.ring_size, 3);
    assert_eq!(config.capacity, 1);
    assert_eq!(config.quota, 1);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = RingConfig::from_json_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_error_messages_name_values() {
    let err = ConfigError::CapacityNotBelowRingSize {
        capacity: 5,
        ring_size: 5,
    };
    assert_eq!(
        err.to_string(),
        "admission capacity 5 must be below ring size 5"
    );
}

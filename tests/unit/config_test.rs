//! Tests for configuration validation and loading

use std::io::Write;
use std::time::Duration;

use deferred_engine::config::EngineConfig;
use deferred_engine::infra::DeviceNumber;

#[test]
fn test_default_config_is_valid() {
    let cfg = EngineConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.device.number(), DeviceNumber::new(42, 0));
    assert_eq!(cfg.device.name, "deferred");
    assert_eq!(cfg.blocking_latency(), Duration::from_secs(5));
    assert_eq!(cfg.monitor_delay_secs, 1);
    assert!(cfg.exclusive_open);
}

#[test]
fn test_empty_device_name_rejected() {
    let mut cfg = EngineConfig::default();
    cfg.device.name = "  ".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_small_stack_rejected() {
    let mut cfg = EngineConfig::default();
    cfg.thread_stack_size = 4096;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_builder_style_setters() {
    let cfg = EngineConfig::new()
        .with_blocking_latency(Duration::from_millis(250))
        .with_device_number(240, 3)
        .with_exclusive_open(false);
    assert_eq!(cfg.blocking_latency_ms, 250);
    assert_eq!(cfg.device.number().to_string(), "240:3");
    assert!(!cfg.exclusive_open);
}

#[test]
fn test_from_json_partial_uses_defaults() {
    let cfg = EngineConfig::from_json_str(r#"{"device": {"major": 100}, "monitor_delay_secs": 3}"#)
        .unwrap();
    assert_eq!(cfg.device.major, 100);
    assert_eq!(cfg.device.minor, 0);
    assert_eq!(cfg.device.name, "deferred");
    assert_eq!(cfg.monitor_delay_secs, 3);
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(EngineConfig::from_json_str("{not json").is_err());
    assert!(EngineConfig::from_json_str(r#"{"thread_stack_size": 10}"#).is_err());
}

#[test]
fn test_from_env_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "DEFERRED_DEVICE_NAME=lab").unwrap();
    writeln!(file, "DEFERRED_DEVICE_MAJOR=43").unwrap();
    writeln!(file, "DEFERRED_BLOCKING_LATENCY_MS=10").unwrap();
    writeln!(file, "DEFERRED_EXCLUSIVE_OPEN=false").unwrap();
    file.flush().unwrap();

    let cfg = EngineConfig::from_env_file(file.path()).unwrap();
    assert_eq!(cfg.device.name, "lab");
    assert_eq!(cfg.device.major, 43);
    assert_eq!(cfg.blocking_latency_ms, 10);
    assert!(!cfg.exclusive_open);
}

#[test]
fn test_from_env_file_bad_value() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "DEFERRED_DEVICE_MINOR=minus-one").unwrap();
    file.flush().unwrap();

    let err = EngineConfig::from_env_file(file.path()).unwrap_err();
    assert!(err.contains("DEFERRED_DEVICE_MINOR"));
}

#[test]
fn test_from_env_file_missing() {
    assert!(EngineConfig::from_env_file("/nonexistent/deferred.env").is_err());
}

#[test]
fn test_from_env_reads_prefixed_vars() {
    // No other test asserts these keys.
    std::env::set_var("DEFERRED_MONITOR_DELAY_SECS", "9");
    std::env::set_var("DEFERRED_THREAD_STACK_SIZE", "131072");
    let cfg = EngineConfig::from_env();
    std::env::remove_var("DEFERRED_MONITOR_DELAY_SECS");
    std::env::remove_var("DEFERRED_THREAD_STACK_SIZE");

    let cfg = cfg.unwrap();
    assert_eq!(cfg.monitor_delay_secs, 9);
    assert_eq!(cfg.thread_stack_size, 128 * 1024);
}

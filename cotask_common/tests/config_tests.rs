//! System configuration loading tests.
//!
//! Full-file loading through `ConfigLoader`, the shipped example config,
//! unknown/invalid values and validation of cross-field bounds.

use cotask_common::config::{ConfigError, ConfigLoader, LogLevel};
use cotask_common::consts::MAX_SAMPLES;
use cotask_common::system::SystemConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("cotask.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn shipped_config_loads_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/cotask.toml");
    let config = SystemConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.shared.service_name, "balance-platform");
    assert_eq!(config.periods.touchpad, 5_000);
    assert_eq!(config.ui.data_file.as_deref(), Some("Data.csv"));
    assert_eq!(config.control.inner.kp, 4.0);
}

#[test]
fn minimal_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[shared]\nlog_level = \"debug\"\n");
    let config = SystemConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.shared.service_name, "cotask");
    assert_eq!(config.ui.collect_capacity, MAX_SAMPLES);
    assert!(config.ui.data_file.is_none());
}

#[test]
fn wrong_type_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[periods]\nuser = \"fast\"\n");
    assert!(matches!(
        SystemConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn out_of_range_capacity_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[ui]\ncollect_capacity = 0\n");
    let config = SystemConfig::load(&path).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(err.to_string().contains("collect_capacity"));
}

#[test]
fn narrow_counter_rejects_long_periods() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[scheduler]
tick_bits = 16

[periods]
user = 50_000
"#,
    );
    let config = SystemConfig::load(&path).unwrap();
    let msg = config.validate().unwrap_err().to_string();
    assert!(msg.contains("half the tick range"), "got: {msg}");
}

#[test]
fn filter_bounds_checked() {
    let config = SystemConfig::from_toml("[filter]\nalpha = 1.5\n").unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn missing_file_reported() {
    let dir = TempDir::new().unwrap();
    let result = SystemConfig::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

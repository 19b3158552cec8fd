//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use property_offload::config::{ConfigError, OffloadConfig, DEFAULT_TASK_TIMEOUT_MS};
use property_offload::Dispatcher;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[dispatcher]
task_timeout_ms = 1500
worker_enabled = true
worker_thread_name = "listings-worker"
"#
    )
    .unwrap();

    let config = OffloadConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.dispatcher.task_timeout_ms, 1500);
    assert!(config.dispatcher.worker_enabled);
    assert_eq!(config.dispatcher.worker_thread_name, "listings-worker");
    assert_eq!(config.dispatcher.task_timeout(), Duration::from_millis(1500));
}

#[test]
fn test_empty_file_yields_defaults() {
    let temp_file = NamedTempFile::new().unwrap();

    let config = OffloadConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config, OffloadConfig::default());
    assert_eq!(config.dispatcher.task_timeout_ms, DEFAULT_TASK_TIMEOUT_MS);
}

#[test]
fn test_unknown_sections_are_ignored() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[site]
name = "Imobiliária"

[dispatcher]
worker_enabled = false
"#
    )
    .unwrap();

    let config = OffloadConfig::load_from_file(temp_file.path()).unwrap();
    assert!(!config.dispatcher.worker_enabled);
}

#[test]
fn test_missing_file_is_read_error() {
    let result = OffloadConfig::load_from_file(Path::new("/nonexistent/property-offload.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[dispatcher]\ntask_timeout_ms = \"soon\"").unwrap();

    let result = OffloadConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_zero_timeout_fails_validation() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[dispatcher]\ntask_timeout_ms = 0").unwrap();

    match OffloadConfig::load_from_file(temp_file.path()) {
        Err(ConfigError::InvalidConfig(message)) => assert!(message.contains("task_timeout_ms")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_config_survives_toml_round_trip() {
    let original = OffloadConfig::default();
    let rendered = toml::to_string_pretty(&original).unwrap();
    assert_eq!(OffloadConfig::from_toml_str(&rendered).unwrap(), original);
}

#[tokio::test]
async fn test_loaded_timeout_reaches_dispatcher() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[dispatcher]\ntask_timeout_ms = 750").unwrap();

    let config = OffloadConfig::load_from_file(temp_file.path()).unwrap();
    let dispatcher = Dispatcher::new(&config.dispatcher);

    assert_eq!(dispatcher.task_timeout(), Duration::from_millis(750));
}

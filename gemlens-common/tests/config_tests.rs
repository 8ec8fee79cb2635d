//! Tests for configuration loading and resolution
//!
//! - Missing sections and keys take built-in defaults
//! - Explicit config paths (CLI, environment) must exist and parse
//! - Invalid values are rejected at load time
//! - Oracle API key resolution: environment beats TOML
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate GEMLENS_CONFIG or GEMLENS_ORACLE_API_KEY are marked
//! with #[serial] to ensure they run sequentially, not in parallel.

use gemlens_common::config::{
    load_toml_config, resolve_config, resolve_oracle_api_key, OracleConfig, CONFIG_ENV_VAR,
    ORACLE_API_KEY_ENV_VAR,
};
use gemlens_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
        [oracle]
        base_url = "http://localhost:8080/v1"
        model = "vision-small"
        timeout_secs = 20
        requests_per_second = 1

        [fusion]
        dimension_tolerance_mm = 0.15
        weight_tolerance_ct = 0.02
        min_confidence_threshold = 0.7

        [extraction]
        strict_vocabulary = false

        [pipeline]
        max_concurrent_images = 2
        deadline_secs = 120

        [logging]
        level = "debug"
        "#,
    );

    let config = load_toml_config(file.path()).unwrap();

    assert_eq!(config.oracle.base_url, "http://localhost:8080/v1");
    assert_eq!(config.oracle.timeout_secs, 20);
    assert_eq!(config.fusion.dimension_tolerance_mm, 0.15);
    assert_eq!(config.fusion.min_confidence_threshold, 0.7);
    assert!(!config.extraction.strict_vocabulary);
    assert_eq!(config.pipeline.deadline_secs, Some(120));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = write_config("");

    let config = load_toml_config(file.path()).unwrap();

    assert_eq!(config.fusion.weight_tolerance_ct, 0.05);
    assert_eq!(config.fusion.min_confidence_threshold, 0.6);
    assert_eq!(config.oracle.requests_per_second, 3);
    assert!(config.pipeline.deadline_secs.is_none());
}

#[test]
fn test_malformed_file_is_config_error() {
    let file = write_config("[fusion\ndimension_tolerance_mm = ");

    let result = load_toml_config(file.path());

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_negative_tolerance_rejected() {
    let file = write_config("[fusion]\ndimension_tolerance_mm = -0.1\n");

    match load_toml_config(file.path()) {
        Err(Error::Config(msg)) => assert!(msg.contains("dimension_tolerance_mm")),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_zero_concurrency_rejected() {
    let file = write_config("[pipeline]\nmax_concurrent_images = 0\n");

    assert!(load_toml_config(file.path()).is_err());
}

#[test]
#[serial]
fn test_cli_path_beats_environment() {
    let cli = write_config("[logging]\nlevel = \"warn\"\n");
    let from_env = write_config("[logging]\nlevel = \"trace\"\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let (config, path) = resolve_config(Some(cli.path())).unwrap();

    assert_eq!(config.logging.level, "warn");
    assert_eq!(path.as_deref(), Some(cli.path()));

    // Cleanup
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_path_used_without_cli() {
    let from_env = write_config("[oracle]\nmodel = \"env-model\"\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let (config, path) = resolve_config(None).unwrap();

    assert_eq!(config.oracle.model, "env-model");
    assert_eq!(path.as_deref(), Some(from_env.path()));

    // Cleanup
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_explicit_path_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(matches!(resolve_config(Some(&missing)), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_api_key_environment_beats_toml() {
    env::set_var(ORACLE_API_KEY_ENV_VAR, "sk-from-env");
    let config = OracleConfig {
        api_key: Some("sk-from-toml".to_string()),
        ..OracleConfig::default()
    };

    assert_eq!(resolve_oracle_api_key(&config).unwrap(), "sk-from-env");

    // Blank environment value falls through to TOML
    env::set_var(ORACLE_API_KEY_ENV_VAR, "   ");
    assert_eq!(resolve_oracle_api_key(&config).unwrap(), "sk-from-toml");

    // Cleanup
    env::remove_var(ORACLE_API_KEY_ENV_VAR);
}

#[test]
#[serial]
fn test_api_key_missing_everywhere() {
    env::remove_var(ORACLE_API_KEY_ENV_VAR);

    let result = resolve_oracle_api_key(&OracleConfig::default());

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains(ORACLE_API_KEY_ENV_VAR)),
        other => panic!("expected Config error, got {:?}", other),
    }
}

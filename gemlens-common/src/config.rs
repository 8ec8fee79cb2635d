//! Bootstrap configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `GEMLENS_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/gemlens/config.toml`)
//! 4. Built-in defaults (no file)
//!
//! A missing file at the platform location is not an error: the service starts
//! with built-in defaults and logs a warning. A file named explicitly (CLI or
//! environment) must exist and parse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "GEMLENS_CONFIG";

/// Environment variable holding the recognition oracle API key
pub const ORACLE_API_KEY_ENV_VAR: &str = "GEMLENS_ORACLE_API_KEY";

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; omitted sections and keys take built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub fusion: FusionSection,

    #[serde(default)]
    pub extraction: ExtractionSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Recognition oracle endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Vision-capable model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (ENV `GEMLENS_ORACLE_API_KEY` takes priority)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound for a single oracle call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Request rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Fusion tolerances and review threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionSection {
    #[serde(default = "default_dimension_tolerance_mm")]
    pub dimension_tolerance_mm: f64,

    #[serde(default = "default_weight_tolerance_ct")]
    pub weight_tolerance_ct: f64,

    #[serde(default = "default_min_confidence_threshold")]
    pub min_confidence_threshold: f64,
}

impl Default for FusionSection {
    fn default() -> Self {
        Self {
            dimension_tolerance_mm: default_dimension_tolerance_mm(),
            weight_tolerance_ct: default_weight_tolerance_ct(),
            min_confidence_threshold: default_min_confidence_threshold(),
        }
    }
}

/// Claim extraction settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExtractionSection {
    /// Reject a whole extraction when a claim names an unknown field or method
    #[serde(default = "default_true")]
    pub strict_vocabulary: bool,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            strict_vocabulary: true,
        }
    }
}

/// Per-gemstone pipeline settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_max_concurrent_images")]
    pub max_concurrent_images: usize,

    /// Fuse with whatever is available after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_concurrent_images: default_max_concurrent_images(),
            deadline_secs: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_requests_per_second() -> u32 {
    3
}

fn default_dimension_tolerance_mm() -> f64 {
    0.1
}

fn default_weight_tolerance_ct() -> f64 {
    0.05
}

fn default_min_confidence_threshold() -> f64 {
    0.6
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_images() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    validate(&config)?;
    Ok(config)
}

/// Reject values that would make the pipeline misbehave
fn validate(config: &TomlConfig) -> Result<()> {
    let fusion = &config.fusion;
    for (name, value) in [
        ("fusion.dimension_tolerance_mm", fusion.dimension_tolerance_mm),
        ("fusion.weight_tolerance_ct", fusion.weight_tolerance_ct),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::Config(format!(
                "{} must be a non-negative number, got {}",
                name, value
            )));
        }
    }
    if !(0.0..=1.0).contains(&fusion.min_confidence_threshold) {
        return Err(Error::Config(format!(
            "fusion.min_confidence_threshold must be within [0, 1], got {}",
            fusion.min_confidence_threshold
        )));
    }
    if config.pipeline.max_concurrent_images == 0 {
        return Err(Error::Config(
            "pipeline.max_concurrent_images must be at least 1".to_string(),
        ));
    }
    if config.oracle.requests_per_second == 0 {
        return Err(Error::Config(
            "oracle.requests_per_second must be at least 1".to_string(),
        ));
    }
    if config.oracle.timeout_secs == 0 {
        return Err(Error::Config("oracle.timeout_secs must be at least 1".to_string()));
    }
    Ok(())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gemlens").join("config.toml"))
}

/// Resolve and load configuration
///
/// Returns the loaded configuration and the path it came from (`None` when
/// running on built-in defaults).
pub fn resolve_config(cli_arg: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        let config = load_toml_config(path)?;
        info!("Configuration loaded from {} (command line)", path.display());
        return Ok((config, Some(path.to_path_buf())));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            let path = PathBuf::from(path);
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {} ({})", path.display(), CONFIG_ENV_VAR);
            return Ok((config, Some(path)));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = default_config_path() {
        if path.exists() {
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            return Ok((config, Some(path)));
        }
    }

    // Priority 4: Built-in defaults
    warn!("No configuration file found, using built-in defaults");
    Ok((TomlConfig::default(), None))
}

/// Resolve the oracle API key
///
/// **Priority:** ENV → TOML
pub fn resolve_oracle_api_key(config: &OracleConfig) -> Result<String> {
    let env_key = std::env::var(ORACLE_API_KEY_ENV_VAR).ok();
    let toml_key = config.api_key.as_ref();

    if let (Some(env), Some(toml)) = (&env_key, toml_key) {
        if is_valid_key(env) && is_valid_key(toml) {
            warn!(
                "Oracle API key found in both {} and TOML. Using environment (highest priority).",
                ORACLE_API_KEY_ENV_VAR
            );
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("Oracle API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("Oracle API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    Err(Error::Config(format!(
        "Oracle API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: [oracle] api_key = \"your-key\"",
        ORACLE_API_KEY_ENV_VAR
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.fusion.dimension_tolerance_mm, 0.1);
        assert_eq!(config.pipeline.max_concurrent_images, 4);
        assert!(config.extraction.strict_vocabulary);
        assert_eq!(config.logging.level, "info");
        assert!(config.oracle.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [fusion]
            weight_tolerance_ct = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(config.fusion.weight_tolerance_ct, 0.02);
        assert_eq!(config.fusion.dimension_tolerance_mm, 0.1);
        assert_eq!(config.oracle.timeout_secs, 60);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = TomlConfig::default();
        config.fusion.min_confidence_threshold = 1.5;
        assert!(matches!(validate(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-123"));
        assert!(!is_valid_key("   "));
        assert!(!is_valid_key(""));
    }
}

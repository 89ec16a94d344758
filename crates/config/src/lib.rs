//! Configuration loading, validation, and management for runwire.
//!
//! Loads configuration from `~/.runwire/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use runwire_core::{EmitterOptions, RUN_ROOT, validate_name};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.runwire/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Emitter / dispatch settings
    #[serde(default)]
    pub emitter: EmitterConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Log every listener match at trace level
    #[serde(default)]
    pub trace_dispatch: bool,

    /// Warn once a registry holds more listeners than this (0 = unlimited)
    #[serde(default)]
    pub max_listeners: usize,

    /// Root segment for run lifecycle events
    #[serde(default = "default_root_namespace")]
    pub root_namespace: String,
}

fn default_root_namespace() -> String {
    RUN_ROOT.into()
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            trace_dispatch: false,
            max_listeners: 0,
            root_namespace: default_root_namespace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::ValidationError(format!(
                "unknown log format '{other}' (expected pretty or json)"
            ))),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Load configuration from the default path (~/.runwire/config.toml).
    ///
    /// Environment variables override the file:
    /// - `RUNWIRE_LOG_LEVEL`
    /// - `RUNWIRE_LOG_FORMAT`
    /// - `RUNWIRE_TRACE_DISPATCH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_overrides(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("RUNWIRE_LOG_LEVEL") {
            self.logging.level = level.to_ascii_lowercase();
        }

        if let Some(format) = lookup("RUNWIRE_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        if let Some(flag) = lookup("RUNWIRE_TRACE_DISPATCH") {
            self.emitter.trace_dispatch = match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "RUNWIRE_TRACE_DISPATCH must be a boolean, got '{other}'"
                    )));
                }
            };
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".runwire")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name(&self.emitter.root_namespace).map_err(|e| {
            ConfigError::ValidationError(format!("emitter.root_namespace: {e}"))
        })?;

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Options for root emitters built from this configuration.
    pub fn emitter_options(&self) -> EmitterOptions {
        EmitterOptions {
            trace_dispatch: self.emitter.trace_dispatch,
            max_listeners: self.emitter.max_listeners,
            root_namespace: self.emitter.root_namespace.clone(),
        }
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.emitter.root_namespace, "run");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: AppConfig = toml::from_str("[emitter]\nmax_listeners = 5\n").unwrap();
        assert_eq!(parsed.emitter.max_listeners, 5);
        assert_eq!(parsed.emitter.root_namespace, "run");
        assert_eq!(parsed.logging, LoggingConfig::default());
    }

    #[test]
    fn invalid_root_namespace_rejected() {
        let config = AppConfig {
            emitter: EmitterConfig {
                root_namespace: "my-run".into(),
                ..EmitterConfig::default()
            },
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("root_namespace"));
    }

    #[test]
    fn invalid_level_rejected() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("RUNWIRE_LOG_LEVEL", "DEBUG"),
                ("RUNWIRE_LOG_FORMAT", "json"),
                ("RUNWIRE_TRACE_DISPATCH", "on"),
            ]))
            .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.emitter.trace_dispatch);
    }

    #[test]
    fn bad_env_values_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(env(&[("RUNWIRE_LOG_FORMAT", "xml")])).is_err());
        assert!(config.apply_overrides(env(&[("RUNWIRE_TRACE_DISPATCH", "maybe")])).is_err());
    }

    #[test]
    fn emitter_options_follow_config() {
        let mut config = AppConfig::default();
        config.emitter.max_listeners = 10;
        config.emitter.trace_dispatch = true;
        config.emitter.root_namespace = "exec".into();
        let options = config.emitter_options();
        assert_eq!(options.max_listeners, 10);
        assert!(options.trace_dispatch);
        assert_eq!(options.root_namespace, "exec");
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[emitter]\ntrace_dispatch = true\n\n[logging]\nlevel = \"warn\"\nformat = \"json\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.emitter.trace_dispatch);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[emitter\nbroken").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_file_reports_validation_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[emitter]\nroot_namespace = \"a.b\"\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }
}

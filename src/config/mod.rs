//! Configuration management for docexport
//!
//! Settings come from a TOML file (by default `~/.docexport/config.toml`).
//! Every field has a default, so a missing file or a partial one is fine.
//! Command-line arguments take precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::export::{ExportOptions, Format};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export run configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Progress display configuration
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Export-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Format used when neither the command line nor the saved export names one
    #[serde(default = "default_format")]
    pub default_format: Format,

    /// Path separator for table tags and column names
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Maximum length of a header name
    #[serde(default = "default_max_column_size")]
    pub max_column_size: usize,

    /// Documents fetched per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Serve repeated filterless exports from the cache
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,

    /// Lifetime of cached exports in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Progress display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Show a progress bar during exports
    #[serde(default = "default_progress_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_format() -> Format {
    Format::Xlsx
}

fn default_separator() -> String {
    ".".to_string()
}

fn default_max_column_size() -> usize {
    crate::projection::names::DEFAULT_MAX_COLUMN_SIZE
}

fn default_batch_size() -> usize {
    crate::export::DEFAULT_BATCH_SIZE
}

fn default_use_cache() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

fn default_progress_enabled() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            separator: default_separator(),
            max_column_size: default_max_column_size(),
            batch_size: default_batch_size(),
            use_cache: default_use_cache(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: default_progress_enabled(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded and validated configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{} ({e})", path.display())))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFormat(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is missing
    ///
    /// # Arguments
    /// * `path` - Explicit configuration file, or `None` for [`Config::default_path`]
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docexport")
            .join("config.toml")
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, value: String| -> Result<()> {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value,
            }
            .into())
        };

        if self.export.separator.is_empty() {
            return invalid("export.separator", "empty separator".to_string());
        }
        if self.export.max_column_size == 0 {
            return invalid("export.max_column_size", "0".to_string());
        }
        if self.export.batch_size == 0 {
            return invalid("export.batch_size", "0".to_string());
        }
        if self.export.use_cache && self.export.cache_ttl_secs == 0 {
            return invalid("export.cache_ttl_secs", "0".to_string());
        }
        Ok(())
    }

    /// Coordinator options from the export section
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            separator: self.export.separator.clone(),
            batch_size: self.export.batch_size,
        }
    }

    /// Get cache lifetime as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.export.cache_ttl_secs)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.default_format, Format::Xlsx);
        assert_eq!(config.export.separator, ".");
        assert_eq!(config.export.max_column_size, 2000);
        assert_eq!(config.export.batch_size, 1000);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.progress.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [export]
            default_format = "csv"
            batch_size = 50

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.export.default_format, Format::Csv);
        assert_eq!(config.export.batch_size, 50);
        assert_eq!(config.export.cache_ttl_secs, 3600);
        assert_eq!(config.logging.level.to_tracing_level(), tracing::Level::DEBUG);
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.export.separator.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.max_column_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults_and_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let loaded = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(loaded.export.batch_size, 1000);

        let mut config = Config::default();
        config.export.separator = "/".to_string();
        config.save(&path).unwrap();
        assert_eq!(Config::load_from_file(Some(&path)).unwrap().export.separator, "/");

        std::fs::write(&path, "[export]\nbatch_size = 0\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_cache_ttl() {
        assert_eq!(Config::default().cache_ttl(), Duration::from_secs(3600));
    }
}

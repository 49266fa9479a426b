//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{AnalystError, Result};

/// Largest accepted telemetry upload (256 MiB)
pub const MAX_UPLOAD_BYTES_LIMIT: usize = 256 * 1024 * 1024;

/// Accepted values for `logging.level`
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telemetry upload configuration
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Session store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

/// Analysis report configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_enabled")]
    pub enabled: bool,

    #[serde(default = "default_report_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_report_format")]
    pub format: String,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_max_upload_bytes() -> usize { 64 * 1024 * 1024 }

fn default_max_sessions() -> usize { 1024 }
fn default_max_history_turns() -> usize { 50 }

fn default_report_enabled() -> bool { true }
fn default_report_dir() -> String { "./reports".to_string() }
fn default_max_records_per_file() -> usize { 1000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_report_format() -> String { "jsonl".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: default_report_enabled(),
            log_dir: default_report_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_report_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> AnalystError {
    AnalystError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uav_log_analyst::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.ingest.max_upload_bytes == 0 || self.ingest.max_upload_bytes > MAX_UPLOAD_BYTES_LIMIT {
            return Err(invalid(format!(
                "max_upload_bytes must be between 1 and {}",
                MAX_UPLOAD_BYTES_LIMIT
            )));
        }

        if self.session.max_sessions == 0 {
            return Err(invalid("max_sessions must be greater than 0"));
        }

        if self.session.max_history_turns == 0 {
            return Err(invalid("max_history_turns must be greater than 0"));
        }

        if self.report.enabled && self.report.log_dir.is_empty() {
            return Err(invalid("report log_dir cannot be empty when enabled"));
        }

        if self.report.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.report.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.report.format != "jsonl" {
            return Err(invalid("report format must be 'jsonl' (only supported format)"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "logging level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if matches!(&self.logging.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging log_dir cannot be empty when set"));
        }

        Ok(())
    }
}

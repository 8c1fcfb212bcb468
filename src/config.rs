//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pneumostats.toml` files.

use crate::analysis::{ExportRange, NoDataPolicy, TimeRange};
use crate::models::{MonthKey, TimelineBucket};
use crate::report::ExportColumns;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".pneumostats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Prediction/history API settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Session storage settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Statistics settings.
    #[serde(default)]
    pub statistics: StatisticsConfig,

    /// CSV export settings.
    #[serde(default)]
    pub export: ExportConfig,

    /// Image scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path. Empty means stdout.
    #[serde(default)]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of concurrent image uploads.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: String::new(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    60 // predictions on CPU can take a while
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path of the JSON session file.
    #[serde(default = "default_session_path")]
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> String {
    ".pneumostats-session.json".to_string()
}

/// Monthly figures shown when no real data is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceholderMonth {
    /// Month as `YYYY-MM`.
    pub month: MonthKey,
    #[serde(default)]
    pub analyses: usize,
    #[serde(default)]
    pub pneumonia: usize,
    #[serde(default)]
    pub high_confidence: usize,
    #[serde(default)]
    pub average_probability: f64,
}

impl PlaceholderMonth {
    pub fn to_bucket(&self) -> TimelineBucket {
        TimelineBucket {
            month_key: self.month,
            month_label: self.month.label(),
            analysis_count: self.analyses,
            pneumonia_count: self.pneumonia,
            high_confidence_count: self.high_confidence,
            average_probability: crate::analysis::round1(self.average_probability),
            precision_rate: crate::analysis::percentage(self.high_confidence, self.analyses),
        }
    }
}

/// Statistics settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Default time range.
    #[serde(default)]
    pub time_range: TimeRange,

    /// Emit empty buckets for months without analyses.
    #[serde(default)]
    pub fill_gaps: bool,

    /// Behavior when the time range holds no analyses.
    #[serde(default)]
    pub no_data: NoDataPolicy,

    /// Placeholder months used by `no_data = "placeholder"`.
    #[serde(default)]
    pub placeholder: Vec<PlaceholderMonth>,
}

/// CSV export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Export date range.
    #[serde(default)]
    pub date_range: ExportRange,

    /// Included columns.
    #[serde(default)]
    pub columns: ExportColumns,
}

/// Image scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Maximum images per upload batch.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Image extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Names to exclude.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Maximum image size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            extensions: default_extensions(),
            excludes: Vec::new(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_max_files() -> usize {
    500
}

fn default_extensions() -> Vec<String> {
    vec!["png", "jpg", "jpeg"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref path) = args.session {
            self.session.path = path.display().to_string();
        }

        if let Some(range) = args.range {
            self.statistics.time_range = range.into();
        }
        if args.fill_gaps {
            self.statistics.fill_gaps = true;
        }

        if let Some(range) = args.export_range {
            self.export.date_range = range.into();
        }
        if let Some(ref columns) = args.columns {
            self.export.columns = crate::cli::columns_from_args(columns);
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and conversion into domain types.

use crate::analysis::{ExportRange, TimeRange};
use crate::models::Verdict;
use crate::report::ExportColumns;
use clap::Parser;
use std::path::PathBuf;

/// PneumoStats - statistics for chest X-ray pneumonia analyses
///
/// Fetch your analysis history from the prediction API, compute detection
/// statistics and export them as Markdown, JSON or CSV. Can also log in
/// and submit a folder of X-ray images for classification.
///
/// Examples:
///   pneumostats --login dr.martin
///   pneumostats --register dr.martin --first-name Claire --last-name Martin --email c@example.org
///   pneumostats --update-profile --last-name Dubois
///   pneumostats --range last-year --output stats.md
///   pneumostats --format csv --columns date,file,verdict --export-range month
///   pneumostats --input history.json --format json
///   pneumostats --upload ./scans
///   pneumostats --format text --record 42
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Read history from a JSON file instead of the API
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Base URL of the prediction/history API
    #[arg(long, value_name = "URL", env = "PNEUMOSTATS_API_URL")]
    pub api_url: Option<String>,

    /// Output file path (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pneumostats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the session file
    #[arg(long, value_name = "FILE")]
    pub session: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Time range for statistics
    #[arg(long, value_name = "RANGE")]
    pub range: Option<RangeArg>,

    /// Emit empty months in the timeline
    #[arg(long)]
    pub fill_gaps: bool,

    /// Columns to include in CSV exports (comma-separated)
    ///
    /// Example: --columns date,file,verdict
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    pub columns: Option<Vec<ColumnArg>>,

    /// Date range for CSV exports
    #[arg(long, value_name = "RANGE")]
    pub export_range: Option<ExportRangeArg>,

    /// Only export files whose name contains this text
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Only export analyses with this verdict
    #[arg(long, value_name = "VERDICT")]
    pub verdict: Option<VerdictArg>,

    /// Analysis id for the single-analysis text report
    #[arg(long, value_name = "ID")]
    pub record: Option<String>,

    /// Log in with this username and store the session
    #[arg(long, value_name = "USER")]
    pub login: Option<String>,

    /// Password for --login and --register, current password for --change-password
    #[arg(long, env = "PNEUMOSTATS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Create an account with this username and store the session
    #[arg(long, value_name = "USER", conflicts_with = "login")]
    pub register: Option<String>,

    /// First name for --register or --update-profile
    #[arg(long, value_name = "NAME")]
    pub first_name: Option<String>,

    /// Last name for --register or --update-profile
    #[arg(long, value_name = "NAME")]
    pub last_name: Option<String>,

    /// Email for --register or --update-profile
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<String>,

    /// Update the logged-in user's name and email
    #[arg(long)]
    pub update_profile: bool,

    /// Change the logged-in user's password
    #[arg(long)]
    pub change_password: bool,

    /// New password for --change-password
    #[arg(long, env = "PNEUMOSTATS_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: Option<String>,

    /// Clear the stored session
    #[arg(long, conflicts_with = "login")]
    pub logout: bool,

    /// Submit every image in this directory for classification
    #[arg(long, value_name = "DIR")]
    pub upload: Option<PathBuf>,

    /// Number of concurrent uploads
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Exit with code 2 if any history record had to be skipped
    #[arg(long)]
    pub fail_on_skipped: bool,

    /// Generate a default .pneumostats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown statistics report (default)
    #[default]
    Markdown,
    /// JSON statistics export
    Json,
    /// CSV history export
    Csv,
    /// Text report for one analysis (needs --record)
    Text,
}

/// Statistics time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RangeArg {
    All,
    #[value(name = "last-6-months")]
    LastSixMonths,
    #[value(name = "last-year")]
    LastYear,
}

impl From<RangeArg> for TimeRange {
    fn from(arg: RangeArg) -> Self {
        match arg {
            RangeArg::All => TimeRange::All,
            RangeArg::LastSixMonths => TimeRange::LastSixMonths,
            RangeArg::LastYear => TimeRange::LastYear,
        }
    }
}

/// CSV export date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportRangeArg {
    All,
    Week,
    Month,
    Year,
}

impl From<ExportRangeArg> for ExportRange {
    fn from(arg: ExportRangeArg) -> Self {
        match arg {
            ExportRangeArg::All => ExportRange::All,
            ExportRangeArg::Week => ExportRange::Week,
            ExportRangeArg::Month => ExportRange::Month,
            ExportRangeArg::Year => ExportRange::Year,
        }
    }
}

/// CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColumnArg {
    Date,
    File,
    Verdict,
    Probability,
    Confidence,
}

/// Verdict filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VerdictArg {
    #[value(alias = "pneumonia")]
    Positive,
    #[value(alias = "normal")]
    Negative,
}

impl From<VerdictArg> for Verdict {
    fn from(arg: VerdictArg) -> Self {
        match arg {
            VerdictArg::Positive => Verdict::Positive,
            VerdictArg::Negative => Verdict::Negative,
        }
    }
}

/// Build export column flags from the columns named on the command line.
pub fn columns_from_args(columns: &[ColumnArg]) -> ExportColumns {
    let mut flags = ExportColumns::none();
    for column in columns {
        match column {
            ColumnArg::Date => flags.date = true,
            ColumnArg::File => flags.file_name = true,
            ColumnArg::Verdict => flags.verdict = true,
            ColumnArg::Probability => flags.probability = true,
            ColumnArg::Confidence => flags.confidence = true,
        }
    }
    flags
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.login.is_some() && self.password.as_deref().unwrap_or("").is_empty() {
            return Err(
                "--login needs a password (--password or PNEUMOSTATS_PASSWORD)".to_string(),
            );
        }

        if self.register.is_some() {
            if self.password.as_deref().unwrap_or("").is_empty() {
                return Err(
                    "--register needs a password (--password or PNEUMOSTATS_PASSWORD)"
                        .to_string(),
                );
            }
            if self.first_name.is_none() || self.last_name.is_none() || self.email.is_none() {
                return Err(
                    "--register needs --first-name, --last-name and --email".to_string(),
                );
            }
        }

        if self.update_profile
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
        {
            return Err(
                "--update-profile needs --first-name, --last-name or --email".to_string(),
            );
        }

        if self.change_password
            && (self.password.as_deref().unwrap_or("").is_empty()
                || self.new_password.as_deref().unwrap_or("").is_empty())
        {
            return Err(
                "--change-password needs --password (current) and --new-password".to_string(),
            );
        }

        if let Some(ref email) = self.email {
            if !email.contains('@') {
                return Err(format!("Invalid email address: {}", email));
            }
        }

        if self.format == OutputFormat::Text && self.record.is_none() {
            return Err("--format text requires --record <ID>".to_string());
        }

        if let Some(ref columns) = self.columns {
            if columns.is_empty() {
                return Err("--columns must name at least one column".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if let Some(ref dir) = self.upload {
            if !dir.is_dir() {
                return Err(format!("Upload path is not a directory: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `default_verbose` comes from the config file; `--quiet` wins over it.
    pub fn log_level(&self, default_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || default_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

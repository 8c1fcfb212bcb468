//! Data models for the analysis statistics tool.
//!
//! This module contains the core data structures used throughout
//! the application: analysis records as received from the prediction
//! API, their normalized form, and the derived statistics.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an analysis record.
///
/// The API uses integers, but older exports carry string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Classification outcome of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Signs of pneumonia present.
    Positive,
    /// No signs of pneumonia.
    Negative,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Positive => write!(f, "positive"),
            Verdict::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for Verdict {
    type Err = ();

    /// Case-insensitive; `pneumonia` and `normal` are aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "pneumonia" => Ok(Verdict::Positive),
            "negative" | "normal" => Ok(Verdict::Negative),
            _ => Err(()),
        }
    }
}

impl Verdict {
    /// Label shown to clinicians in exports.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Positive => "Pneumonie",
            Verdict::Negative => "Normal",
        }
    }
}

/// Reliability label attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

impl FromStr for Confidence {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            _ => Err(()),
        }
    }
}

impl Confidence {
    /// Label shown to clinicians in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Confidence::High => "Élevée",
            Confidence::Medium => "Moyenne",
            Confidence::Low => "Faible",
        }
    }
}

/// An analysis record exactly as the history endpoint returns it.
///
/// Values are kept loosely typed so that one malformed entry does not
/// make the whole history unreadable; see `analysis::normalize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: RecordId,
    #[serde(default, alias = "fileName")]
    pub file_name: String,
    #[serde(default)]
    pub verdict: String,
    #[serde(default)]
    pub probability: serde_json::Value,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A validated analysis record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Opaque identifier assigned by the API.
    pub id: RecordId,
    /// Original name of the analyzed image.
    #[serde(alias = "file_name")]
    pub file_name: String,
    /// Normalized verdict.
    pub verdict: Verdict,
    /// Probability in percent, within [0, 100].
    pub probability: f64,
    /// Normalized confidence level.
    pub confidence: Confidence,
    /// Time of the analysis, in local wall-clock time.
    pub timestamp: NaiveDateTime,
}

impl AnalysisRecord {
    /// Calendar month this record belongs to.
    pub fn month_key(&self) -> MonthKey {
        MonthKey::new(self.timestamp.year(), self.timestamp.month())
    }
}

/// A raw record rejected during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: String,
}

/// Count of records per confidence level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ConfidenceDistribution {
    /// Count for a single level.
    pub fn get(&self, level: Confidence) -> usize {
        match level {
            Confidence::High => self.high,
            Confidence::Medium => self.medium,
            Confidence::Low => self.low,
        }
    }

    pub fn record(&mut self, level: Confidence) {
        match level {
            Confidence::High => self.high += 1,
            Confidence::Medium => self.medium += 1,
            Confidence::Low => self.low += 1,
        }
    }
}

/// Headline metrics over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub total_analyses: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    /// Percentage of positive verdicts, one decimal.
    pub detection_rate: f64,
    /// Mean probability, one decimal.
    pub average_probability: f64,
    pub confidence_distribution: ConfidenceDistribution,
}

const MONTH_NAMES: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    /// 1-based month.
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Human-readable label, e.g. `janvier 2024`.
    pub fn label(&self) -> String {
        let name = MONTH_NAMES
            .get(self.month.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("?");
        format!("{} {}", name, self.year)
    }

    /// The following calendar month.
    pub fn succ(&self) -> Self {
        if self.month >= 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in '{}'", s));
        }
        Ok(Self::new(year, month))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Aggregated figures for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    pub month_key: MonthKey,
    pub month_label: String,
    pub analysis_count: usize,
    pub pneumonia_count: usize,
    pub high_confidence_count: usize,
    /// Mean probability within the month, one decimal.
    pub average_probability: f64,
    /// Share of high-confidence analyses, one decimal.
    pub precision_rate: f64,
}

impl TimelineBucket {
    /// A month with no analyses.
    pub fn empty(month_key: MonthKey) -> Self {
        Self {
            month_key,
            month_label: month_key.label(),
            analysis_count: 0,
            pneumonia_count: 0,
            high_confidence_count: 0,
            average_probability: 0.0,
            precision_rate: 0.0,
        }
    }
}

/// One slice of the verdict distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSlice {
    pub name: String,
    pub verdict: Verdict,
    pub value: usize,
    /// Share of the total, one decimal.
    pub percentage: f64,
}

/// Metadata about a generated statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Where the records came from (API URL or input file).
    pub source: String,
    pub generated_at: DateTime<Utc>,
    /// Active time-range selector.
    pub time_range: String,
    /// Records received before normalization.
    pub records_received: usize,
    /// Records rejected by normalization.
    pub records_skipped: usize,
    /// True when the timeline holds configured placeholder figures.
    pub placeholder_timeline: bool,
}

/// The complete statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub metadata: ReportMetadata,
    pub summary: SummaryMetrics,
    pub distribution: Vec<DistributionSlice>,
    pub timeline: Vec<TimelineBucket>,
    pub skipped: Vec<SkippedRecord>,
    pub detailed_analyses: Vec<AnalysisRecord>,
}

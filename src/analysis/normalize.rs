//! Validation of raw history records.
//!
//! Every raw record either becomes an [`AnalysisRecord`] or is skipped
//! with a reason. Nothing is silently coerced into a bucket.

use crate::models::{AnalysisRecord, Confidence, RawRecord, SkippedRecord, Verdict};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Reason a raw record was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("unknown verdict '{0}'")]
    UnknownVerdict(String),

    #[error("unknown confidence '{0}'")]
    UnknownConfidence(String),

    #[error("probability is not a number: {0}")]
    InvalidProbability(String),

    #[error("probability {0} is outside [0, 100]")]
    ProbabilityOutOfRange(f64),

    #[error("unparsable timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Result of normalizing a batch of raw records.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<AnalysisRecord>,
    pub skipped: Vec<SkippedRecord>,
}

impl TryFrom<&RawRecord> for AnalysisRecord {
    type Error = RecordError;

    fn try_from(raw: &RawRecord) -> Result<Self, Self::Error> {
        let verdict: Verdict = raw
            .verdict
            .parse()
            .map_err(|_| RecordError::UnknownVerdict(raw.verdict.clone()))?;
        let confidence: Confidence = raw
            .confidence
            .parse()
            .map_err(|_| RecordError::UnknownConfidence(raw.confidence.clone()))?;

        Ok(AnalysisRecord {
            id: raw.id.clone(),
            file_name: raw.file_name.clone(),
            verdict,
            probability: parse_probability(&raw.probability)?,
            confidence,
            timestamp: parse_timestamp(&raw.timestamp)?,
        })
    }
}

/// Normalize every record, collecting the ones that fail.
pub fn normalize_records(raw: &[RawRecord]) -> Normalized {
    let mut normalized = Normalized::default();

    for record in raw {
        match AnalysisRecord::try_from(record) {
            Ok(valid) => normalized.records.push(valid),
            Err(e) => {
                debug!("Skipping record {}: {}", record.id, e);
                normalized.skipped.push(SkippedRecord {
                    id: record.id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !normalized.skipped.is_empty() {
        warn!(
            "Skipped {} of {} records with invalid fields",
            normalized.skipped.len(),
            raw.len()
        );
    }

    normalized
}

/// Accepts JSON numbers and numeric strings (optionally suffixed with `%`).
fn parse_probability(value: &Value) -> Result<f64, RecordError> {
    let probability = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| RecordError::InvalidProbability(n.to_string()))?,
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(|_| RecordError::InvalidProbability(s.clone()))?,
        other => return Err(RecordError::InvalidProbability(other.to_string())),
    };

    if !probability.is_finite() {
        return Err(RecordError::InvalidProbability(probability.to_string()));
    }
    if !(0.0..=100.0).contains(&probability) {
        return Err(RecordError::ProbabilityOutOfRange(probability));
    }

    Ok(probability)
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp into local wall-clock time.
///
/// Timestamps carrying an offset are converted to the local zone;
/// naive timestamps are taken as already local.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, RecordError> {
    let trimmed = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| RecordError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;
    use serde_json::json;

    fn raw(verdict: &str, probability: Value, confidence: &str, timestamp: &str) -> RawRecord {
        RawRecord {
            id: RecordId::Number(1),
            file_name: "xray.png".to_string(),
            verdict: verdict.to_string(),
            probability,
            confidence: confidence.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn test_valid_record() {
        let record =
            AnalysisRecord::try_from(&raw("Pneumonia", json!(82), "HIGH", "2024-01-10T09:00:00"))
                .unwrap();
        assert_eq!(record.verdict, Verdict::Positive);
        assert_eq!(record.confidence, Confidence::High);
        assert_eq!(record.probability, 82.0);
        assert_eq!(
            record.timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 10)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_unknown_verdict_is_rejected() {
        let err = AnalysisRecord::try_from(&raw("unclear", json!(50), "low", "2024-01-10"))
            .unwrap_err();
        assert_eq!(err, RecordError::UnknownVerdict("unclear".to_string()));
    }

    #[test]
    fn test_unknown_confidence_is_rejected() {
        let err = AnalysisRecord::try_from(&raw("normal", json!(50), "certain", "2024-01-10"))
            .unwrap_err();
        assert_eq!(err, RecordError::UnknownConfidence("certain".to_string()));
    }

    #[test]
    fn test_probability_forms() {
        assert_eq!(parse_probability(&json!(12.5)), Ok(12.5));
        assert_eq!(parse_probability(&json!("67")), Ok(67.0));
        assert_eq!(parse_probability(&json!("67.5 %")), Ok(67.5));
        assert!(matches!(
            parse_probability(&json!("high")),
            Err(RecordError::InvalidProbability(_))
        ));
        assert!(matches!(
            parse_probability(&Value::Null),
            Err(RecordError::InvalidProbability(_))
        ));
        assert_eq!(
            parse_probability(&json!(100.5)),
            Err(RecordError::ProbabilityOutOfRange(100.5))
        );
        assert_eq!(
            parse_probability(&json!(-1)),
            Err(RecordError::ProbabilityOutOfRange(-1.0))
        );
    }

    #[test]
    fn test_timestamp_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 3)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-02-03T14:05:00"), Ok(expected));
        assert_eq!(parse_timestamp("2024-02-03 14:05:00.000"), Ok(expected));
        assert_eq!(parse_timestamp("2024-02-03T14:05"), Ok(expected));
        assert!(parse_timestamp("2024-02-03T14:05:00+00:00").is_ok());
        assert_eq!(
            parse_timestamp("2024-02-03"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 3)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap())
        );
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(RecordError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_normalize_reports_skipped() {
        let batch = vec![
            raw("positive", json!(80), "high", "2024-01-01T00:00:00"),
            raw("??", json!(80), "high", "2024-01-01T00:00:00"),
            raw("normal", json!("n/a"), "low", "2024-01-01T00:00:00"),
            raw("normal", json!(10), "low", "not a date"),
        ];

        let normalized = normalize_records(&batch);

        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.skipped.len(), 3);
        assert!(normalized.skipped[0].reason.contains("verdict"));
        assert!(normalized.skipped[1].reason.contains("not a number"));
        assert!(normalized.skipped[2].reason.contains("timestamp"));
    }

    #[test]
    fn test_normalize_empty() {
        let normalized = normalize_records(&[]);
        assert!(normalized.records.is_empty());
        assert!(normalized.skipped.is_empty());
    }
}

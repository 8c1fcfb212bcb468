//! Record selection: time windows and history search.

use crate::models::{AnalysisRecord, Verdict};
use chrono::{Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time window applied before computing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "all")]
    All,
    #[default]
    #[serde(rename = "last-6-months")]
    LastSixMonths,
    #[serde(rename = "last-year")]
    LastYear,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::All => write!(f, "all"),
            TimeRange::LastSixMonths => write!(f, "last-6-months"),
            TimeRange::LastYear => write!(f, "last-year"),
        }
    }
}

impl TimeRange {
    /// Earliest included timestamp, or `None` for no lower bound.
    ///
    /// Subtraction is calendar-aware: six months before August 31 is
    /// the last day of February.
    pub fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeRange::All => None,
            TimeRange::LastSixMonths => now.checked_sub_months(Months::new(6)),
            TimeRange::LastYear => now.checked_sub_months(Months::new(12)),
        }
    }
}

/// Time window applied to CSV exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportRange {
    #[default]
    All,
    Week,
    Month,
    Year,
}

impl ExportRange {
    pub fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            ExportRange::All => None,
            ExportRange::Week => now.checked_sub_signed(Duration::days(7)),
            ExportRange::Month => now.checked_sub_months(Months::new(1)),
            ExportRange::Year => now.checked_sub_months(Months::new(12)),
        }
    }
}

/// Keep records at or after `cutoff`. `None` keeps everything.
fn since(records: &[AnalysisRecord], cutoff: Option<NaiveDateTime>) -> Vec<AnalysisRecord> {
    match cutoff {
        None => records.to_vec(),
        Some(cutoff) => records
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect(),
    }
}

/// Select the records that fall inside a statistics time range.
pub fn filter_by_range(
    records: &[AnalysisRecord],
    range: TimeRange,
    now: NaiveDateTime,
) -> Vec<AnalysisRecord> {
    since(records, range.cutoff(now))
}

/// Select the records that fall inside an export time range.
pub fn filter_for_export(
    records: &[AnalysisRecord],
    range: ExportRange,
    now: NaiveDateTime,
) -> Vec<AnalysisRecord> {
    since(records, range.cutoff(now))
}

/// Search criteria from the history view.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Case-insensitive substring of the file name.
    pub search: Option<String>,
    pub verdict: Option<Verdict>,
}

impl HistoryFilter {
    pub fn matches(&self, record: &AnalysisRecord) -> bool {
        if let Some(ref term) = self.search {
            if !record
                .file_name
                .to_lowercase()
                .contains(&term.to_lowercase())
            {
                return false;
            }
        }

        self.verdict.map_or(true, |v| record.verdict == v)
    }

    pub fn apply(&self, records: &[AnalysisRecord]) -> Vec<AnalysisRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, RecordId};
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn record(name: &str, verdict: Verdict, timestamp: NaiveDateTime) -> AnalysisRecord {
        AnalysisRecord {
            id: RecordId::Text(name.to_string()),
            file_name: name.to_string(),
            verdict,
            probability: 50.0,
            confidence: Confidence::Medium,
            timestamp,
        }
    }

    #[test]
    fn test_cutoff_is_calendar_aware() {
        let now = at(2024, 8, 31);
        assert_eq!(TimeRange::LastSixMonths.cutoff(now), Some(at(2024, 2, 29)));
        assert_eq!(TimeRange::LastYear.cutoff(now), Some(at(2023, 8, 31)));
        assert_eq!(TimeRange::All.cutoff(now), None);
    }

    #[test]
    fn test_export_cutoffs() {
        let now = at(2024, 3, 31);
        assert_eq!(ExportRange::Week.cutoff(now), Some(at(2024, 3, 24)));
        assert_eq!(ExportRange::Month.cutoff(now), Some(at(2024, 2, 29)));
        assert_eq!(ExportRange::Year.cutoff(now), Some(at(2023, 3, 31)));
        assert_eq!(ExportRange::All.cutoff(now), None);
    }

    #[test]
    fn test_filter_by_range() {
        let now = at(2024, 7, 15);
        let records = vec![
            record("old.png", Verdict::Positive, at(2023, 6, 1)),
            record("edge.png", Verdict::Negative, at(2024, 1, 15)),
            record("recent.png", Verdict::Positive, at(2024, 7, 1)),
        ];

        let six = filter_by_range(&records, TimeRange::LastSixMonths, now);
        let names: Vec<_> = six.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["edge.png", "recent.png"]);

        assert_eq!(filter_by_range(&records, TimeRange::LastYear, now).len(), 2);
        assert_eq!(filter_by_range(&records, TimeRange::All, now).len(), 3);
    }

    #[test]
    fn test_filter_empty_input() {
        assert!(filter_by_range(&[], TimeRange::LastYear, at(2024, 1, 1)).is_empty());
        assert!(filter_for_export(&[], ExportRange::Week, at(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_history_filter() {
        let records = vec![
            record("Chest_AP.png", Verdict::Positive, at(2024, 1, 1)),
            record("chest_lateral.png", Verdict::Negative, at(2024, 1, 2)),
            record("knee.png", Verdict::Negative, at(2024, 1, 3)),
        ];

        let by_name = HistoryFilter {
            search: Some("CHEST".to_string()),
            verdict: None,
        };
        assert_eq!(by_name.apply(&records).len(), 2);

        let by_both = HistoryFilter {
            search: Some("chest".to_string()),
            verdict: Some(Verdict::Negative),
        };
        let matched = by_both.apply(&records);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].file_name, "chest_lateral.png");

        assert_eq!(HistoryFilter::default().apply(&records).len(), 3);
    }
}

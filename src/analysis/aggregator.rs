//! Statistics aggregation over analysis records.
//!
//! This module turns a list of validated records into the summary
//! metrics, verdict distribution and monthly timeline shown in reports.
//! Every function here is pure: same input, same output.

use crate::analysis::filter::{filter_by_range, TimeRange};
use crate::models::{
    AnalysisRecord, Confidence, ConfidenceDistribution, DistributionSlice, MonthKey,
    SummaryMetrics, TimelineBucket, Verdict,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round half away from zero to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / total * 100`, rounded; zero when `total` is zero.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round1(sum / count as f64)
}

/// Compute headline metrics for a set of records.
pub fn compute_summary(records: &[AnalysisRecord]) -> SummaryMetrics {
    let mut positive_count = 0;
    let mut probability_sum = 0.0;
    let mut confidence_distribution = ConfidenceDistribution::default();

    for record in records {
        if record.verdict == Verdict::Positive {
            positive_count += 1;
        }
        probability_sum += record.probability;
        confidence_distribution.record(record.confidence);
    }

    let total = records.len();

    SummaryMetrics {
        total_analyses: total,
        positive_count,
        negative_count: total - positive_count,
        detection_rate: percentage(positive_count, total),
        average_probability: mean(probability_sum, total),
        confidence_distribution,
    }
}

#[derive(Default)]
struct MonthAccumulator {
    analyses: usize,
    pneumonia: usize,
    high_confidence: usize,
    probability_sum: f64,
}

/// Group records by calendar month, oldest month first.
///
/// Months without records are not emitted; see [`fill_timeline_gaps`].
pub fn compute_timeline(records: &[AnalysisRecord]) -> Vec<TimelineBucket> {
    let mut months: BTreeMap<MonthKey, MonthAccumulator> = BTreeMap::new();

    for record in records {
        let acc = months.entry(record.month_key()).or_default();
        acc.analyses += 1;
        acc.probability_sum += record.probability;
        if record.verdict == Verdict::Positive {
            acc.pneumonia += 1;
        }
        if record.confidence == Confidence::High {
            acc.high_confidence += 1;
        }
    }

    months
        .into_iter()
        .map(|(key, acc)| TimelineBucket {
            month_key: key,
            month_label: key.label(),
            analysis_count: acc.analyses,
            pneumonia_count: acc.pneumonia,
            high_confidence_count: acc.high_confidence,
            average_probability: mean(acc.probability_sum, acc.analyses),
            precision_rate: percentage(acc.high_confidence, acc.analyses),
        })
        .collect()
}

/// Insert zero buckets for months missing between the first and last bucket.
///
/// Expects a timeline sorted by month, as produced by [`compute_timeline`].
pub fn fill_timeline_gaps(timeline: &[TimelineBucket]) -> Vec<TimelineBucket> {
    let (Some(first), Some(last)) = (timeline.first(), timeline.last()) else {
        return Vec::new();
    };

    let mut filled = Vec::new();
    let mut existing = timeline.iter().peekable();
    let mut month = first.month_key;

    while month <= last.month_key {
        match existing.peek() {
            Some(bucket) if bucket.month_key == month => {
                filled.push((*bucket).clone());
                existing.next();
            }
            _ => filled.push(TimelineBucket::empty(month)),
        }
        month = month.succ();
    }

    filled
}

/// Normal vs pneumonia slices for the distribution chart.
pub fn verdict_distribution(summary: &SummaryMetrics) -> Vec<DistributionSlice> {
    vec![
        DistributionSlice {
            name: "Normal".to_string(),
            verdict: Verdict::Negative,
            value: summary.negative_count,
            percentage: percentage(summary.negative_count, summary.total_analyses),
        },
        DistributionSlice {
            name: "Pneumonie".to_string(),
            verdict: Verdict::Positive,
            value: summary.positive_count,
            percentage: percentage(summary.positive_count, summary.total_analyses),
        },
    ]
}

/// What the timeline shows when no record falls inside the time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoDataPolicy {
    /// Show an empty timeline.
    #[default]
    Empty,
    /// Show the configured placeholder months.
    Placeholder,
}

/// Options that shape the computed statistics.
#[derive(Debug, Clone, Default)]
pub struct StatisticsOptions {
    pub time_range: TimeRange,
    pub fill_gaps: bool,
    pub no_data: NoDataPolicy,
    pub placeholder: Vec<TimelineBucket>,
}

impl From<&crate::config::StatisticsConfig> for StatisticsOptions {
    fn from(config: &crate::config::StatisticsConfig) -> Self {
        Self {
            time_range: config.time_range,
            fill_gaps: config.fill_gaps,
            no_data: config.no_data,
            placeholder: config.placeholder.iter().map(|p| p.to_bucket()).collect(),
        }
    }
}

/// All derived figures for one statistics view.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Records inside the time range.
    pub records: Vec<AnalysisRecord>,
    pub summary: SummaryMetrics,
    pub distribution: Vec<DistributionSlice>,
    pub timeline: Vec<TimelineBucket>,
    /// True when `timeline` holds placeholder figures, not real data.
    pub placeholder_timeline: bool,
}

/// Filter, then compute every derived figure in one pass over the options.
pub fn compute_statistics(
    records: &[AnalysisRecord],
    options: &StatisticsOptions,
    now: NaiveDateTime,
) -> Statistics {
    let filtered = filter_by_range(records, options.time_range, now);
    let summary = compute_summary(&filtered);
    let distribution = verdict_distribution(&summary);

    let mut timeline = compute_timeline(&filtered);
    if options.fill_gaps {
        timeline = fill_timeline_gaps(&timeline);
    }

    let placeholder_timeline = filtered.is_empty()
        && options.no_data == NoDataPolicy::Placeholder
        && !options.placeholder.is_empty();
    if placeholder_timeline {
        timeline = options.placeholder.clone();
        timeline.sort_by_key(|b| b.month_key);
    }

    Statistics {
        records: filtered,
        summary,
        distribution,
        timeline,
        placeholder_timeline,
    }
}

/// Generate a plain-text summary of the metrics.
pub fn generate_summary_text(summary: &SummaryMetrics) -> String {
    let dist = &summary.confidence_distribution;
    let mut lines = Vec::new();

    lines.push(format!("Total analyses: {}", summary.total_analyses));
    lines.push(format!(
        "- Pneumonia detected: {} ({:.1}%)",
        summary.positive_count, summary.detection_rate
    ));
    lines.push(format!("- Normal: {}", summary.negative_count));
    lines.push(format!(
        "- Average probability: {:.1}%",
        summary.average_probability
    ));
    lines.push(format!(
        "- Confidence: high {} | medium {} | low {}",
        dist.high, dist.medium, dist.low
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn create_test_record(
        verdict: Verdict,
        probability: f64,
        confidence: Confidence,
        year: i32,
        month: u32,
    ) -> AnalysisRecord {
        AnalysisRecord {
            id: RecordId::Number(0),
            file_name: "xray.png".to_string(),
            verdict,
            probability,
            confidence,
            timestamp: NaiveDate::from_ymd_opt(year, month, 10)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
        }
    }

    fn scenario() -> Vec<AnalysisRecord> {
        vec![
            create_test_record(Verdict::Positive, 82.0, Confidence::High, 2024, 1),
            create_test_record(Verdict::Negative, 12.0, Confidence::Low, 2024, 1),
            create_test_record(Verdict::Positive, 67.0, Confidence::Medium, 2024, 2),
        ]
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(53.666_666), 53.7);
        assert_eq!(round1(0.05), 0.1);
        assert_eq!(round1(-0.25), -0.3);
        assert_eq!(round1(50.0), 50.0);
    }

    #[test]
    fn test_summary_scenario() {
        let summary = compute_summary(&scenario());

        assert_eq!(summary.total_analyses, 3);
        assert_eq!(summary.positive_count, 2);
        assert_eq!(summary.negative_count, 1);
        assert_eq!(summary.detection_rate, 66.7);
        assert_eq!(summary.average_probability, 53.7);
        assert_eq!(summary.confidence_distribution.high, 1);
        assert_eq!(summary.confidence_distribution.medium, 1);
        assert_eq!(summary.confidence_distribution.low, 1);
    }

    #[test]
    fn test_timeline_scenario() {
        let timeline = compute_timeline(&scenario());

        assert_eq!(timeline.len(), 2);

        let jan = &timeline[0];
        assert_eq!(jan.month_key, MonthKey::new(2024, 1));
        assert_eq!(jan.month_label, "janvier 2024");
        assert_eq!(jan.analysis_count, 2);
        assert_eq!(jan.pneumonia_count, 1);
        assert_eq!(jan.high_confidence_count, 1);
        assert_eq!(jan.average_probability, 47.0);
        assert_eq!(jan.precision_rate, 50.0);

        let feb = &timeline[1];
        assert_eq!(feb.month_key, MonthKey::new(2024, 2));
        assert_eq!(feb.analysis_count, 1);
        assert_eq!(feb.pneumonia_count, 1);
        assert_eq!(feb.high_confidence_count, 0);
        assert_eq!(feb.precision_rate, 0.0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.total_analyses, 0);
        assert_eq!(summary.detection_rate, 0.0);
        assert_eq!(summary.average_probability, 0.0);
        assert!(!summary.detection_rate.is_nan());
        assert!(compute_timeline(&[]).is_empty());
    }

    #[test]
    fn test_alias_records_count_the_same() {
        let raw = |verdict: &str| crate::models::RawRecord {
            id: RecordId::Number(1),
            file_name: "a.png".to_string(),
            verdict: verdict.to_string(),
            probability: serde_json::json!(90),
            confidence: "high".to_string(),
            timestamp: "2024-03-01T10:00:00".to_string(),
        };
        let aliased = crate::analysis::normalize_records(&[raw("Pneumonia")]);
        let canonical = crate::analysis::normalize_records(&[raw("positive")]);

        assert_eq!(
            compute_summary(&aliased.records),
            compute_summary(&canonical.records)
        );
        assert_eq!(compute_summary(&aliased.records).positive_count, 1);
    }

    #[test]
    fn test_timeline_ignores_label_order() {
        // "décembre 2023" sorts after "avril 2024" as a string.
        let records = vec![
            create_test_record(Verdict::Negative, 10.0, Confidence::Low, 2024, 4),
            create_test_record(Verdict::Negative, 10.0, Confidence::Low, 2023, 12),
        ];
        let timeline = compute_timeline(&records);
        assert_eq!(timeline[0].month_label, "décembre 2023");
        assert_eq!(timeline[1].month_label, "avril 2024");
    }

    #[test]
    fn test_fill_timeline_gaps() {
        let records = vec![
            create_test_record(Verdict::Positive, 80.0, Confidence::High, 2023, 11),
            create_test_record(Verdict::Negative, 20.0, Confidence::Low, 2024, 2),
        ];
        let filled = fill_timeline_gaps(&compute_timeline(&records));

        let keys: Vec<String> = filled.iter().map(|b| b.month_key.to_string()).collect();
        assert_eq!(keys, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(filled[1].analysis_count, 0);
        assert_eq!(filled[1].precision_rate, 0.0);
        assert_eq!(filled[3].analysis_count, 1);

        assert!(fill_timeline_gaps(&[]).is_empty());
    }

    #[test]
    fn test_verdict_distribution() {
        let slices = verdict_distribution(&compute_summary(&scenario()));
        assert_eq!(slices[0].verdict, Verdict::Negative);
        assert_eq!(slices[0].value, 1);
        assert_eq!(slices[0].percentage, 33.3);
        assert_eq!(slices[1].value, 2);
        assert_eq!(slices[1].percentage, 66.7);
    }

    #[test]
    fn test_compute_statistics_placeholder_policy() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut placeholder = TimelineBucket::empty(MonthKey::new(2024, 5));
        placeholder.analysis_count = 40;

        let mut options = StatisticsOptions {
            time_range: TimeRange::LastSixMonths,
            fill_gaps: false,
            no_data: NoDataPolicy::Empty,
            placeholder: vec![placeholder],
        };

        let stats = compute_statistics(&[], &options, now);
        assert!(stats.timeline.is_empty());
        assert!(!stats.placeholder_timeline);

        options.no_data = NoDataPolicy::Placeholder;
        let stats = compute_statistics(&[], &options, now);
        assert!(stats.placeholder_timeline);
        assert_eq!(stats.timeline.len(), 1);
        assert_eq!(stats.summary.total_analyses, 0);

        // Real data always wins over placeholders.
        let records = vec![create_test_record(
            Verdict::Positive,
            70.0,
            Confidence::High,
            2024,
            4,
        )];
        let stats = compute_statistics(&records, &options, now);
        assert!(!stats.placeholder_timeline);
        assert_eq!(stats.timeline[0].month_key, MonthKey::new(2024, 4));
    }

    #[test]
    fn test_summary_is_idempotent() {
        let records = scenario();
        let first = compute_summary(&records);
        let second = compute_summary(&records);
        assert_eq!(first, second);
        assert_eq!(
            first.average_probability.to_bits(),
            second.average_probability.to_bits()
        );
        assert_eq!(
            first.detection_rate.to_bits(),
            second.detection_rate.to_bits()
        );
    }

    #[test]
    fn test_generate_summary_text() {
        let text = generate_summary_text(&compute_summary(&scenario()));
        assert!(text.contains("Total analyses: 3"));
        assert!(text.contains("66.7%"));
        assert!(text.contains("high 1 | medium 1 | low 1"));
    }

    fn record_strategy() -> impl Strategy<Value = AnalysisRecord> {
        (
            any::<bool>(),
            0.0f64..=100.0,
            0u8..3,
            2019i32..2026,
            1u32..=12,
        )
            .prop_map(|(positive, probability, level, year, month)| {
                let verdict = if positive {
                    Verdict::Positive
                } else {
                    Verdict::Negative
                };
                let confidence = match level {
                    0 => Confidence::Low,
                    1 => Confidence::Medium,
                    _ => Confidence::High,
                };
                create_test_record(verdict, probability, confidence, year, month)
            })
    }

    proptest! {
        #[test]
        fn summary_counts_are_consistent(records in prop::collection::vec(record_strategy(), 0..60)) {
            let summary = compute_summary(&records);
            let dist = summary.confidence_distribution;

            prop_assert_eq!(summary.total_analyses, records.len());
            prop_assert_eq!(summary.positive_count + summary.negative_count, summary.total_analyses);
            prop_assert_eq!(dist.high + dist.medium + dist.low, summary.total_analyses);
            prop_assert!((0.0..=100.0).contains(&summary.detection_rate));
            prop_assert!((0.0..=100.0).contains(&summary.average_probability));
        }

        #[test]
        fn timeline_is_chronological(records in prop::collection::vec(record_strategy(), 0..60)) {
            let timeline = compute_timeline(&records);

            for pair in timeline.windows(2) {
                prop_assert!(pair[0].month_key < pair[1].month_key);
            }
            let counted: usize = timeline.iter().map(|b| b.analysis_count).sum();
            prop_assert_eq!(counted, records.len());

            let mut reversed = records.clone();
            reversed.reverse();
            let shape = |buckets: &[TimelineBucket]| -> Vec<(MonthKey, usize, usize, usize)> {
                buckets
                    .iter()
                    .map(|b| (b.month_key, b.analysis_count, b.pneumonia_count, b.high_confidence_count))
                    .collect()
            };
            prop_assert_eq!(shape(&compute_timeline(&reversed)), shape(&timeline));
        }
    }
}

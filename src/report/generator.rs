//! Statistics and per-analysis report generation.
//!
//! This module renders a [`StatisticsReport`] as Markdown or JSON, and a
//! single analysis as a plain-text report.

use crate::models::{
    AnalysisRecord, Confidence, DistributionSlice, ReportMetadata, SkippedRecord,
    StatisticsReport, SummaryMetrics, TimelineBucket, Verdict,
};
use crate::report::csv::format_date;
use anyhow::Result;

/// Generate a complete Markdown statistics report.
pub fn generate_markdown_report(report: &StatisticsReport) -> String {
    let mut output = String::new();

    output.push_str("# PneumoStats Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_distribution_section(&report.distribution));
    output.push_str(&generate_confidence_section(&report.summary));
    output.push_str(&generate_timeline_section(
        &report.timeline,
        report.metadata.placeholder_timeline,
    ));
    output.push_str(&generate_skipped_section(&report.skipped));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Time Range:** `{}`\n", metadata.time_range));
    section.push_str(&format!(
        "- **Records Received:** {}\n",
        metadata.records_received
    ));
    if metadata.records_skipped > 0 {
        section.push_str(&format!(
            "- **Records Skipped:** {}\n",
            metadata.records_skipped
        ));
    }
    section.push('\n');

    section
}

fn generate_summary_section(summary: &SummaryMetrics) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Analyses | Pneumonia | Normal | Detection Rate | Avg. Probability |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {:.1}% | {:.1}% |\n\n",
        summary.total_analyses,
        summary.positive_count,
        summary.negative_count,
        summary.detection_rate,
        summary.average_probability
    ));

    section
}

fn generate_distribution_section(distribution: &[DistributionSlice]) -> String {
    let mut section = String::new();

    section.push_str("### Verdict Distribution\n\n");
    section.push_str("| Verdict | Count | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for slice in distribution {
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            escape_cell(&slice.name),
            slice.value,
            slice.percentage
        ));
    }
    section.push('\n');

    section
}

fn generate_confidence_section(summary: &SummaryMetrics) -> String {
    let mut section = String::new();

    section.push_str("### Confidence Levels\n\n");
    section.push_str("| Level | Count | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for level in [Confidence::High, Confidence::Medium, Confidence::Low] {
        let count = summary.confidence_distribution.get(level);
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            level.label(),
            count,
            crate::analysis::percentage(count, summary.total_analyses)
        ));
    }
    section.push('\n');

    section
}

fn generate_timeline_section(timeline: &[TimelineBucket], placeholder: bool) -> String {
    let mut section = String::new();

    section.push_str("## Monthly Timeline\n\n");

    if timeline.is_empty() {
        section.push_str("No analyses in the selected time range.\n\n");
        return section;
    }

    if placeholder {
        section.push_str("> Placeholder figures: no analyses in the selected time range.\n\n");
    }

    section.push_str("| Month | Analyses | Pneumonia | High Confidence | Avg. Probability | Precision |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for bucket in timeline {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.1}% | {:.1}% |\n",
            bucket.month_label,
            bucket.analysis_count,
            bucket.pneumonia_count,
            bucket.high_confidence_count,
            bucket.average_probability,
            bucket.precision_rate
        ));
    }
    section.push('\n');

    section
}

fn generate_skipped_section(skipped: &[SkippedRecord]) -> String {
    if skipped.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Skipped Records\n\n");
    section.push_str("| Record | Reason |\n");
    section.push_str("|:---|:---|\n");
    for record in skipped {
        section.push_str(&format!(
            "| `{}` | {} |\n",
            escape_cell(&record.id),
            escape_cell(&record.reason)
        ));
    }
    section.push('\n');

    section
}

/// Escape text placed in a Markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Generated by PneumoStats v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON statistics export.
pub fn generate_json_report(report: &StatisticsReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the text report for a single analysis.
pub fn generate_record_report(record: &AnalysisRecord) -> String {
    let result = match record.verdict {
        Verdict::Positive => "Pneumonie détectée",
        Verdict::Negative => "Normal",
    };

    let mut output = String::new();
    output.push_str("Rapport d'analyse radiographique\n");
    output.push_str("================================\n\n");
    output.push_str(&format!("Identifiant : {}\n", record.id));
    output.push_str(&format!("Nom du fichier : {}\n", record.file_name));
    output.push_str(&format!("Date : {}\n", format_date(record)));
    output.push_str(&format!("Résultat : {}\n", result));
    output.push_str(&format!("Probabilité : {}%\n", record.probability));
    output.push_str(&format!(
        "Niveau de confiance : {}\n",
        record.confidence.label()
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{compute_summary, compute_timeline, verdict_distribution};
    use crate::models::{MonthKey, RecordId};
    use chrono::{NaiveDate, Utc};

    fn create_test_record() -> AnalysisRecord {
        AnalysisRecord {
            id: RecordId::Number(12),
            file_name: "patient_042.png".to_string(),
            verdict: Verdict::Positive,
            probability: 91.3,
            confidence: Confidence::High,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 14)
                .unwrap()
                .and_hms_opt(16, 45, 0)
                .unwrap(),
        }
    }

    fn create_test_report() -> StatisticsReport {
        let records = vec![create_test_record()];
        let summary = compute_summary(&records);

        StatisticsReport {
            metadata: ReportMetadata {
                source: "http://localhost:8000".to_string(),
                generated_at: Utc::now(),
                time_range: "all".to_string(),
                records_received: 2,
                records_skipped: 1,
                placeholder_timeline: false,
            },
            distribution: verdict_distribution(&summary),
            timeline: compute_timeline(&records),
            summary,
            skipped: vec![SkippedRecord {
                id: "13".to_string(),
                reason: "unknown verdict 'maybe'".to_string(),
            }],
            detailed_analyses: records,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_report());

        assert!(markdown.contains("# PneumoStats Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("| 1 | 1 | 0 | 100.0% | 91.3% |"));
        assert!(markdown.contains("mars 2024"));
        assert!(markdown.contains("## Skipped Records"));
        assert!(markdown.contains("unknown verdict 'maybe'"));
        assert!(markdown.contains("**Records Skipped:** 1"));
    }

    #[test]
    fn test_skipped_section_escapes_pipes() {
        let section = generate_skipped_section(&[SkippedRecord {
            id: "a|b".to_string(),
            reason: "unknown verdict 'yes|no'".to_string(),
        }]);

        assert!(section.contains("| `a\\|b` | unknown verdict 'yes\\|no' |"));
        let row = section.lines().nth(4).unwrap();
        assert_eq!(row.matches('|').count() - row.matches("\\|").count(), 3);
    }

    #[test]
    fn test_timeline_section_states() {
        assert!(generate_timeline_section(&[], false).contains("No analyses"));

        let bucket = TimelineBucket::empty(MonthKey::new(2024, 1));
        let section = generate_timeline_section(&[bucket], true);
        assert!(section.contains("Placeholder figures"));
        assert!(section.contains("janvier 2024"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report()).unwrap();

        assert!(json.contains("\"totalAnalyses\": 1"));
        assert!(json.contains("\"monthKey\": \"2024-03\""));
        assert!(json.contains("\"detailedAnalyses\""));
        assert!(json.contains("\"generatedAt\""));
    }

    #[test]
    fn test_generate_record_report() {
        let text = generate_record_report(&create_test_record());

        assert!(text.contains("Nom du fichier : patient_042.png"));
        assert!(text.contains("Date : 14/03/2024 16:45"));
        assert!(text.contains("Résultat : Pneumonie détectée"));
        assert!(text.contains("Probabilité : 91.3%"));
        assert!(text.contains("Niveau de confiance : Élevée"));
    }
}

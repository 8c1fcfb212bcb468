//! CSV export of the analysis history.

use crate::models::AnalysisRecord;
use serde::{Deserialize, Serialize};

/// Which columns an export includes. Column order is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportColumns {
    #[serde(default = "default_true")]
    pub date: bool,
    #[serde(default = "default_true")]
    pub file_name: bool,
    #[serde(default = "default_true")]
    pub verdict: bool,
    #[serde(default = "default_true")]
    pub probability: bool,
    #[serde(default = "default_true")]
    pub confidence: bool,
}

impl Default for ExportColumns {
    fn default() -> Self {
        Self {
            date: true,
            file_name: true,
            verdict: true,
            probability: true,
            confidence: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ExportColumns {
    /// No columns selected; enable them one by one.
    pub fn none() -> Self {
        Self {
            date: false,
            file_name: false,
            verdict: false,
            probability: false,
            confidence: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.date || self.file_name || self.verdict || self.probability || self.confidence)
    }

    /// Header names of the selected columns.
    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = Vec::new();
        if self.date {
            headers.push("Date");
        }
        if self.file_name {
            headers.push("Fichier");
        }
        if self.verdict {
            headers.push("Résultat");
        }
        if self.probability {
            headers.push("Probabilité");
        }
        if self.confidence {
            headers.push("Confiance");
        }
        headers
    }

    /// Field values of the selected columns for one record.
    pub fn row(&self, record: &AnalysisRecord) -> Vec<String> {
        let mut row = Vec::new();
        if self.date {
            row.push(format_date(record));
        }
        if self.file_name {
            row.push(record.file_name.clone());
        }
        if self.verdict {
            row.push(record.verdict.label().to_string());
        }
        if self.probability {
            row.push(format!("{}%", record.probability));
        }
        if self.confidence {
            row.push(record.confidence.to_string());
        }
        row
    }
}

/// Date as displayed in the history table, `dd/mm/yyyy HH:MM`.
pub fn format_date(record: &AnalysisRecord) -> String {
    record.timestamp.format("%d/%m/%Y %H:%M").to_string()
}

/// Wrap a field in quotes, doubling any quote inside it.
pub fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render records as CSV: header line, then one quoted line per record.
pub fn export_csv(records: &[AnalysisRecord], columns: &ExportColumns) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(columns.headers().join(","));

    for record in records {
        let fields: Vec<String> = columns.row(record).iter().map(|f| quote_field(f)).collect();
        lines.push(fields.join(","));
    }

    lines.join("\n")
}

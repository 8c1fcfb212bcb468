//! Report and export generation.

pub mod csv;
pub mod generator;

pub use self::csv::{export_csv, ExportColumns};
pub use generator::{generate_json_report, generate_markdown_report, generate_record_report};

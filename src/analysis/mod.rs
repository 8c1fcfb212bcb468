//! Analysis modules.
//!
//! Normalization of raw history records, time-range selection and the
//! statistics aggregator. None of these touch the network or the session.

pub mod aggregator;
pub mod filter;
pub mod normalize;

pub use aggregator::*;
pub use filter::{filter_for_export, ExportRange, HistoryFilter, TimeRange};
pub use normalize::{normalize_records, Normalized};

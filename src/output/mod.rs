//! Output writers for run results.
//!
//! This module handles the serialized side of a run:
//! - the report schema (counters, grouped views, ranked statements)
//! - JSON report files (write and read back)

pub mod json;
pub mod schema;

// Re-export main functions
pub use json::{read_report, write_report};
pub use schema::{build_report, Report, StatementSummary};

//! Per-format trace line processors.
//!
//! Each trace format gets one SQL processor (builds statements) and one
//! execution-path processor (builds the call tree). Processors keep
//! private state (open-cursor map, current-call pointer) for the length
//! of one run and mutate the shared `TraceData` aggregate.
//!
//! Registration order is a contract: within a format's processor set,
//! the SQL processor runs before the path processor, because SQL call
//! nodes link to the most recently parsed statement by position.

pub mod aet;
pub mod call_tree;
pub mod cobol_path;
pub mod cobol_sql;
pub mod header;
pub mod online;
pub mod tracesql;

pub use aet::{AetExecutionPathProcessor, AetSqlProcessor};
pub use cobol_path::CobolExecutionPathProcessor;
pub use cobol_sql::CobolSqlProcessor;
pub use header::BatchLineHeader;
pub use tracesql::{TraceSqlExecutionPathProcessor, TraceSqlProcessor};

use crate::model::TraceData;
use crate::utils::error::ProcessError;

/// Contract every line processor implements.
///
/// `process_line` is called once per line in file order. Lines that
/// match no recognized event predicate are silently skipped; structural
/// violations (broken header, unknown cursor) abort the run.
pub trait TraceProcessor {
    /// Reset private state for a fresh run
    fn init(&mut self, data: &mut TraceData);

    fn process_line(
        &mut self,
        line: &str,
        line_number: u64,
        data: &mut TraceData,
    ) -> Result<(), ProcessError>;

    /// End-of-stream hook; finalizes derived views. Not invoked when a
    /// run is cancelled.
    fn complete(&mut self, data: &mut TraceData);
}

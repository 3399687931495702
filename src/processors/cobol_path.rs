//! Execution-path processor for batch (COBOL) timings reports.
//!
//! Rebuilds the call forest from transaction-boundary events. Must be
//! registered after [`CobolSqlProcessor`](crate::processors::CobolSqlProcessor):
//! a statement event links to the most recently parsed statement.

use crate::model::TraceData;
use crate::processors::call_tree::CallTreeBuilder;
use crate::processors::header::BatchLineHeader;
use crate::processors::TraceProcessor;
use crate::utils::error::ProcessError;
use once_cell::sync::Lazy;
use regex::Regex;

static CONNECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sConnect=").expect("valid regex"));
static DISCONNECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sDisconnect$").expect("valid regex"));
static ROLLBACK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sRollback$").expect("valid regex"));
static COMMIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sCommit$").expect("valid regex"));
static NEW_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new("(COM|CEX) Stmt=(.*)").expect("valid regex"));

#[derive(Debug)]
pub struct CobolExecutionPathProcessor {
    tree: CallTreeBuilder,
}

impl CobolExecutionPathProcessor {
    pub fn new() -> Self {
        Self {
            tree: CallTreeBuilder::new("Cobol Trace"),
        }
    }

    fn is_valid(line: &str) -> bool {
        line.contains(" Connect=")
            || line.ends_with(" Disconnect")
            || line.ends_with(" Rollback")
            || line.ends_with(" Commit")
            || line.contains("COM Stmt=")
            || line.contains("CEX Stmt=")
    }
}

impl Default for CobolExecutionPathProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceProcessor for CobolExecutionPathProcessor {
    fn init(&mut self, _data: &mut TraceData) {
        self.tree.reset();
    }

    fn process_line(
        &mut self,
        line: &str,
        line_number: u64,
        data: &mut TraceData,
    ) -> Result<(), ProcessError> {
        if !Self::is_valid(line) {
            return Ok(());
        }

        let header = BatchLineHeader::decode(line, line_number)?;

        if CONNECT.is_match(line) {
            self.tree.open_call(
                data,
                format!("Start Cursor #{}", header.cursor),
                line_number,
            );
            return Ok(());
        }

        if DISCONNECT.is_match(line) {
            self.tree.close_call(data, "Disconnect", line_number);
            return Ok(());
        }

        if ROLLBACK.is_match(line) {
            self.tree.leaf_call(data, "Rollback", line_number);
            return Ok(());
        }

        if COMMIT.is_match(line) {
            self.tree.leaf_call(data, "Commit", line_number);
            return Ok(());
        }

        if let Some(caps) = NEW_STATEMENT.captures(line) {
            // Safe only because the SQL processor is registered first
            let statement = data
                .last_statement_ref()
                .ok_or(ProcessError::ProcessorOrder { line_number })?;
            self.tree.sql_call(
                data,
                caps[2].trim().to_string(),
                line_number,
                header.sql_duration,
                statement,
            );
        }

        Ok(())
    }

    fn complete(&mut self, _data: &mut TraceData) {}
}

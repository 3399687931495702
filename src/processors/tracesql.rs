//! Processors for the generic SQL trace format (`.tracesql`).
//!
//! Lines look like:
//!
//! ```text
//! 1-435  11.55.51.039 Cur#1.7340.HRDMO RC=0 Dur=0.000093 COM Stmt=SELECT ...
//! ```
//!
//! The shared payload grammar lives in [`online`](crate::processors::online).

use crate::aggregator;
use crate::model::TraceData;
use crate::processors::call_tree::CallTreeBuilder;
use crate::processors::online::{
    classify_path_event, classify_sql_event, LineHeader, OnlineSqlState, PathEvent,
};
use crate::processors::TraceProcessor;
use crate::utils::error::ProcessError;
use once_cell::sync::Lazy;
use regex::Regex;

static LINE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Cur#(\d+)\.\d+\.\S+\s+RC=(-?\d+)\s+Dur=(\d+\.\d+)\s+(.*)$").expect("valid regex")
});

/// Split a line into its decoded header and event payload.
/// `None` when the line carries no `Cur#` header at all.
fn parse_line<'a>(line: &'a str) -> Option<(LineHeader, &'a str)> {
    let caps = LINE_HEADER.captures(line)?;
    let header = LineHeader {
        cursor: caps[1].parse().unwrap_or(0),
        rc_number: caps[2].parse().unwrap_or(0),
        duration: caps[3].parse().unwrap_or(0.0),
    };
    let payload = caps.get(4).map_or("", |m| m.as_str());
    Some((header, payload))
}

/// Statement builder for `.tracesql` traces
#[derive(Debug, Default)]
pub struct TraceSqlProcessor {
    state: OnlineSqlState,
}

impl TraceSqlProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceProcessor for TraceSqlProcessor {
    fn init(&mut self, _data: &mut TraceData) {
        self.state.clear();
    }

    fn process_line(
        &mut self,
        line: &str,
        line_number: u64,
        data: &mut TraceData,
    ) -> Result<(), ProcessError> {
        let Some((header, payload)) = parse_line(line) else {
            return Ok(());
        };
        self.state
            .handle(header, classify_sql_event(payload), line_number, data)
    }

    fn complete(&mut self, data: &mut TraceData) {
        aggregator::append_sql_summaries(data);
    }
}

/// Call-tree builder for `.tracesql` traces. Register after
/// [`TraceSqlProcessor`].
#[derive(Debug)]
pub struct TraceSqlExecutionPathProcessor {
    tree: CallTreeBuilder,
}

impl TraceSqlExecutionPathProcessor {
    pub fn new() -> Self {
        Self {
            tree: CallTreeBuilder::new("SQL Trace"),
        }
    }
}

impl Default for TraceSqlExecutionPathProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceProcessor for TraceSqlExecutionPathProcessor {
    fn init(&mut self, _data: &mut TraceData) {
        self.tree.reset();
    }

    fn process_line(
        &mut self,
        line: &str,
        line_number: u64,
        data: &mut TraceData,
    ) -> Result<(), ProcessError> {
        let Some((header, payload)) = parse_line(line) else {
            return Ok(());
        };

        match classify_path_event(payload) {
            PathEvent::Connect(target) => {
                self.tree
                    .open_call(data, format!("Connect {target}"), line_number);
            }
            PathEvent::Disconnect => {
                self.tree.close_call(data, "Disconnect", line_number);
            }
            PathEvent::Commit => {
                self.tree.leaf_call(data, "Commit", line_number);
            }
            PathEvent::Rollback => {
                self.tree.leaf_call(data, "Rollback", line_number);
            }
            PathEvent::Statement(text) => {
                let statement = data
                    .last_statement_ref()
                    .ok_or(ProcessError::ProcessorOrder { line_number })?;
                self.tree.sql_call(
                    data,
                    text.trim().to_string(),
                    line_number,
                    header.duration,
                    statement,
                );
            }
            PathEvent::Other => {}
        }
        Ok(())
    }

    fn complete(&mut self, _data: &mut TraceData) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_line(cursor: i64, rc: i32, dur: f64, payload: &str) -> String {
        format!("1-435    11.55.51.039 Cur#{cursor}.7340.HRDMO RC={rc} Dur={dur:.6} {payload}")
    }

    #[test]
    fn test_parse_line_header() {
        let line = trace_line(3, -1, 0.000093, "EXE");
        let (header, payload) = parse_line(&line).expect("header");
        assert_eq!(header.cursor, 3);
        assert_eq!(header.rc_number, -1);
        assert!((header.duration - 0.000093).abs() < 1e-12);
        assert_eq!(payload, "EXE");
    }

    #[test]
    fn test_full_statement_lifecycle() {
        let mut data = TraceData::new();
        let mut sql = TraceSqlProcessor::new();

        let lines = vec![
            trace_line(1, 0, 0.000093, "COM Stmt=SELECT A FROM PS_FOO WHERE B = :1"),
            trace_line(1, 0, 0.000002, "Bind-1 type=19 length=4 value=42"),
            trace_line(1, 0, 0.000455, "EXE"),
            trace_line(1, 0, 0.000050, "Fetch"),
            trace_line(1, 1, 0.000012, "Fetch"),
        ];
        for (i, line) in lines.iter().enumerate() {
            sql.process_line(line, (i + 1) as u64, &mut data).expect("line");
        }

        let statement = &data.statements[0];
        assert_eq!(statement.fetch_count(), 1);
        assert_eq!(statement.exec_time(), 0.000455);
        assert!((statement.fetch_time() - 0.000062).abs() < 1e-12);
        assert_eq!(statement.current_execution().bind_values[0].type_code, 19);
    }

    #[test]
    fn test_path_builds_under_connect() {
        let mut data = TraceData::new();
        let mut sql = TraceSqlProcessor::new();
        let mut path = TraceSqlExecutionPathProcessor::new();

        let lines = vec![
            trace_line(1, 0, 0.001, "Connect=Primary/HRDMO/people"),
            trace_line(1, 0, 0.0001, "COM Stmt=SELECT A FROM PS_FOO"),
            trace_line(1, 0, 0.0002, "Commit"),
            trace_line(1, 0, 0.0001, "Disconnect"),
        ];
        for (i, line) in lines.iter().enumerate() {
            let n = (i + 1) as u64;
            sql.process_line(line, n, &mut data).expect("sql");
            path.process_line(line, n, &mut data).expect("path");
        }

        assert_eq!(data.execution_path.len(), 1);
        let root = data.execution_path[0];
        assert_eq!(data.calls[root].function, "Connect Primary/HRDMO/people");
        assert_eq!(data.calls[root].children.len(), 2);
        assert_eq!(data.calls[root].context, "SQL Trace");
    }
}

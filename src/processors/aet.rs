//! Processors for the Application Engine trace format (`.aet`).
//!
//! Lines look like:
//!
//! ```text
//! -- 13.55.45.123 .000052 Cur#1 RC=0 Dur=0.000051 COM Stmt=SELECT ...
//! ```
//!
//! The payload grammar matches the generic SQL trace, with one
//! addition: `BUF` lines carry the buffer values of a %Select /
//! %SelectInit statement, comma-separated.

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
    Regex::new(r"^--\s+\S+\s+\S+\s+Cur#(\d+)\s+RC=(-?\d+)\s+Dur=(\d+\.\d+)\s+(.*)$")
        .expect("valid regex")
});

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

/// Statement builder for `.aet` traces
#[derive(Debug, Default)]
pub struct AetSqlProcessor {
    state: OnlineSqlState,
}

impl AetSqlProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceProcessor for AetSqlProcessor {
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

        // Buffer values for the cursor's open %Select statement
        if let Some(values) = payload.strip_prefix("BUF ") {
            for value in values.split(',') {
                self.state
                    .add_buffer_value(header.cursor, value.trim(), line_number, data)?;
            }
            return Ok(());
        }

        self.state
            .handle(header, classify_sql_event(payload), line_number, data)
    }

    fn complete(&mut self, data: &mut TraceData) {
        aggregator::append_sql_summaries(data);
    }
}

/// Call-tree builder for `.aet` traces. Register after
/// [`AetSqlProcessor`].
#[derive(Debug)]
pub struct AetExecutionPathProcessor {
    tree: CallTreeBuilder,
}

impl AetExecutionPathProcessor {
    pub fn new() -> Self {
        Self {
            tree: CallTreeBuilder::new("Application Engine Trace"),
        }
    }
}

impl Default for AetExecutionPathProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceProcessor for AetExecutionPathProcessor {
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

    fn aet_line(cursor: i64, rc: i32, dur: f64, payload: &str) -> String {
        format!("-- 13.55.45.123 .000052 Cur#{cursor} RC={rc} Dur={dur:.6} {payload}")
    }

    #[test]
    fn test_parse_aet_header() {
        let line = aet_line(2, 0, 0.000051, "Fetch");
        let (header, payload) = parse_line(&line).expect("header");
        assert_eq!(header.cursor, 2);
        assert_eq!(payload, "Fetch");
    }

    #[test]
    fn test_non_trace_line_skipped() {
        assert!(parse_line("PeopleTools 8.59 Application Engine").is_none());
        assert!(parse_line("-- 13.55.45 step banner without header").is_none());
    }

    #[test]
    fn test_buffer_values_feed_select_init() {
        let mut data = TraceData::new();
        let mut sql = AetSqlProcessor::new();

        let lines = vec![
            aet_line(
                1,
                0,
                0.000010,
                "COM Stmt=%SelectInit(EMPLID, NAME) SELECT EMPLID, NAME FROM PS_JOB",
            ),
            aet_line(1, 0, 0.0, "BUF K0001, Smith"),
        ];
        for (i, line) in lines.iter().enumerate() {
            sql.process_line(line, (i + 1) as u64, &mut data).expect("line");
        }

        let items = data.statements[0].buffer_items();
        assert_eq!(items.get("EMPLID"), Some(&"K0001".to_string()));
        assert_eq!(items.get("NAME"), Some(&"Smith".to_string()));
    }

    #[test]
    fn test_buffer_without_open_statement_is_fatal() {
        let mut data = TraceData::new();
        let mut sql = AetSqlProcessor::new();

        let line = aet_line(5, 0, 0.0, "BUF K0001");
        let err = sql.process_line(&line, 1, &mut data).unwrap_err();
        assert!(matches!(err, ProcessError::CursorState { cursor: 5, .. }));
    }
}

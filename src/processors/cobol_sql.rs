//! SQL processor for batch (COBOL) timings reports.
//!
//! Builds SQL statements from compile/execute/fetch/bind events. State
//! is one open-statement map keyed by cursor number, plus the one-shot
//! SQL ID supplied by a GETSTMT line for the next compiled statement.

use crate::aggregator;
use crate::model::{SqlBindValue, SqlError, SqlStatement, StatementRef, TraceData};
use crate::processors::header::BatchLineHeader;
use crate::processors::TraceProcessor;
use crate::utils::config::{RTNCD_END, RTNCD_OK};
use crate::utils::error::ProcessError;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static COMPILE: Lazy<Regex> = Lazy::new(|| Regex::new("COM Stmt=(.*)").expect("valid regex"));
static COMPILE_EXEC: Lazy<Regex> = Lazy::new(|| Regex::new("CEX Stmt=(.*)").expect("valid regex"));
static GET_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new("GETSTMT Stmt=(.*?), length").expect("valid regex"));
static FETCH: Lazy<Regex> = Lazy::new(|| Regex::new(r" Fetch\s*(.*)$").expect("valid regex"));
static BIND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:Bind-(\d+)|Bind position=(\d+)), type=(.*?), (precision=(\d+), scale=(\d+)|length=(\d+)), value=(.*)",
    )
    .expect("valid regex")
});

/// Map a batch bind type name onto the legacy TraceSQL type codes.
/// Only the quote/no-quote distinction survives: 19 means unquoted.
/// Unlisted names fall through to 0 (quoted) on purpose.
fn batch_bind_type(name: &str) -> i32 {
    match name {
        "SQLPSPD" | "SQLPSLO" | "SQLPSH" => 19,
        "SQLPBUF" | "SQLPDAT" | "SQLPSTR" => 0,
        _ => 0,
    }
}

#[derive(Debug, Default)]
pub struct CobolSqlProcessor {
    cursor_map: HashMap<i64, StatementRef>,
    /// SQL ID reported by a GETSTMT line, consumed by the next compile
    pending_sql_id: Option<String>,
}

impl CobolSqlProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coarse predicate: does this line carry any event we handle?
    fn is_valid(line: &str) -> bool {
        line.contains("COM Stmt=")
            || line.contains("Bind-")
            || line.contains("Bind position")
            || line.contains(" Fetch")
            || line.contains(" EXE")
            || line.contains(" EPO")
            || line.contains(" ERR")
            || line.contains(" CEX Stmt=")
            || line.contains(" GETSTMT Stmt=")
    }

    fn open_statement(
        &self,
        cursor: i64,
        line_number: u64,
        event: &'static str,
    ) -> Result<StatementRef, ProcessError> {
        self.cursor_map
            .get(&cursor)
            .copied()
            .ok_or(ProcessError::CursorState {
                line_number,
                cursor,
                event,
            })
    }
}

impl TraceProcessor for CobolSqlProcessor {
    fn init(&mut self, _data: &mut TraceData) {
        self.cursor_map.clear();
        self.pending_sql_id = None;
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

        if let Some(caps) = GET_STATEMENT.captures(line) {
            self.pending_sql_id = Some(caps[1].to_string());
            return Ok(());
        }

        // New statement, possibly compile+execute in one event
        let compile_exec = COMPILE_EXEC.captures(line);
        let is_compile_exec = compile_exec.is_some();
        if let Some(caps) = COMPILE.captures(line).or(compile_exec) {
            let mut statement = SqlStatement::new(&caps[1]);
            statement.from_batch = true;
            statement.cursor = header.cursor;
            statement.rc_number = header.rc_number;
            statement.line_number = line_number;

            if is_compile_exec {
                statement.set_exec_time(header.sql_duration);
            }

            if let Some(sql_id) = self.pending_sql_id.take() {
                debug!("line {line_number}: GETSTMT override {sql_id}");
                statement.sql_id = sql_id;
            }

            let statement_ref = data.add_statement(statement);
            self.cursor_map.insert(header.cursor, statement_ref);
            return Ok(());
        }

        if line.contains(" EXE") {
            let statement_ref = self.open_statement(header.cursor, line_number, "execute")?;
            data.statements[statement_ref].set_exec_time(header.duration);
            return Ok(());
        }

        if let Some(caps) = FETCH.captures(line) {
            let statement_ref = self.open_statement(header.cursor, line_number, "fetch")?;
            let statement = &mut data.statements[statement_ref];
            match header.rc_number {
                RTNCD_OK => statement.record_fetch_row(header.duration),
                RTNCD_END => statement.add_fetch_time(header.duration),
                rc => statement.record_error(SqlError {
                    return_code: rc,
                    message: caps[1].trim().to_string(),
                }),
            }
            return Ok(());
        }

        if let Some(caps) = BIND.captures(line) {
            let statement_ref = self.open_statement(header.cursor, line_number, "bind")?;

            let index = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or(0, |m| m.as_str().parse().unwrap_or(0));
            let type_name = &caps[3];
            // precision doubles as length for decimal binds
            let length = caps
                .get(5)
                .or_else(|| caps.get(7))
                .map_or(0, |m| m.as_str().parse().unwrap_or(0));

            data.statements[statement_ref].add_bind_value(SqlBindValue {
                index,
                type_code: batch_bind_type(type_name),
                type_label: format!("{} ({})", type_name, &caps[4]),
                length,
                value: caps[8].to_string(),
            });
            return Ok(());
        }

        // EPO/ERR lines match the coarse predicate but carry nothing we
        // track beyond the header
        Ok(())
    }

    fn complete(&mut self, data: &mut TraceData) {
        aggregator::append_sql_summaries(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_line(cursor: i64, rc: i32, elapsed: &str, sql_time: &str, payload: &str) -> String {
        format!(
            "{:<12}  {:<9}   {:>7}   {:>7}    {:>6}   {:>4} {}",
            "12:30:01.250", "SQLRT.320", elapsed, sql_time, cursor, rc, payload
        )
    }

    fn process(processor: &mut CobolSqlProcessor, data: &mut TraceData, lines: &[String]) {
        for (i, line) in lines.iter().enumerate() {
            processor
                .process_line(line, (i + 1) as u64, data)
                .expect("line processed");
        }
    }

    #[test]
    fn test_compile_registers_cursor() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();

        let lines = vec![batch_line(2, 0, "0.000", "0.000", "COM Stmt=SELECT A FROM PS_FOO")];
        process(&mut processor, &mut data, &lines);

        assert_eq!(data.statements.len(), 1);
        assert_eq!(data.statements[0].cursor, 2);
        assert!(data.statements[0].from_batch);
    }

    #[test]
    fn test_compile_exec_records_sql_time() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();

        let lines = vec![batch_line(1, 0, "0.100", "0.075", "CEX Stmt=UPDATE PS_FOO SET A = 1")];
        process(&mut processor, &mut data, &lines);

        assert_eq!(data.statements[0].exec_time(), 0.075);
    }

    #[test]
    fn test_fetch_return_codes() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();

        let lines = vec![
            batch_line(1, 0, "0.000", "0.000", "COM Stmt=SELECT A FROM PS_FOO"),
            batch_line(1, 0, "0.010", "0.000", "EXE"),
            batch_line(1, 0, "0.020", "0.000", "Fetch"),
            batch_line(1, 1, "0.005", "0.000", "Fetch"),
        ];
        process(&mut processor, &mut data, &lines);

        let statement = &data.statements[0];
        assert_eq!(statement.fetch_count(), 1);
        assert!((statement.fetch_time() - 0.025).abs() < 1e-9);
        assert!(!statement.is_error);
    }

    #[test]
    fn test_fetch_error_code_attaches_error() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();

        let lines = vec![
            batch_line(1, 0, "0.000", "0.000", "COM Stmt=SELECT A FROM PS_FOO"),
            batch_line(1, -805, "0.000", "0.000", "Fetch"),
        ];
        process(&mut processor, &mut data, &lines);

        let statement = &data.statements[0];
        assert!(statement.is_error);
        assert_eq!(statement.error.as_ref().unwrap().return_code, -805);
        // an errored fetch never counts a row
        assert_eq!(statement.fetch_count(), 0);
    }

    #[test]
    fn test_fetch_unknown_cursor_is_fatal() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();

        let line = batch_line(9, 0, "0.000", "0.000", "Fetch");
        let err = processor.process_line(&line, 1, &mut data).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::CursorState { cursor: 9, .. }
        ));
    }

    #[test]
    fn test_bind_parsing_and_type_mapping() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();

        let lines = vec![
            batch_line(1, 0, "0.000", "0.000", "COM Stmt=SELECT A FROM PS_FOO WHERE B = :1"),
            batch_line(1, 0, "0.000", "0.000", "Bind-1, type=SQLPSH, length=4, value=42"),
            batch_line(
                1,
                0,
                "0.000",
                "0.000",
                "Bind position=2, type=SQLPSTR, precision=10, scale=2, value=KU0001",
            ),
        ];
        process(&mut processor, &mut data, &lines);

        let binds = &data.statements[0].current_execution().bind_values;
        assert_eq!(binds.len(), 2);
        assert_eq!(binds[0].index, 1);
        assert_eq!(binds[0].type_code, 19);
        assert_eq!(binds[0].length, 4);
        assert_eq!(binds[0].value, "42");
        assert_eq!(binds[1].index, 2);
        assert_eq!(binds[1].type_code, 0);
        assert_eq!(binds[1].length, 10);
        assert_eq!(binds[1].type_label, "SQLPSTR (precision=10, scale=2)");
    }

    #[test]
    fn test_getstmt_overrides_next_compile_only() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();

        let lines = vec![
            batch_line(1, 0, "0.000", "0.000", "GETSTMT Stmt=FUNCLIB.GETNEXT.S, length=22"),
            batch_line(1, 0, "0.000", "0.000", "COM Stmt=SELECT A FROM PS_FOO"),
            batch_line(2, 0, "0.000", "0.000", "COM Stmt=SELECT B FROM PS_BAR"),
        ];
        process(&mut processor, &mut data, &lines);

        assert_eq!(data.statements[0].sql_id, "FUNCLIB.GETNEXT.S");
        // second statement keeps its derived fingerprint
        assert_eq!(data.statements[1].sql_id.len(), 13);
    }

    #[test]
    fn test_irrelevant_line_skipped() {
        let mut data = TraceData::new();
        let mut processor = CobolSqlProcessor::new();
        processor
            .process_line("PeopleSoft Batch Timings Report", 1, &mut data)
            .expect("skipped");
        assert!(data.statements.is_empty());
    }
}

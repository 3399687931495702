//! Shared event handling for the online trace formats.
//!
//! The Application Engine (`.aet`) and generic SQL (`.tracesql`) traces
//! differ only in their line prefix; after the `Cur#`/`RC=`/`Dur=`
//! header the event payload grammar is identical. Both format modules
//! parse their own header and delegate the payload to the classifier
//! and state machine here.

use crate::model::{SqlBindValue, SqlError, SqlStatement, StatementRef, TraceData};
use crate::utils::config::{RTNCD_END, RTNCD_OK};
use crate::utils::error::ProcessError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static BIND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Bind-(\d+) type=(-?\d+) length=(\d+) value=(.*)$").expect("valid regex")
});
static SQL_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ERR rtncd=(-?\d+) msg=(.*)$").expect("valid regex"));

/// Decoded common header of one online trace line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHeader {
    pub cursor: i64,
    pub rc_number: i32,
    pub duration: f64,
}

/// SQL-relevant event carried by a line's payload
#[derive(Debug, PartialEq)]
pub enum SqlEvent<'a> {
    Compile(&'a str),
    Execute,
    Fetch(&'a str),
    Bind {
        index: u32,
        type_code: i32,
        length: u32,
        value: &'a str,
    },
    Error {
        return_code: i32,
        message: &'a str,
    },
    Other,
}

/// Control-flow event carried by a line's payload
#[derive(Debug, PartialEq)]
pub enum PathEvent<'a> {
    Connect(&'a str),
    Disconnect,
    Commit,
    Rollback,
    Statement(&'a str),
    Other,
}

pub fn classify_sql_event(payload: &str) -> SqlEvent<'_> {
    if let Some(text) = payload.strip_prefix("COM Stmt=") {
        return SqlEvent::Compile(text);
    }
    if payload.starts_with("EXE") {
        return SqlEvent::Execute;
    }
    if let Some(rest) = payload.strip_prefix("Fetch") {
        return SqlEvent::Fetch(rest.trim());
    }
    if let Some(caps) = BIND.captures(payload) {
        return SqlEvent::Bind {
            index: caps[1].parse().unwrap_or(0),
            type_code: caps[2].parse().unwrap_or(0),
            length: caps[3].parse().unwrap_or(0),
            value: caps.get(4).map_or("", |m| m.as_str()),
        };
    }
    if let Some(caps) = SQL_ERROR.captures(payload) {
        return SqlEvent::Error {
            return_code: caps[1].parse().unwrap_or(0),
            message: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    SqlEvent::Other
}

pub fn classify_path_event(payload: &str) -> PathEvent<'_> {
    if let Some(target) = payload.strip_prefix("Connect=") {
        return PathEvent::Connect(target.trim());
    }
    if payload.starts_with("Disconnect") {
        return PathEvent::Disconnect;
    }
    if payload.starts_with("Commit") {
        return PathEvent::Commit;
    }
    if payload.starts_with("Rollback") || payload.starts_with("RBK") {
        return PathEvent::Rollback;
    }
    if let Some(text) = payload.strip_prefix("COM Stmt=") {
        return PathEvent::Statement(text);
    }
    PathEvent::Other
}

/// Open-cursor state machine shared by the online SQL processors
#[derive(Debug, Default)]
pub struct OnlineSqlState {
    cursor_map: HashMap<i64, StatementRef>,
}

impl OnlineSqlState {
    pub fn clear(&mut self) {
        self.cursor_map.clear();
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

    /// Apply one classified event against the shared aggregate
    pub fn handle(
        &mut self,
        header: LineHeader,
        event: SqlEvent<'_>,
        line_number: u64,
        data: &mut TraceData,
    ) -> Result<(), ProcessError> {
        match event {
            SqlEvent::Compile(text) => {
                let mut statement = SqlStatement::new(text);
                statement.cursor = header.cursor;
                statement.rc_number = header.rc_number;
                statement.line_number = line_number;
                let statement_ref = data.add_statement(statement);
                self.cursor_map.insert(header.cursor, statement_ref);
            }
            SqlEvent::Execute => {
                let statement_ref =
                    self.open_statement(header.cursor, line_number, "execute")?;
                data.statements[statement_ref].set_exec_time(header.duration);
            }
            SqlEvent::Fetch(message) => {
                let statement_ref = self.open_statement(header.cursor, line_number, "fetch")?;
                let statement = &mut data.statements[statement_ref];
                match header.rc_number {
                    RTNCD_OK => statement.record_fetch_row(header.duration),
                    RTNCD_END => statement.add_fetch_time(header.duration),
                    rc => statement.record_error(SqlError {
                        return_code: rc,
                        message: message.to_string(),
                    }),
                }
            }
            SqlEvent::Bind {
                index,
                type_code,
                length,
                value,
            } => {
                let statement_ref = self.open_statement(header.cursor, line_number, "bind")?;
                data.statements[statement_ref].add_bind_value(SqlBindValue {
                    index,
                    type_code,
                    type_label: format!("type={type_code}"),
                    length,
                    value: value.to_string(),
                });
            }
            SqlEvent::Error {
                return_code,
                message,
            } => {
                let statement_ref = self.open_statement(header.cursor, line_number, "error")?;
                data.statements[statement_ref].record_error(SqlError {
                    return_code,
                    message: message.to_string(),
                });
            }
            SqlEvent::Other => {}
        }
        Ok(())
    }

    /// Attach one buffer value to the cursor's open statement (AE
    /// %Select buffer lines)
    pub fn add_buffer_value(
        &mut self,
        cursor: i64,
        value: &str,
        line_number: u64,
        data: &mut TraceData,
    ) -> Result<(), ProcessError> {
        let statement_ref = self.open_statement(cursor, line_number, "buffer")?;
        data.statements[statement_ref].add_buffer_value(value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sql_events() {
        assert_eq!(
            classify_sql_event("COM Stmt=SELECT 1 FROM DUAL"),
            SqlEvent::Compile("SELECT 1 FROM DUAL")
        );
        assert_eq!(classify_sql_event("EXE"), SqlEvent::Execute);
        assert_eq!(classify_sql_event("Fetch"), SqlEvent::Fetch(""));
        assert_eq!(
            classify_sql_event("Bind-1 type=19 length=4 value=42"),
            SqlEvent::Bind {
                index: 1,
                type_code: 19,
                length: 4,
                value: "42"
            }
        );
        assert_eq!(
            classify_sql_event("ERR rtncd=-904 msg=ORA-00904: invalid identifier"),
            SqlEvent::Error {
                return_code: -904,
                message: "ORA-00904: invalid identifier"
            }
        );
        assert_eq!(classify_sql_event("Commit"), SqlEvent::Other);
    }

    #[test]
    fn test_classify_path_events() {
        assert_eq!(
            classify_path_event("Connect=Primary/HRDMO/people"),
            PathEvent::Connect("Primary/HRDMO/people")
        );
        assert_eq!(classify_path_event("Disconnect"), PathEvent::Disconnect);
        assert_eq!(classify_path_event("Commit"), PathEvent::Commit);
        assert_eq!(classify_path_event("RBK"), PathEvent::Rollback);
        assert_eq!(
            classify_path_event("COM Stmt=SELECT 1 FROM DUAL"),
            PathEvent::Statement("SELECT 1 FROM DUAL")
        );
        assert_eq!(classify_path_event("EXE"), PathEvent::Other);
    }

    #[test]
    fn test_error_line_attaches_to_open_statement() {
        let mut data = TraceData::new();
        let mut state = OnlineSqlState::default();
        let header = LineHeader {
            cursor: 1,
            rc_number: 0,
            duration: 0.0,
        };

        state
            .handle(header, classify_sql_event("COM Stmt=SELECT A FROM PS_FOO"), 1, &mut data)
            .expect("compile");
        state
            .handle(
                LineHeader {
                    rc_number: -904,
                    ..header
                },
                classify_sql_event("ERR rtncd=-904 msg=bad column"),
                2,
                &mut data,
            )
            .expect("error line");

        assert!(data.statements[0].is_error);
        assert_eq!(data.statements[0].error.as_ref().unwrap().message, "bad column");
    }
}

//! SQL statement model built incrementally by the line processors.
//!
//! A statement is constructed from the raw text on a compile line. Its
//! type, WHERE/FROM clauses, table list and fingerprint are derived once
//! at construction and never change. Execution runs, bind values, fetch
//! counters and error info mutate afterwards as the trace replays.

use crate::model::call::CallRef;
use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Base-32 alphabet for SQL IDs. The digit set drops e/i/l/o, matching
/// the Oracle-style encoding the traced runtime reports.
const SQL_ID_ALPHABET: &[u8; 32] = b"0123456789abcdfghjkmnpqrstuvwxyz";

static WHERE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i) WHERE (.*?)(ORDER|$)").expect("valid regex"));
static FROM_SELECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+FROM\s*(.*?)\s*(WHERE|$)").expect("valid regex"));
static FROM_UPDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)UPDATE\s*(.*?)\s*(SET|$)").expect("valid regex"));
static FROM_INSERT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)INTO\s*(.*?)\s*(VALUES|\(|$)").expect("valid regex"));
static FROM_DELETE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)DELETE FROM\s*(.*?)\s*(WHERE|$)").expect("valid regex"));
static BUFFER_COLUMNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%Select(?:Init)?\((.*?)\)").expect("valid regex"));
static COLUMN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^, ]+)").expect("valid regex"));

/// Statement type derived from a case-insensitive prefix match.
/// Text matching none of the prefixes stays unclassified (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Select,
    Update,
    Delete,
    Insert,
}

impl SqlType {
    /// Upper-case label used in statistics output
    pub fn label(&self) -> &'static str {
        match self {
            SqlType::Select => "SELECT",
            SqlType::Update => "UPDATE",
            SqlType::Delete => "DELETE",
            SqlType::Insert => "INSERT",
        }
    }
}

/// One physical run of a statement, from execution through the close of
/// its bind window.
#[derive(Debug, Clone)]
pub struct SqlExecution {
    pub bind_values: Vec<SqlBindValue>,
    pub exec_time: f64,
    pub fetch_time: f64,
    pub fetch_count: u32,
    /// While true, new bind values attach to this run. Assigning an
    /// execution time closes the window; the next bind opens a new run.
    pub binds_open: bool,
}

impl SqlExecution {
    pub fn new() -> Self {
        Self {
            bind_values: Vec::new(),
            exec_time: 0.0,
            fetch_time: 0.0,
            fetch_count: 0,
            binds_open: true,
        }
    }
}

impl Default for SqlExecution {
    fn default() -> Self {
        Self::new()
    }
}

/// One bound parameter of a prepared statement
#[derive(Debug, Clone)]
pub struct SqlBindValue {
    /// Positional parameter index
    pub index: u32,
    /// Raw legacy type code. Only its quoting meaning is used here:
    /// code 19 means the literal is emitted unquoted. Preserved verbatim
    /// because downstream literal reconstruction depends on it.
    pub type_code: i32,
    /// Human-readable type label as it appeared in the trace
    pub type_label: String,
    /// Declared length (or precision) of the parameter
    pub length: u32,
    /// Literal value text
    pub value: String,
}

/// Return code and message for a statement that reported a failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlError {
    pub return_code: i32,
    pub message: String,
}

/// One distinct SQL text occurrence in the trace.
///
/// Derived fields (`sql_type`, `where_clause`, `from_clause`, `tables`,
/// `sql_id`) are computed once in [`SqlStatement::new`] and treated as
/// immutable afterwards; only execution-related state mutates.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    /// Trace line the statement was compiled on
    pub line_number: u64,
    /// Trimmed statement text
    pub statement: String,
    /// 13-character deterministic fingerprint. A COBOL GETSTMT line may
    /// override this with the ID the runtime itself reported.
    pub sql_id: String,
    pub sql_type: Option<SqlType>,
    pub where_clause: String,
    pub from_clause: String,
    pub tables: Vec<String>,
    pub cursor: i64,
    pub rc_number: i32,
    /// True when the statement came from a batch (COBOL) timings report
    pub from_batch: bool,
    pub is_error: bool,
    pub error: Option<SqlError>,
    /// Raw buffer values attached by the AE processor for %Select forms
    pub buffer_data: Option<Vec<String>>,
    /// Execution-call node this statement was invoked under, assigned by
    /// the call-tree builder after the statement is parsed
    pub parent_call: Option<CallRef>,
    executions: Vec<SqlExecution>,
}

impl SqlStatement {
    /// Build a statement from raw trace text, deriving type, clauses,
    /// tables and fingerprint. One execution run is opened immediately.
    pub fn new(text: &str) -> Self {
        let statement = text.trim().to_string();
        let sql_type = determine_type(&statement);
        let where_clause = parse_where_clause(&statement);
        let (from_clause, tables) = parse_from_clause(&statement, sql_type);
        let sql_id = generate_sql_id(&statement);

        Self {
            line_number: 0,
            statement,
            sql_id,
            sql_type,
            where_clause,
            from_clause,
            tables,
            cursor: 0,
            rc_number: 0,
            from_batch: false,
            is_error: false,
            error: None,
            buffer_data: None,
            parent_call: None,
            executions: vec![SqlExecution::new()],
        }
    }

    /// The currently open execution run (always present)
    pub fn current_execution(&self) -> &SqlExecution {
        self.executions
            .last()
            .expect("statement always has an open execution run")
    }

    fn current_execution_mut(&mut self) -> &mut SqlExecution {
        self.executions
            .last_mut()
            .expect("statement always has an open execution run")
    }

    /// All execution runs, in trace order
    pub fn executions(&self) -> &[SqlExecution] {
        &self.executions
    }

    pub fn total_executions(&self) -> usize {
        self.executions.len()
    }

    /// Execution time of the current run. Setting it closes the bind
    /// window, so a later bind value starts a fresh run.
    pub fn exec_time(&self) -> f64 {
        self.current_execution().exec_time
    }

    pub fn set_exec_time(&mut self, value: f64) {
        let current = self.current_execution_mut();
        current.binds_open = false;
        current.exec_time = value;
    }

    pub fn fetch_time(&self) -> f64 {
        self.current_execution().fetch_time
    }

    pub fn add_fetch_time(&mut self, value: f64) {
        self.current_execution_mut().fetch_time += value;
    }

    pub fn fetch_count(&self) -> u32 {
        self.current_execution().fetch_count
    }

    /// A successful fetch: one more row, plus its retrieval time
    pub fn record_fetch_row(&mut self, duration: f64) {
        let current = self.current_execution_mut();
        current.fetch_count += 1;
        current.fetch_time += duration;
    }

    /// Exec time plus fetch time of the currently open run
    pub fn duration(&self) -> f64 {
        self.exec_time() + self.fetch_time()
    }

    pub fn total_exec_time(&self) -> f64 {
        self.executions.iter().map(|e| e.exec_time).sum()
    }

    pub fn total_fetch_time(&self) -> f64 {
        self.executions.iter().map(|e| e.fetch_time).sum()
    }

    /// Attach a bind value to the open run. If the run already closed
    /// its bind window, a new execution run is opened first.
    pub fn add_bind_value(&mut self, bind: SqlBindValue) {
        if !self.current_execution().binds_open {
            self.executions.push(SqlExecution::new());
        }
        self.current_execution_mut().bind_values.push(bind);
    }

    /// Record an in-data error (a non-success, non-end return code).
    /// This is statement state, not a processing fault.
    pub fn record_error(&mut self, error: SqlError) {
        self.is_error = true;
        self.error = Some(error);
    }

    pub fn is_select_init(&self) -> bool {
        self.statement.starts_with("%SelectInit")
    }

    /// Append one raw buffer value reported for a %Select statement
    pub fn add_buffer_value(&mut self, value: String) {
        self.buffer_data.get_or_insert_with(Vec::new).push(value);
    }

    /// Column names from the parenthesized list of a %Select/%SelectInit
    /// statement. Empty unless buffer data was attached.
    pub fn buffer_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();

        let is_select_form = self
            .statement
            .get(..7)
            .map_or(false, |p| p.eq_ignore_ascii_case("%select"));
        if !is_select_form {
            return columns;
        }

        let has_buffer_data = self.buffer_data.as_ref().map_or(false, |d| !d.is_empty());
        if !has_buffer_data {
            return columns;
        }

        if let Some(caps) = BUFFER_COLUMNS.captures(&self.statement) {
            for m in COLUMN_SPLIT.find_iter(&caps[1]) {
                columns.push(m.as_str().to_string());
            }
        }

        columns
    }

    /// Buffer column names zipped positionally with the attached buffer
    /// values. Empty when no buffer data was ever attached.
    pub fn buffer_items(&self) -> HashMap<String, String> {
        let columns = self.buffer_columns();
        let values = self.buffer_data.as_deref().unwrap_or(&[]);
        columns.into_iter().zip(values.iter().cloned()).collect()
    }
}

/// Compute the 13-character SQL ID for a statement text.
///
/// MD5 of the text plus a trailing NUL; digest bytes 8..12 and 12..16
/// as two little-endian u32 words form a 64-bit value emitted as 13
/// base-32 digits, most significant first. Bit-for-bit reproducible.
pub fn generate_sql_id(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    let digest = hasher.finalize();

    let msb = u64::from(u32::from_le_bytes([
        digest[8], digest[9], digest[10], digest[11],
    ]));
    let lsb = u64::from(u32::from_le_bytes([
        digest[12], digest[13], digest[14], digest[15],
    ]));
    let sqln = (msb << 32) | lsb;

    let mut sql_id = String::with_capacity(13);
    for digit in (0..13).rev() {
        let index = ((sqln >> (digit * 5)) % 32) as usize;
        sql_id.push(SQL_ID_ALPHABET[index] as char);
    }
    sql_id
}

/// Case-insensitive prefix match, in priority order
fn determine_type(statement: &str) -> Option<SqlType> {
    let checks = [
        ("SELECT", SqlType::Select),
        ("UPDATE", SqlType::Update),
        ("DELETE", SqlType::Delete),
        ("INSERT", SqlType::Insert),
    ];
    let mut found = None;
    for (prefix, sql_type) in checks {
        let matches = statement
            .get(..prefix.len())
            .map_or(false, |p| p.eq_ignore_ascii_case(prefix));
        if matches {
            found = Some(sql_type);
        }
    }
    found
}

fn parse_where_clause(statement: &str) -> String {
    match WHERE_CLAUSE.captures(statement) {
        Some(caps) => caps[1].trim().to_string(),
        None => String::new(),
    }
}

/// Extract the FROM clause and table list. The pattern depends on the
/// statement type; all matches in the text are space-joined to tolerate
/// multi-occurrence statements. Unclassified text yields no clause.
fn parse_from_clause(statement: &str, sql_type: Option<SqlType>) -> (String, Vec<String>) {
    let from_regex = match sql_type {
        Some(SqlType::Select) => &FROM_SELECT,
        Some(SqlType::Update) => &FROM_UPDATE,
        Some(SqlType::Insert) => &FROM_INSERT,
        Some(SqlType::Delete) => &FROM_DELETE,
        None => return (String::new(), Vec::new()),
    };

    let from_clause = from_regex
        .captures_iter(statement)
        .map(|caps| caps[1].trim().to_string())
        .collect::<Vec<_>>()
        .join(" ");

    let mut tables = Vec::new();
    if sql_type == Some(SqlType::Select) {
        for part in from_clause.split(',') {
            if let Some(table) = part.split_whitespace().next() {
                tables.push(table.to_string());
            }
        }
    } else {
        tables.push(from_clause.clone());
    }

    (from_clause, tables)
}

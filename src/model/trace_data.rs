//! The aggregate result of one trace-processing run.
//!
//! `TraceData` transitively owns every entity produced by a run:
//! statements, calls, path roots, grouped views and statistics. It is
//! the single value handed back to the caller.

use crate::model::call::{CallRef, ExecutionCall};
use crate::model::sql::SqlStatement;
use serde::{Deserialize, Serialize};

/// Index of a statement in `TraceData::statements`
pub type StatementRef = usize;

/// Statements sharing identical WHERE-clause text, reduced for hotspot
/// analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlByWhere {
    pub where_clause: String,
    pub number_of_calls: u32,
    pub total_time: f64,
    pub has_error: bool,
}

/// Statements sharing identical FROM-clause text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlByFrom {
    pub from_clause: String,
    pub number_of_calls: u32,
    pub total_time: f64,
    pub has_error: bool,
}

/// One summary counter produced by the statistics pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticItem {
    pub category: String,
    pub label: String,
    pub value: String,
    /// Statement the counter points back at, when it singles one out
    pub tag: Option<StatementRef>,
}

impl StatisticItem {
    pub fn new(category: &str, label: &str, value: String) -> Self {
        Self {
            category: category.to_string(),
            label: label.to_string(),
            value,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: StatementRef) -> Self {
        self.tag = Some(tag);
        self
    }
}

/// Everything one processing run produced
#[derive(Debug, Clone, Default)]
pub struct TraceData {
    /// All parsed statements, in trace order
    pub statements: Vec<SqlStatement>,
    /// Flat registry of every execution call, root or not
    pub calls: Vec<ExecutionCall>,
    /// Root calls of the execution path, in trace order
    pub execution_path: Vec<CallRef>,
    pub sql_by_where: Vec<SqlByWhere>,
    pub sql_by_from: Vec<SqlByFrom>,
    pub statistics: Vec<StatisticItem>,
}

impl TraceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement and return its reference
    pub fn add_statement(&mut self, statement: SqlStatement) -> StatementRef {
        self.statements.push(statement);
        self.statements.len() - 1
    }

    /// Append a call to the flat registry and return its reference
    pub fn add_call(&mut self, call: ExecutionCall) -> CallRef {
        self.calls.push(call);
        self.calls.len() - 1
    }

    /// The most recently parsed statement, if any. Path processors use
    /// this to bind SQL call nodes by positional correspondence.
    pub fn last_statement_ref(&self) -> Option<StatementRef> {
        self.statements.len().checked_sub(1)
    }
}

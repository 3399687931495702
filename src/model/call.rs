//! Execution-call model: one node of the reconstructed call forest.

use crate::model::trace_data::StatementRef;

/// Index of a call in the flat `TraceData::calls` registry
pub type CallRef = usize;

/// What kind of event a call node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Generic control-flow call (connect, disconnect, commit, rollback)
    Call,
    /// A SQL statement invocation, linked to its parsed statement
    Sql,
}

/// One node in the execution path.
///
/// The forest is index-linked: `parent` and `children` refer into the
/// owning `TraceData::calls` vector. Roots carry a context label and are
/// also listed in `TraceData::execution_path`.
#[derive(Debug, Clone)]
pub struct ExecutionCall {
    /// Display label for the call
    pub function: String,
    pub kind: CallKind,
    pub start_line: u64,
    pub stop_line: u64,
    pub duration: f64,
    /// Trace-level context, set on root calls only
    pub context: String,
    /// The statement this call represents (SQL-kind nodes only)
    pub sql_statement: Option<StatementRef>,
    pub parent: Option<CallRef>,
    pub children: Vec<CallRef>,
}

impl ExecutionCall {
    /// Create a call starting and stopping on the same line; the stop
    /// line is adjusted later if a matching closing event appears.
    pub fn new(function: impl Into<String>, kind: CallKind, line_number: u64) -> Self {
        Self {
            function: function.into(),
            kind,
            start_line: line_number,
            stop_line: line_number,
            duration: 0.0,
            context: String::new(),
            sql_statement: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

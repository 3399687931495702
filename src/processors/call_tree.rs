//! Shared call-tree construction for the execution-path processors.
//!
//! The builder keeps one piece of mutable state: the "current call"
//! pointer. Connect events push deeper, disconnect events pop (clamped
//! at the root, where the pointer simply clears), and commit, rollback
//! and SQL statement events insert depth-preserving leaves. Every call
//! created here lands in the flat `TraceData::calls` registry; calls
//! with no parent also become execution-path roots.

use crate::model::{CallKind, CallRef, ExecutionCall, StatementRef, TraceData};

#[derive(Debug)]
pub struct CallTreeBuilder {
    current: Option<CallRef>,
    /// Context label stamped on root calls
    context: &'static str,
}

impl CallTreeBuilder {
    pub fn new(context: &'static str) -> Self {
        Self {
            current: None,
            context,
        }
    }

    /// Clear the pointer for a fresh run
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<CallRef> {
        self.current
    }

    /// Insert a call under the current pointer, or promote it to a root
    /// when no call is open.
    fn attach(&mut self, data: &mut TraceData, mut call: ExecutionCall) -> CallRef {
        match self.current {
            Some(parent) => {
                call.parent = Some(parent);
                let call_ref = data.add_call(call);
                data.calls[parent].children.push(call_ref);
                call_ref
            }
            None => {
                call.context = self.context.to_string();
                let call_ref = data.add_call(call);
                data.execution_path.push(call_ref);
                call_ref
            }
        }
    }

    /// A connect event: new call, pushed as the current one
    pub fn open_call(
        &mut self,
        data: &mut TraceData,
        function: impl Into<String>,
        line_number: u64,
    ) -> CallRef {
        let call = ExecutionCall::new(function, CallKind::Call, line_number);
        let call_ref = self.attach(data, call);
        self.current = Some(call_ref);
        call_ref
    }

    /// A commit/rollback event: leaf under the current call
    pub fn leaf_call(
        &mut self,
        data: &mut TraceData,
        function: impl Into<String>,
        line_number: u64,
    ) -> CallRef {
        let call = ExecutionCall::new(function, CallKind::Call, line_number);
        self.attach(data, call)
    }

    /// A disconnect event: closes the open call (stamping its stop
    /// line) and pops to its parent. Popping past the root leaves the
    /// pointer clear. A disconnect with nothing open still gets
    /// recorded, as its own root.
    pub fn close_call(
        &mut self,
        data: &mut TraceData,
        function: impl Into<String>,
        line_number: u64,
    ) -> CallRef {
        match self.current {
            Some(open) => {
                data.calls[open].stop_line = line_number;
                self.current = data.calls[open].parent;
                open
            }
            None => {
                let call = ExecutionCall::new(function, CallKind::Call, line_number);
                self.attach(data, call)
            }
        }
    }

    /// A SQL statement event: leaf linked to its already-parsed
    /// statement. The statement's back-reference points at the call it
    /// was invoked under (the enclosing call, or the leaf itself when
    /// the statement is a path root).
    pub fn sql_call(
        &mut self,
        data: &mut TraceData,
        function: impl Into<String>,
        line_number: u64,
        duration: f64,
        statement: StatementRef,
    ) -> CallRef {
        let mut call = ExecutionCall::new(function, CallKind::Sql, line_number);
        call.duration = duration;
        call.sql_statement = Some(statement);

        let enclosing = self.current;
        let call_ref = self.attach(data, call);
        data.statements[statement].parent_call = Some(enclosing.unwrap_or(call_ref));
        call_ref
    }
}

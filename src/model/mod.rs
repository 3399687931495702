//! Data model for one trace-processing run.
//!
//! This module defines:
//! - The SQL statement model built incrementally by line processors
//! - The execution-call forest reconstructed from control-flow events
//! - The `TraceData` aggregate that owns everything for one run

pub mod call;
pub mod sql;
pub mod trace_data;

// Re-export main types
pub use call::{CallKind, CallRef, ExecutionCall};
pub use sql::{generate_sql_id, SqlBindValue, SqlError, SqlExecution, SqlStatement, SqlType};
pub use trace_data::{SqlByFrom, SqlByWhere, StatementRef, StatisticItem, TraceData};

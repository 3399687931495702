//! Report schema for serialized run results.
//!
//! A report is the portable slice of a run: counters, the grouped
//! clause views, and a ranked excerpt of the heaviest statements. The
//! full call forest stays in memory; indices in the report refer to
//! nothing outside it.

use crate::model::{SqlByFrom, SqlByWhere, StatisticItem, TraceData};
use crate::utils::config::SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Serialized result of one processing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Schema version of this report
    pub version: String,

    /// Path of the trace file that produced the run
    pub source_file: String,

    /// RFC 3339 timestamp of report generation
    pub generated_at: String,

    pub statement_count: usize,
    pub call_count: usize,

    /// Summary counters ("Total Count", "Longest Execution", ...)
    pub statistics: Vec<StatisticItem>,

    /// Statements grouped by WHERE clause
    pub sql_by_where: Vec<SqlByWhere>,

    /// SELECT/DELETE statements grouped by FROM clause
    pub sql_by_from: Vec<SqlByFrom>,

    /// Heaviest statements, by total time descending
    pub top_statements: Vec<StatementSummary>,
}

/// One statement row in the report's ranked excerpt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementSummary {
    /// 13-digit statement fingerprint
    pub sql_id: String,

    /// Statement type label, `None` when unclassified
    pub sql_type: Option<String>,

    pub statement: String,
    pub tables: Vec<String>,

    pub exec_time: f64,
    pub fetch_time: f64,
    pub fetch_count: u32,
    pub executions: usize,

    pub is_error: bool,
    pub error_message: Option<String>,

    /// Line where the statement was first compiled
    pub line_number: u64,
}

/// Build a report from a completed run.
///
/// `top_n` bounds the ranked statement excerpt; the grouped views and
/// counters always cover the whole run.
pub fn build_report(data: &TraceData, source_file: &str, top_n: usize) -> Report {
    let mut ranked: Vec<&crate::model::SqlStatement> = data.statements.iter().collect();
    ranked.sort_by(|a, b| {
        let a_time = a.total_exec_time() + a.total_fetch_time();
        let b_time = b.total_exec_time() + b.total_fetch_time();
        b_time.partial_cmp(&a_time).unwrap_or(std::cmp::Ordering::Equal)
    });

    let top_statements = ranked
        .into_iter()
        .take(top_n)
        .map(|statement| StatementSummary {
            sql_id: statement.sql_id.clone(),
            sql_type: statement.sql_type.map(|t| t.label().to_string()),
            statement: statement.statement.clone(),
            tables: statement.tables.clone(),
            exec_time: statement.total_exec_time(),
            fetch_time: statement.total_fetch_time(),
            fetch_count: statement.fetch_count(),
            executions: statement.total_executions(),
            is_error: statement.is_error,
            error_message: statement.error.as_ref().map(|e| e.message.clone()),
            line_number: statement.line_number,
        })
        .collect();

    Report {
        version: SCHEMA_VERSION.to_string(),
        source_file: source_file.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        statement_count: data.statements.len(),
        call_count: data.calls.len(),
        statistics: data.statistics.clone(),
        sql_by_where: data.sql_by_where.clone(),
        sql_by_from: data.sql_by_from.clone(),
        top_statements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SqlStatement;

    fn statement(text: &str, exec: f64) -> SqlStatement {
        let mut s = SqlStatement::new(text);
        s.set_exec_time(exec);
        s
    }

    #[test]
    fn test_report_ranks_by_total_time() {
        let mut data = TraceData::new();
        data.add_statement(statement("SELECT A FROM PS_FOO", 0.1));
        data.add_statement(statement("UPDATE PS_BAR SET A = 1", 0.9));

        let report = build_report(&data, "run.tracesql", 10);

        assert_eq!(report.version, SCHEMA_VERSION);
        assert_eq!(report.statement_count, 2);
        assert_eq!(report.top_statements[0].sql_type.as_deref(), Some("UPDATE"));
        assert_eq!(report.top_statements[0].tables, vec!["PS_BAR"]);
    }

    #[test]
    fn test_top_n_truncates() {
        let mut data = TraceData::new();
        for i in 0..5 {
            data.add_statement(statement(&format!("SELECT {i} FROM PS_FOO"), 0.1));
        }

        let report = build_report(&data, "run.tracesql", 2);
        assert_eq!(report.statement_count, 5);
        assert_eq!(report.top_statements.len(), 2);
    }
}

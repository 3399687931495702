//! Post-pass statistics: clause grouping and summary counters.
//!
//! Runs from the SQL processors' completion hooks, once per run, over
//! the finished statement list. Groups are keyed on identical derived
//! clause text - the hotspot view: many statements differing only in
//! literals usually share one WHERE clause.

use crate::model::{SqlType, StatisticItem, SqlByFrom, SqlByWhere, TraceData};
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;

const CATEGORY: &str = "SQL Statements";

/// Append the grouped clause views and summary statistics to the sink.
/// No-op on a run that produced no statements.
pub fn append_sql_summaries(data: &mut TraceData) {
    if data.statements.is_empty() {
        return;
    }

    debug!(
        "aggregating statistics over {} statements",
        data.statements.len()
    );

    group_by_where(data);
    group_by_from(data);
    append_statistics(data);
}

/// Group all non-INSERT statements by WHERE clause
fn group_by_where(data: &mut TraceData) {
    let mut groups: Vec<SqlByWhere> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for statement in &data.statements {
        if statement.sql_type == Some(SqlType::Insert) {
            continue;
        }
        let slot = *index
            .entry(statement.where_clause.clone())
            .or_insert_with(|| {
                groups.push(SqlByWhere {
                    where_clause: statement.where_clause.clone(),
                    number_of_calls: 0,
                    total_time: 0.0,
                    has_error: false,
                });
                groups.len() - 1
            });
        groups[slot].number_of_calls += 1;
        groups[slot].total_time += statement.duration();
        groups[slot].has_error |= statement.is_error;
    }

    data.sql_by_where.extend(groups);
}

/// Group SELECT and DELETE statements by FROM clause
fn group_by_from(data: &mut TraceData) {
    let mut groups: Vec<SqlByFrom> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for statement in &data.statements {
        if !matches!(statement.sql_type, Some(SqlType::Select) | Some(SqlType::Delete)) {
            continue;
        }
        let slot = *index
            .entry(statement.from_clause.clone())
            .or_insert_with(|| {
                groups.push(SqlByFrom {
                    from_clause: statement.from_clause.clone(),
                    number_of_calls: 0,
                    total_time: 0.0,
                    has_error: false,
                });
                groups.len() - 1
            });
        groups[slot].number_of_calls += 1;
        groups[slot].total_time += statement.duration();
        groups[slot].has_error |= statement.is_error;
    }

    data.sql_by_from.extend(groups);
}

fn append_statistics(data: &mut TraceData) {
    // split borrows: read statements, append statistics
    let TraceData {
        statements,
        statistics,
        ..
    } = data;

    statistics.push(StatisticItem::new(
        CATEGORY,
        "Total Count",
        statements.len().to_string(),
    ));

    if let Some((longest_ref, longest)) = statements
        .iter()
        .enumerate()
        .max_by(|a, b| compare_f64(a.1.duration(), b.1.duration()))
    {
        statistics.push(
            StatisticItem::new(CATEGORY, "Longest Execution", format_time(longest.duration()))
                .with_tag(longest_ref),
        );
    }

    if let Some((most_ref, most)) = statements
        .iter()
        .enumerate()
        .max_by_key(|(_, s)| s.fetch_count())
    {
        statistics.push(
            StatisticItem::new(CATEGORY, "Most Fetches", most.fetch_count().to_string())
                .with_tag(most_ref),
        );
    }

    let total: f64 = statements.iter().map(|s| s.duration()).sum();
    statistics.push(StatisticItem::new(CATEGORY, "Total SQL Time", format_time(total)));

    for sql_type in [SqlType::Select, SqlType::Update, SqlType::Insert, SqlType::Delete] {
        let type_total: f64 = statements
            .iter()
            .filter(|s| s.sql_type == Some(sql_type))
            .map(|s| s.duration())
            .sum();
        statistics.push(StatisticItem::new(
            CATEGORY,
            &format!("Total {} Time", sql_type.label()),
            format_time(type_total),
        ));
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn format_time(seconds: f64) -> String {
    // An empty iterator sums to -0.0 (the IEEE additive identity used by
    // std's float Sum); add +0.0 so zero never renders with a sign.
    format!("{:.6}", seconds + 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SqlStatement;

    fn timed_statement(text: &str, exec: f64, fetch: f64) -> SqlStatement {
        let mut statement = SqlStatement::new(text);
        statement.set_exec_time(exec);
        statement.add_fetch_time(fetch);
        statement
    }

    #[test]
    fn test_shared_where_clause_groups_once() {
        let mut data = TraceData::new();
        data.add_statement(timed_statement("SELECT A FROM PS_FOO WHERE X = 1", 0.2, 0.1));
        data.add_statement(timed_statement("SELECT B FROM PS_BAR WHERE X = 1", 0.3, 0.0));

        append_sql_summaries(&mut data);

        let group = data
            .sql_by_where
            .iter()
            .find(|g| g.where_clause == "X = 1")
            .expect("group exists");
        assert_eq!(group.number_of_calls, 2);
        assert!((group.total_time - 0.6).abs() < 1e-9);
        assert!(!group.has_error);
    }

    #[test]
    fn test_insert_excluded_from_where_groups() {
        let mut data = TraceData::new();
        data.add_statement(timed_statement("INSERT INTO PS_FOO (A) VALUES (:1)", 0.1, 0.0));

        append_sql_summaries(&mut data);

        assert!(data.sql_by_where.is_empty());
        assert!(data.sql_by_from.is_empty());
    }

    #[test]
    fn test_from_groups_cover_select_and_delete() {
        let mut data = TraceData::new();
        data.add_statement(timed_statement("SELECT A FROM PS_FOO", 0.1, 0.0));
        data.add_statement(timed_statement("DELETE FROM PS_FOO", 0.2, 0.0));
        data.add_statement(timed_statement("UPDATE PS_FOO SET A = 1", 0.4, 0.0));

        append_sql_summaries(&mut data);

        let group = data
            .sql_by_from
            .iter()
            .find(|g| g.from_clause == "PS_FOO")
            .expect("group exists");
        assert_eq!(group.number_of_calls, 2);
    }

    #[test]
    fn test_summary_counters() {
        let mut data = TraceData::new();
        data.add_statement(timed_statement("SELECT A FROM PS_FOO", 0.1, 0.05));
        let longest = data.add_statement(timed_statement("UPDATE PS_FOO SET A = 1", 0.9, 0.0));

        append_sql_summaries(&mut data);

        let stat = |label: &str| {
            data.statistics
                .iter()
                .find(|s| s.label == label)
                .unwrap_or_else(|| panic!("statistic {label} missing"))
        };

        assert_eq!(stat("Total Count").value, "2");
        assert_eq!(stat("Longest Execution").tag, Some(longest));
        assert_eq!(stat("Total SQL Time").value, "1.050000");
        assert_eq!(stat("Total UPDATE Time").value, "0.900000");
        assert_eq!(stat("Total INSERT Time").value, "0.000000");
    }

    #[test]
    fn test_empty_run_appends_nothing() {
        let mut data = TraceData::new();
        append_sql_summaries(&mut data);
        assert!(data.statistics.is_empty());
    }
}

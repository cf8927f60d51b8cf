// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQL generation and value conversion for the generic row model.
//!
//! Identifiers only ever come from a table's declared columns; every value
//! is a bound parameter. Statements are built on the caller's task and the
//! resulting strings are moved into the connection thread.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

use tutordesk_core::row::{ColumnKind, Condition};
use tutordesk_core::{Filter, Order, Row, Table, TutordeskError};

/// A SQL fragment with its positional parameters.
#[derive(Debug, Clone, Default)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// `id, guest_id, ...` for the table's declared columns.
pub(crate) fn column_list(table: Table) -> String {
    table
        .columns()
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convert a JSON value into a SQLite value.
pub(crate) fn to_sql(column: &str, value: &Value) -> Result<SqlValue, TutordeskError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(SqlValue::Integer(i)),
            (None, Some(f)) => Ok(SqlValue::Real(f)),
            (None, None) => Err(unsupported(column, value)),
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(unsupported(column, value)),
    }
}

fn unsupported(column: &str, value: &Value) -> TutordeskError {
    TutordeskError::Persistence {
        source: format!("column `{column}` cannot store {value}").into(),
    }
}

/// Convert a SQLite value back into JSON according to the column kind.
pub(crate) fn from_sql(kind: ColumnKind, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if kind == ColumnKind::Boolean => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

/// Read the declared columns of `table` starting at column index `offset`.
pub(crate) fn read_row(
    table: Table,
    row: &rusqlite::Row<'_>,
    offset: usize,
) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (i, (name, kind)) in table.columns().iter().enumerate() {
        out.insert((*name).to_string(), from_sql(*kind, row.get_ref(offset + i)?));
    }
    Ok(out)
}

/// Build a `WHERE ...` clause (empty string for the empty filter).
pub(crate) fn where_clause(table: Table, filter: &Filter) -> Result<Statement, TutordeskError> {
    let mut parts = Vec::with_capacity(filter.conditions().len());
    let mut params = Vec::new();

    for condition in filter.conditions() {
        table.check_column(condition.column())?;
        match condition {
            Condition::Eq(column, Value::Null) => parts.push(format!("{column} IS NULL")),
            Condition::Eq(column, value) => {
                params.push(to_sql(column, value)?);
                parts.push(format!("{column} = ?"));
            }
            Condition::In(_, values) if values.is_empty() => parts.push("0".to_string()),
            Condition::In(column, values) => {
                for value in values {
                    params.push(to_sql(column, value)?);
                }
                let marks = vec!["?"; values.len()].join(", ");
                parts.push(format!("{column} IN ({marks})"));
            }
        }
    }

    let sql = if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    };
    Ok(Statement { sql, params })
}

/// `SELECT rowid, <columns> FROM <table> [WHERE ...] [ORDER BY ...]`.
///
/// Ties are broken by insertion order in the requested direction.
pub(crate) fn select(
    table: Table,
    filter: &Filter,
    order: Option<&Order>,
) -> Result<Statement, TutordeskError> {
    let clause = where_clause(table, filter)?;
    let order_sql = match order {
        Some(order) => {
            table.check_column(&order.column)?;
            let dir = if order.ascending { "ASC" } else { "DESC" };
            format!(" ORDER BY {} {dir}, rowid {dir}", order.column)
        }
        None => " ORDER BY rowid ASC".to_string(),
    };
    Ok(Statement {
        sql: format!(
            "SELECT rowid, {} FROM {table}{}{order_sql}",
            column_list(table),
            clause.sql
        ),
        params: clause.params,
    })
}

/// `INSERT INTO <table> (<row keys>) VALUES (?, ...)`.
pub(crate) fn insert(table: Table, row: &Row) -> Result<Statement, TutordeskError> {
    if row.is_empty() {
        return Err(TutordeskError::Persistence {
            source: format!("cannot insert an empty row into `{table}`").into(),
        });
    }
    let mut columns = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for (column, value) in row {
        table.check_column(column)?;
        columns.push(column.as_str());
        params.push(to_sql(column, value)?);
    }
    let marks = vec!["?"; columns.len()].join(", ");
    Ok(Statement {
        sql: format!("INSERT INTO {table} ({}) VALUES ({marks})", columns.join(", ")),
        params,
    })
}

/// `UPDATE <table> SET <patch keys> = ? WHERE rowid = ?`; the rowid is bound last.
pub(crate) fn update_by_rowid(table: Table, patch: &Row) -> Result<Statement, TutordeskError> {
    if patch.is_empty() {
        return Err(TutordeskError::Persistence {
            source: format!("empty update patch for `{table}`").into(),
        });
    }
    let mut sets = Vec::with_capacity(patch.len());
    let mut params = Vec::with_capacity(patch.len() + 1);
    for (column, value) in patch {
        table.check_column(column)?;
        if column == "id" {
            return Err(TutordeskError::Persistence {
                source: format!("`{table}.id` is immutable").into(),
            });
        }
        sets.push(format!("{column} = ?"));
        params.push(to_sql(column, value)?);
    }
    Ok(Statement {
        sql: format!("UPDATE {table} SET {} WHERE rowid = ?", sets.join(", ")),
        params,
    })
}

// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic row model spoken by the persistence collaborator.
//!
//! Rows are JSON objects keyed by column name. Typed records cross this
//! boundary through serde via [`to_row`] and [`from_row`]. Every table
//! declares its columns up front, and adapters reject anything else.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::TutordeskError;

/// A single row: column name to JSON value.
pub type Row = Map<String, Value>;

/// Storage kind of a column, used by adapters to convert values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Boolean,
}

/// The tables owned by the support subsystem.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Table {
    Conversations,
    Messages,
}

const CONVERSATION_COLUMNS: &[(&str, ColumnKind)] = &[
    ("id", ColumnKind::Text),
    ("guest_id", ColumnKind::Text),
    ("guest_email", ColumnKind::Text),
    ("guest_name", ColumnKind::Text),
    ("status", ColumnKind::Text),
    ("assigned_admin_id", ColumnKind::Text),
    ("total_messages", ColumnKind::Integer),
    ("last_message_at", ColumnKind::Text),
    ("created_at", ColumnKind::Text),
    ("closed_at", ColumnKind::Text),
];

const MESSAGE_COLUMNS: &[(&str, ColumnKind)] = &[
    ("id", ColumnKind::Text),
    ("conversation_id", ColumnKind::Text),
    ("sender_type", ColumnKind::Text),
    ("sender_id", ColumnKind::Text),
    ("sender_name", ColumnKind::Text),
    ("content", ColumnKind::Text),
    ("is_read", ColumnKind::Boolean),
    ("created_at", ColumnKind::Text),
];

impl Table {
    /// Declared columns in storage order.
    pub fn columns(&self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Table::Conversations => CONVERSATION_COLUMNS,
            Table::Messages => MESSAGE_COLUMNS,
        }
    }

    /// Kind of the named column, or `None` if the table has no such column.
    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.columns()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, kind)| *kind)
    }

    /// Rejects any column the table does not declare.
    pub fn check_column(&self, column: &str) -> Result<ColumnKind, TutordeskError> {
        self.column_kind(column).ok_or_else(|| TutordeskError::Persistence {
            source: format!("unknown column `{column}` for table `{self}`").into(),
        })
    }
}

/// One predicate of a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`. A JSON `null` matches SQL `IS NULL`.
    Eq(String, Value),
    /// `column IN (values)`. An empty list matches nothing.
    In(String, Vec<Value>),
}

impl Condition {
    /// Column the condition applies to.
    pub fn column(&self) -> &str {
        match self {
            Condition::Eq(column, _) | Condition::In(column, _) => column,
        }
    }

    fn matches(&self, row: &Row) -> bool {
        match self {
            Condition::Eq(column, expected) => {
                let actual = row.get(column).unwrap_or(&Value::Null);
                values_equal(actual, expected)
            }
            Condition::In(column, candidates) => {
                let actual = row.get(column).unwrap_or(&Value::Null);
                candidates.iter().any(|c| values_equal(actual, c))
            }
        }
    }
}

/// Booleans stored as integers compare equal to their JSON bool form.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Number(n)) | (Value::Number(n), Value::Bool(x)) => {
            n.as_i64() == Some(i64::from(*x))
        }
        _ => a == b,
    }
}

/// A conjunction of conditions. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    /// Adds a membership condition.
    pub fn is_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.conditions.push(Condition::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// The conditions, in the order they were added.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluates the filter against a row held in memory.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

/// Sort order for a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

/// Kind of row change carried by a [`ChangeEvent`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Set of change kinds a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventMask {
    pub const ALL: EventMask = EventMask {
        insert: true,
        update: true,
        delete: true,
    };

    pub const INSERT: EventMask = EventMask {
        insert: true,
        update: false,
        delete: false,
    };

    pub fn contains(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }
}

/// A row change published by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Row before the change (UPDATE and DELETE).
    pub old: Option<Row>,
    /// Row after the change (INSERT and UPDATE).
    pub new: Option<Row>,
}

impl ChangeEvent {
    pub fn inserted(table: Table, row: Row) -> Self {
        Self {
            table,
            kind: ChangeKind::Insert,
            old: None,
            new: Some(row),
        }
    }

    pub fn updated(table: Table, old: Row, new: Row) -> Self {
        Self {
            table,
            kind: ChangeKind::Update,
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn deleted(table: Table, old: Row) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            old: Some(old),
            new: None,
        }
    }

    /// The row a subscription filter is evaluated against: `new`, or `old` for deletes.
    pub fn subject(&self) -> Option<&Row> {
        self.new.as_ref().or(self.old.as_ref())
    }

    /// The `id` column of the subject row.
    pub fn row_id(&self) -> Option<&str> {
        self.subject()?.get("id")?.as_str()
    }
}

/// Serializes a typed record into a row.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row, TutordeskError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(TutordeskError::Internal(format!(
            "record serialized to {other}, expected an object"
        ))),
        Err(e) => Err(TutordeskError::Internal(format!("record serialization failed: {e}"))),
    }
}

/// Deserializes a row into a typed record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, TutordeskError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| TutordeskError::Persistence {
        source: Box::new(e),
    })
}

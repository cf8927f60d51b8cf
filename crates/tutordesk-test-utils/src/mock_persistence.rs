// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence adapter for deterministic testing.
//!
//! `MockPersistence` implements `PersistenceAdapter` over plain vectors,
//! records every call for assertions, and can be told to fail specific
//! operations. Writes publish change events on a real [`ChangeFeed`].

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use tutordesk_core::{
    AdapterType, ChangeEvent, EventMask, Filter, HealthStatus, Order, PersistenceAdapter,
    PluginAdapter, Row, Subscription, Table, TutordeskError,
};
use tutordesk_storage::ChangeFeed;

/// Persistence operations, as recorded and as failure-injection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Subscribe,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub table: Table,
}

/// A mock persistence collaborator holding rows in memory.
pub struct MockPersistence {
    tables: Mutex<HashMap<Table, Vec<Row>>>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<Operation>>,
    feed: ChangeFeed,
}

impl MockPersistence {
    /// Create an empty store with a roomy change feed.
    pub fn new() -> Self {
        Self::with_feed_capacity(256)
    }

    /// Create an empty store whose subscribers lag after `capacity` events.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            feed: ChangeFeed::new(capacity),
        }
    }

    /// The feed writes are published on. Tests may publish on it directly.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Put rows in place without recording a call or publishing events.
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = Row>) {
        lock(&self.tables).entry(table).or_default().extend(rows);
    }

    /// Current rows of a table, in insertion order.
    pub fn rows(&self, table: Table) -> Vec<Row> {
        lock(&self.tables).get(&table).cloned().unwrap_or_default()
    }

    /// Make every later call of `operation` fail.
    pub fn fail_on(&self, operation: Operation) {
        lock(&self.failing).insert(operation);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        lock(&self.failing).clear();
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// How many calls of `operation` were made.
    pub fn call_count(&self, operation: Operation) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn record(&self, operation: Operation, table: Table) -> Result<(), TutordeskError> {
        lock(&self.calls).push(Call { operation, table });
        if lock(&self.failing).contains(&operation) {
            return Err(TutordeskError::Persistence {
                source: format!("injected {operation:?} failure on {table}").into(),
            });
        }
        Ok(())
    }
}

impl Default for MockPersistence {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_filter(table: Table, filter: &Filter) -> Result<(), TutordeskError> {
    for condition in filter.conditions() {
        table.check_column(condition.column())?;
    }
    Ok(())
}

fn check_row(table: Table, row: &Row) -> Result<(), TutordeskError> {
    for column in row.keys() {
        table.check_column(column)?;
    }
    Ok(())
}

/// Orders JSON scalars the way the SQL store would: nulls first.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Fill undeclared columns with null so rows look like stored rows.
fn complete(table: Table, mut row: Row) -> Row {
    for (column, _) in table.columns() {
        row.entry(column.to_string()).or_insert(Value::Null);
    }
    row
}

#[async_trait]
impl PluginAdapter for MockPersistence {
    fn name(&self) -> &str {
        "mock-persistence"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Persistence
    }

    async fn health_check(&self) -> Result<HealthStatus, TutordeskError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TutordeskError> {
        Ok(())
    }
}

#[async_trait]
impl PersistenceAdapter for MockPersistence {
    async fn select(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, TutordeskError> {
        self.record(Operation::Select, table)?;
        check_filter(table, filter)?;
        if let Some(order) = order {
            table.check_column(&order.column)?;
        }

        let tables = lock(&self.tables);
        let mut matching: Vec<(usize, &Row)> = tables
            .get(&table)
            .map(|rows| rows.iter().enumerate().filter(|(_, r)| filter.matches(r)).collect())
            .unwrap_or_default();

        if let Some(order) = order {
            // Ties fall back to insertion order in the same direction.
            matching.sort_by(|(ia, a), (ib, b)| {
                let by_column = compare(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                )
                .then(ia.cmp(ib));
                if order.ascending {
                    by_column
                } else {
                    by_column.reverse()
                }
            });
        }
        Ok(matching.into_iter().map(|(_, r)| r.clone()).collect())
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, TutordeskError> {
        self.record(Operation::Insert, table)?;
        for row in &rows {
            check_row(table, row)?;
        }
        let stored: Vec<Row> = rows.into_iter().map(|r| complete(table, r)).collect();
        lock(&self.tables)
            .entry(table)
            .or_default()
            .extend(stored.iter().cloned());
        self.feed.publish_all(
            stored
                .iter()
                .cloned()
                .map(|r| ChangeEvent::inserted(table, r)),
        );
        Ok(stored)
    }

    async fn update(
        &self,
        table: Table,
        patch: Row,
        filter: &Filter,
    ) -> Result<Vec<Row>, TutordeskError> {
        self.record(Operation::Update, table)?;
        check_filter(table, filter)?;
        check_row(table, &patch)?;

        let mut changes = Vec::new();
        {
            let mut tables = lock(&self.tables);
            for row in tables.entry(table).or_default().iter_mut() {
                if !filter.matches(row) {
                    continue;
                }
                let old = row.clone();
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                changes.push((old, row.clone()));
            }
        }

        let updated = changes.iter().map(|(_, new)| new.clone()).collect();
        self.feed.publish_all(
            changes
                .into_iter()
                .map(|(old, new)| ChangeEvent::updated(table, old, new)),
        );
        Ok(updated)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, TutordeskError> {
        self.record(Operation::Delete, table)?;
        check_filter(table, filter)?;

        let removed: Vec<Row> = {
            let mut tables = lock(&self.tables);
            let rows = tables.entry(table).or_default();
            let (removed, kept) = std::mem::take(rows)
                .into_iter()
                .partition(|r| filter.matches(r));
            *rows = kept;
            removed
        };
        self.feed.publish_all(
            removed
                .iter()
                .cloned()
                .map(|r| ChangeEvent::deleted(table, r)),
        );
        Ok(removed)
    }

    async fn subscribe(
        &self,
        table: Table,
        mask: EventMask,
        filter: Filter,
    ) -> Result<Subscription, TutordeskError> {
        self.record(Operation::Subscribe, table)?;
        check_filter(table, &filter)?;
        Ok(self.feed.subscribe(table, mask, filter))
    }
}

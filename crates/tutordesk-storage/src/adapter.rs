// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`PersistenceAdapter`] trait.

use async_trait::async_trait;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tracing::debug;

use tutordesk_config::model::{LiveConfig, StorageConfig};
use tutordesk_core::{
    AdapterType, ChangeEvent, EventMask, Filter, HealthStatus, Order, PersistenceAdapter,
    PluginAdapter, Row, Subscription, Table, TutordeskError,
};

use crate::database::{map_tr_err, Database};
use crate::feed::ChangeFeed;
use crate::sql::{self, column_list, read_row};

/// SQLite-backed persistence collaborator.
///
/// Every successful write publishes one [`ChangeEvent`] per affected row on
/// the adapter's [`ChangeFeed`], after the transaction commits.
pub struct SqlitePersistence {
    db: Database,
    feed: ChangeFeed,
}

impl SqlitePersistence {
    /// Wrap an open database with the given change feed.
    pub fn new(db: Database, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// Open the configured database and create a change feed for it.
    pub async fn open(storage: &StorageConfig, live: &LiveConfig) -> Result<Self, TutordeskError> {
        let db = Database::open_with(storage).await?;
        Ok(Self::new(db, ChangeFeed::new(live.feed_capacity)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Rows (with rowids) currently matching `filter`, read inside `tx`.
    fn matching_rows(
        tx: &rusqlite::Transaction<'_>,
        table: Table,
        stmt: &sql::Statement,
    ) -> rusqlite::Result<Vec<(i64, Row)>> {
        let mut prepared = tx.prepare(&stmt.sql)?;
        let rows = prepared.query_map(params_from_iter(stmt.params.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, read_row(table, row, 1)?))
        })?;
        rows.collect()
    }
}

fn read_back_sql(table: Table) -> String {
    format!("SELECT rowid, {} FROM {table} WHERE rowid = ?", column_list(table))
}

#[async_trait]
impl PluginAdapter for SqlitePersistence {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Persistence
    }

    async fn health_check(&self) -> Result<HealthStatus, TutordeskError> {
        match self.db.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), TutordeskError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl PersistenceAdapter for SqlitePersistence {
    async fn select(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, TutordeskError> {
        let stmt = sql::select(table, filter, order)?;
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Row>, rusqlite::Error> {
                let mut prepared = conn.prepare(&stmt.sql)?;
                let rows = prepared
                    .query_map(params_from_iter(stmt.params.iter()), |row| read_row(table, row, 1))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, TutordeskError> {
        let statements = rows
            .iter()
            .map(|row| sql::insert(table, row))
            .collect::<Result<Vec<_>, _>>()?;
        let read_back = read_back_sql(table);

        let stored = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<Row>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let mut stored = Vec::with_capacity(statements.len());
                for stmt in &statements {
                    tx.execute(&stmt.sql, params_from_iter(stmt.params.iter()))?;
                    let rowid = tx.last_insert_rowid();
                    stored.push(tx.query_row(&read_back, [rowid], |row| read_row(table, row, 1))?);
                }
                tx.commit()?;
                Ok(stored)
            })
            .await
            .map_err(map_tr_err)?;

        debug!(%table, count = stored.len(), "rows inserted");
        self.feed.publish_all(
            stored
                .iter()
                .cloned()
                .map(|row| ChangeEvent::inserted(table, row)),
        );
        Ok(stored)
    }

    async fn update(
        &self,
        table: Table,
        patch: Row,
        filter: &Filter,
    ) -> Result<Vec<Row>, TutordeskError> {
        let matching = sql::select(table, filter, None)?;
        let update = sql::update_by_rowid(table, &patch)?;
        let read_back = read_back_sql(table);

        let changes = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<(Row, Row)>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let before = Self::matching_rows(&tx, table, &matching)?;
                let mut changes = Vec::with_capacity(before.len());
                for (rowid, old) in before {
                    let mut params = update.params.clone();
                    params.push(SqlValue::Integer(rowid));
                    tx.execute(&update.sql, params_from_iter(params.iter()))?;
                    let new = tx.query_row(&read_back, [rowid], |row| read_row(table, row, 1))?;
                    changes.push((old, new));
                }
                tx.commit()?;
                Ok(changes)
            })
            .await
            .map_err(map_tr_err)?;

        debug!(%table, count = changes.len(), "rows updated");
        let updated = changes.iter().map(|(_, new)| new.clone()).collect();
        self.feed.publish_all(
            changes
                .into_iter()
                .map(|(old, new)| ChangeEvent::updated(table, old, new)),
        );
        Ok(updated)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, TutordeskError> {
        let matching = sql::select(table, filter, None)?;
        let delete_sql = format!("DELETE FROM {table} WHERE rowid = ?");

        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<Row>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let before = Self::matching_rows(&tx, table, &matching)?;
                let mut removed = Vec::with_capacity(before.len());
                for (rowid, old) in before {
                    tx.execute(&delete_sql, [rowid])?;
                    removed.push(old);
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(map_tr_err)?;

        debug!(%table, count = removed.len(), "rows deleted");
        self.feed.publish_all(
            removed
                .iter()
                .cloned()
                .map(|row| ChangeEvent::deleted(table, row)),
        );
        Ok(removed)
    }

    async fn subscribe(
        &self,
        table: Table,
        mask: EventMask,
        filter: Filter,
    ) -> Result<Subscription, TutordeskError> {
        // Reject unknown columns up front; a bad filter would otherwise match nothing forever.
        sql::where_clause(table, &filter)?;
        Ok(self.feed.subscribe(table, mask, filter))
    }
}

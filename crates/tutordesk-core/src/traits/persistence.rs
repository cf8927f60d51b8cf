// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence collaborator trait: row-level CRUD plus change subscriptions.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::error::TutordeskError;
use crate::row::{ChangeEvent, EventMask, Filter, Order, Row, Table};
use crate::traits::adapter::PluginAdapter;

/// Adapter for the hosted relational store the support subsystem sits on.
///
/// The store is the single source of truth. Components hold an injected
/// `Arc<dyn PersistenceAdapter>` rather than reaching for a global client.
#[async_trait]
pub trait PersistenceAdapter: PluginAdapter {
    /// Selects rows matching `filter`, optionally ordered.
    async fn select(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, TutordeskError>;

    /// Inserts rows and returns them as stored.
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, TutordeskError>;

    /// Applies `patch` to every row matching `filter`; returns the updated rows.
    async fn update(
        &self,
        table: Table,
        patch: Row,
        filter: &Filter,
    ) -> Result<Vec<Row>, TutordeskError>;

    /// Deletes every row matching `filter`; returns the removed rows.
    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, TutordeskError>;

    /// Subscribes to changes on `table` whose kind is in `mask` and whose
    /// subject row matches `filter`.
    ///
    /// Only changes committed after this call returns are delivered.
    async fn subscribe(
        &self,
        table: Table,
        mask: EventMask,
        filter: Filter,
    ) -> Result<Subscription, TutordeskError>;
}

/// Item yielded by a [`Subscription`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionItem {
    /// A change matching the subscription.
    Event(ChangeEvent),
    /// The subscriber fell behind and this many events were dropped.
    /// Local state derived from the stream is stale and must be refetched.
    Gap(u64),
}

/// A live change stream scoped to one table, mask and filter.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// releases it.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    table: Table,
    mask: EventMask,
    filter: Filter,
}

impl Subscription {
    /// Wraps a receiver from an adapter's change feed.
    pub fn new(
        rx: broadcast::Receiver<ChangeEvent>,
        table: Table,
        mask: EventMask,
        filter: Filter,
    ) -> Self {
        Self {
            rx,
            table,
            mask,
            filter,
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// True if the event falls inside this subscription's scope.
    pub fn wants(&self, event: &ChangeEvent) -> bool {
        event.table == self.table
            && self.mask.contains(event.kind)
            && event
                .subject()
                .is_some_and(|row| self.filter.matches(row))
    }

    /// Waits for the next matching item. Returns `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<SubscriptionItem> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(SubscriptionItem::Event(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => return Some(SubscriptionItem::Gap(missed)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next matching item if one is already buffered.
    pub fn try_next(&mut self) -> Option<SubscriptionItem> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(SubscriptionItem::Event(event)),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => return Some(SubscriptionItem::Gap(missed)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Releases the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

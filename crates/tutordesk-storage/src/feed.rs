// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process change feed backing [`Subscription`]s.
//!
//! A single broadcast channel carries every committed row change. Each
//! subscription filters by table, kind and row on its own receiver, so a slow
//! subscriber lags (and is told so) without holding back writers.

use tokio::sync::broadcast;
use tracing::trace;

use tutordesk_core::{ChangeEvent, EventMask, Filter, Subscription, Table};

/// Broadcasts committed changes to live subscriptions.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish one change. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let table = event.table;
        let kind = event.kind;
        match self.tx.send(event) {
            Ok(receivers) => trace!(%table, %kind, receivers, "change published"),
            Err(_) => trace!(%table, %kind, "change dropped: no subscribers"),
        }
    }

    /// Publish a batch of changes in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Open a subscription that only sees changes published from now on.
    pub fn subscribe(&self, table: Table, mask: EventMask, filter: Filter) -> Subscription {
        Subscription::new(self.tx.subscribe(), table, mask, filter)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

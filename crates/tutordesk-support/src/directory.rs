// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation directory: creation, listing and status transitions.
//!
//! No transition checks the current status. Concurrent writers are resolved
//! by the store (last write wins).

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use tutordesk_core::row::{from_row, to_row};
use tutordesk_core::types::now_timestamp;
use tutordesk_core::{
    Conversation, ConversationStatus, Filter, Order, PersistenceAdapter, Row, Table,
    TutordeskError,
};

/// Owns the set of support conversations.
#[derive(Clone)]
pub struct ConversationDirectory {
    store: Arc<dyn PersistenceAdapter>,
}

impl ConversationDirectory {
    pub fn new(store: Arc<dyn PersistenceAdapter>) -> Self {
        Self { store }
    }

    /// Conversations, most recent activity first, optionally narrowed to one status.
    pub async fn list(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, TutordeskError> {
        let filter = status_filter(status);
        let rows = self
            .store
            .select(
                Table::Conversations,
                &filter,
                Some(&Order::desc("created_at")),
            )
            .await
            .map_err(|e| TutordeskError::query("list", e.into_source()))?;

        let mut conversations = decode_all(rows, "list")?;
        sort_by_activity(&mut conversations);
        Ok(conversations)
    }

    /// A single conversation. Lookup failures are logged and read as absent.
    pub async fn get(&self, id: &str) -> Option<Conversation> {
        match self.fetch(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "conversation lookup failed");
                None
            }
        }
    }

    async fn fetch(&self, id: &str) -> Result<Option<Conversation>, TutordeskError> {
        let rows = self
            .store
            .select(Table::Conversations, &Filter::all().eq("id", id), None)
            .await?;
        rows.into_iter().next().map(from_row::<Conversation>).transpose()
    }

    /// Start a brand-new `open` conversation for a guest.
    ///
    /// Existing conversations for the same guest are never reused.
    pub async fn create(
        &self,
        guest_id: &str,
        guest_email: Option<&str>,
        guest_name: Option<&str>,
    ) -> Result<Conversation, TutordeskError> {
        if guest_id.trim().is_empty() {
            return Err(TutordeskError::Validation("guest id is required".into()));
        }

        let conversation = Conversation::new(
            guest_id.to_string(),
            guest_email.map(str::to_string),
            guest_name.map(str::to_string),
        );
        let row = to_row(&conversation)?;
        let stored = self
            .store
            .insert(Table::Conversations, vec![row])
            .await
            .map_err(|e| TutordeskError::Create {
                source: e.into_source(),
            })?;

        let row = stored.into_iter().next().ok_or_else(|| TutordeskError::Create {
            source: "store returned no row for the new conversation".into(),
        })?;
        let created: Conversation = from_row(row).map_err(|e| TutordeskError::Create {
            source: e.into_source(),
        })?;
        info!(conversation_id = %created.id, guest_id = %created.guest_id, "conversation created");
        Ok(created)
    }

    /// Hand a conversation to an agent: status `in-progress`, assignee set.
    pub async fn assign(&self, id: &str, agent_id: &str) -> Result<Conversation, TutordeskError> {
        self.update_status(id, ConversationStatus::InProgress, Some(agent_id))
            .await
    }

    /// Close a conversation and stamp `closed_at`. Closing twice restamps.
    pub async fn close(&self, id: &str) -> Result<Conversation, TutordeskError> {
        self.update_status(id, ConversationStatus::Closed, None).await
    }

    /// General transition primitive behind [`assign`](Self::assign) and [`close`](Self::close).
    ///
    /// The assignee is written only when given. `closed_at` is stamped for
    /// `closed` and cleared for every other status.
    pub async fn update_status(
        &self,
        id: &str,
        status: ConversationStatus,
        agent_id: Option<&str>,
    ) -> Result<Conversation, TutordeskError> {
        let mut patch = Row::new();
        patch.insert("status".into(), Value::String(status.to_string()));
        if let Some(agent) = agent_id {
            patch.insert("assigned_admin_id".into(), Value::String(agent.to_string()));
        }
        let closed_at = match status {
            ConversationStatus::Closed => Value::String(now_timestamp()),
            _ => Value::Null,
        };
        patch.insert("closed_at".into(), closed_at);

        let updated = self.patch_one(id, patch, "update_status").await?;
        info!(conversation_id = %id, status = %status, agent_id = ?agent_id, "conversation status updated");
        Ok(updated)
    }

    /// Count one more message and move `last_message_at` to `at`.
    ///
    /// Read-then-write; concurrent senders may under-count.
    pub async fn record_activity(&self, id: &str, at: &str) -> Result<Conversation, TutordeskError> {
        let current = self
            .fetch(id)
            .await
            .map_err(|e| TutordeskError::query("record_activity", e.into_source()))?
            .ok_or_else(|| TutordeskError::NotFound {
                entity: "conversation",
                id: id.to_string(),
            })?;

        let mut patch = Row::new();
        patch.insert("total_messages".into(), json!(current.total_messages + 1));
        patch.insert("last_message_at".into(), json!(at));
        let updated = self.patch_one(id, patch, "record_activity").await?;
        debug!(conversation_id = %id, total_messages = updated.total_messages, "activity recorded");
        Ok(updated)
    }

    /// Remove a conversation and its messages. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, TutordeskError> {
        // Messages first, so message subscribers see their own DELETE events.
        self.store
            .delete(Table::Messages, &Filter::all().eq("conversation_id", id))
            .await
            .map_err(|e| TutordeskError::query("delete", e.into_source()))?;
        let removed = self
            .store
            .delete(Table::Conversations, &Filter::all().eq("id", id))
            .await
            .map_err(|e| TutordeskError::query("delete", e.into_source()))?;

        let existed = !removed.is_empty();
        if existed {
            info!(conversation_id = %id, "conversation deleted");
        }
        Ok(existed)
    }

    async fn patch_one(
        &self,
        id: &str,
        patch: Row,
        operation: &'static str,
    ) -> Result<Conversation, TutordeskError> {
        let rows = self
            .store
            .update(Table::Conversations, patch, &Filter::all().eq("id", id))
            .await
            .map_err(|e| TutordeskError::query(operation, e.into_source()))?;
        let row = rows.into_iter().next().ok_or_else(|| TutordeskError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        })?;
        from_row(row).map_err(|e| TutordeskError::query(operation, e.into_source()))
    }
}

pub(crate) fn status_filter(status: Option<ConversationStatus>) -> Filter {
    match status {
        Some(status) => Filter::all().eq("status", status.to_string()),
        None => Filter::all(),
    }
}

/// Most recent activity first; equal timestamps keep their incoming order.
pub(crate) fn sort_by_activity(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.activity_at().cmp(a.activity_at()));
}

fn decode_all(
    rows: Vec<Row>,
    operation: &'static str,
) -> Result<Vec<Conversation>, TutordeskError> {
    rows.into_iter()
        .map(|row| from_row(row).map_err(|e| TutordeskError::query(operation, e.into_source())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tutordesk_config::model::{LiveConfig, StorageConfig};
    use tutordesk_storage::SqlitePersistence;

    async fn directory() -> (ConversationDirectory, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            database_path: dir.path().join("support.db").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let store = SqlitePersistence::open(&storage, &LiveConfig::default())
            .await
            .unwrap();
        (ConversationDirectory::new(Arc::new(store)), dir)
    }

    fn closed_at_iff_closed(c: &Conversation) -> bool {
        c.closed_at.is_some() == (c.status == ConversationStatus::Closed)
    }

    #[tokio::test]
    async fn create_starts_open_and_empty() {
        let (directory, _dir) = directory().await;
        let conv = directory
            .create("guest-42", Some("g@example.com"), Some("Gia"))
            .await
            .unwrap();
        assert_eq!(conv.status, ConversationStatus::Open);
        assert_eq!(conv.total_messages, 0);
        assert!(conv.assigned_admin_id.is_none());
        assert!(conv.closed_at.is_none());
        assert_eq!(conv.guest_email.as_deref(), Some("g@example.com"));
    }

    #[tokio::test]
    async fn create_never_reuses_a_conversation() {
        let (directory, _dir) = directory().await;
        let first = directory.create("guest-1", None, None).await.unwrap();
        let second = directory.create("guest-1", None, None).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(directory.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_requires_a_guest_id() {
        let (directory, _dir) = directory().await;
        let err = directory.create("  ", None, None).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn assign_is_visible_through_get() {
        let (directory, _dir) = directory().await;
        let conv = directory.create("guest-1", None, None).await.unwrap();
        directory.assign(&conv.id, "agent-7").await.unwrap();

        let fetched = directory.get(&conv.id).await.unwrap();
        assert_eq!(fetched.status, ConversationStatus::InProgress);
        assert_eq!(fetched.assigned_admin_id.as_deref(), Some("agent-7"));
        assert!(closed_at_iff_closed(&fetched));
    }

    #[tokio::test]
    async fn close_stamps_closed_at_after_creation() {
        let (directory, _dir) = directory().await;
        let conv = directory.create("guest-1", None, None).await.unwrap();
        directory.close(&conv.id).await.unwrap();

        let fetched = directory.get(&conv.id).await.unwrap();
        assert_eq!(fetched.status, ConversationStatus::Closed);
        let closed_at = fetched.closed_at.clone().unwrap();
        assert!(closed_at >= fetched.created_at);
    }

    #[tokio::test]
    async fn closing_twice_succeeds_and_restamps() {
        let (directory, _dir) = directory().await;
        let conv = directory.create("guest-1", None, None).await.unwrap();
        let first = directory.close(&conv.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = directory.close(&conv.id).await.unwrap();
        assert!(second.closed_at.unwrap() > first.closed_at.unwrap());
    }

    #[tokio::test]
    async fn reopening_clears_closed_at() {
        let (directory, _dir) = directory().await;
        let conv = directory.create("guest-1", None, None).await.unwrap();
        directory.close(&conv.id).await.unwrap();
        let reopened = directory
            .update_status(&conv.id, ConversationStatus::Waiting, None)
            .await
            .unwrap();
        assert_eq!(reopened.status, ConversationStatus::Waiting);
        assert!(closed_at_iff_closed(&reopened));
    }

    #[tokio::test]
    async fn assigning_a_closed_conversation_is_allowed() {
        let (directory, _dir) = directory().await;
        let conv = directory.create("guest-1", None, None).await.unwrap();
        directory.close(&conv.id).await.unwrap();
        let assigned = directory.assign(&conv.id, "agent-2").await.unwrap();
        assert_eq!(assigned.status, ConversationStatus::InProgress);
        assert!(assigned.closed_at.is_none());
    }

    #[tokio::test]
    async fn update_status_on_missing_id_is_not_found() {
        let (directory, _dir) = directory().await;
        let err = directory.close("ghost").await.unwrap_err();
        assert!(matches!(err, TutordeskError::NotFound { .. }));
        assert!(directory.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (directory, _dir) = directory().await;
        let open = directory.create("g-open", None, None).await.unwrap();
        let busy = directory.create("g-busy", None, None).await.unwrap();
        let done = directory.create("g-done", None, None).await.unwrap();
        directory.assign(&busy.id, "agent").await.unwrap();
        directory.close(&done.id).await.unwrap();

        let closed = directory
            .list(Some(ConversationStatus::Closed))
            .await
            .unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, done.id);

        let all = directory.list(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|c| c.id == open.id));
    }

    #[tokio::test]
    async fn list_orders_by_latest_activity() {
        let (directory, _dir) = directory().await;
        let older = directory.create("g-1", None, None).await.unwrap();
        let newer = directory.create("g-2", None, None).await.unwrap();
        directory
            .record_activity(&older.id, "2999-01-01T00:00:00.000Z")
            .await
            .unwrap();

        let ids: Vec<_> = directory
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }

    #[tokio::test]
    async fn delete_removes_conversation() {
        let (directory, _dir) = directory().await;
        let conv = directory.create("g-1", None, None).await.unwrap();
        assert!(directory.delete(&conv.id).await.unwrap());
        assert!(!directory.delete(&conv.id).await.unwrap());
        assert!(directory.get(&conv.id).await.is_none());
    }

    #[test]
    fn sort_by_activity_falls_back_to_created_at() {
        let mut a = Conversation::new("a".into(), None, None);
        a.created_at = "2026-01-01T00:00:00.000Z".into();
        a.last_message_at = Some("2026-03-01T00:00:00.000Z".into());
        let mut b = Conversation::new("b".into(), None, None);
        b.created_at = "2026-02-01T00:00:00.000Z".into();

        let mut list = vec![b.clone(), a.clone()];
        sort_by_activity(&mut list);
        assert_eq!(list[0].guest_id, "a");
        assert_eq!(list[1].guest_id, "b");
    }
}

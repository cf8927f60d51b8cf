// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log per conversation, plus read-state bookkeeping.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use tutordesk_core::row::{from_row, to_row};
use tutordesk_core::types::{new_record_id, now_timestamp};
use tutordesk_core::{
    Filter, Message, Order, PersistenceAdapter, Row, SenderType, Table, TutordeskError,
};

use crate::directory::ConversationDirectory;

/// Who a message is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
}

impl Author {
    pub fn new(sender_type: SenderType) -> Self {
        Self {
            sender_type,
            sender_id: None,
            sender_name: None,
        }
    }

    pub fn guest(guest_id: impl Into<String>) -> Self {
        Self::new(SenderType::Guest).with_id(guest_id)
    }

    pub fn admin(agent_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self::new(SenderType::Admin)
            .with_id(agent_id)
            .with_name(agent_name)
    }

    pub fn system() -> Self {
        Self::new(SenderType::System)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.sender_id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}

/// Reads and appends messages, and tracks which guest messages were read.
#[derive(Clone)]
pub struct MessageStore {
    store: Arc<dyn PersistenceAdapter>,
    directory: ConversationDirectory,
}

impl MessageStore {
    pub fn new(store: Arc<dyn PersistenceAdapter>) -> Self {
        let directory = ConversationDirectory::new(Arc::clone(&store));
        Self { store, directory }
    }

    /// All messages of a conversation, oldest first. No id means no messages.
    pub async fn list(&self, conversation_id: Option<&str>) -> Result<Vec<Message>, TutordeskError> {
        let Some(conversation_id) = conversation_id else {
            return Ok(Vec::new());
        };
        let rows = self
            .store
            .select(
                Table::Messages,
                &Filter::all().eq("conversation_id", conversation_id),
                Some(&Order::asc("created_at")),
            )
            .await
            .map_err(|e| TutordeskError::query("list_messages", e.into_source()))?;

        rows.into_iter()
            .map(|row| {
                from_row(row).map_err(|e| TutordeskError::query("list_messages", e.into_source()))
            })
            .collect()
    }

    /// Append a message and return it as stored.
    ///
    /// A blank body or missing conversation id fails before the store is
    /// touched. Once the insert succeeds the conversation's counters are
    /// bumped; that follow-up is best-effort.
    pub async fn send(
        &self,
        conversation_id: Option<&str>,
        body: &str,
        author: &Author,
    ) -> Result<Message, TutordeskError> {
        let conversation_id = match conversation_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(TutordeskError::Validation(
                    "a conversation id is required to send a message".into(),
                ))
            }
        };
        if body.trim().is_empty() {
            return Err(TutordeskError::Validation(
                "message body must not be empty".into(),
            ));
        }

        let message = Message {
            id: new_record_id(),
            conversation_id: conversation_id.to_string(),
            sender_type: author.sender_type,
            sender_id: author.sender_id.clone(),
            sender_name: author.sender_name.clone(),
            content: body.to_string(),
            is_read: false,
            created_at: now_timestamp(),
        };
        let stored = self
            .store
            .insert(Table::Messages, vec![to_row(&message)?])
            .await
            .map_err(|e| TutordeskError::Insert {
                source: e.into_source(),
            })?;
        let row = stored.into_iter().next().ok_or_else(|| TutordeskError::Insert {
            source: "store returned no row for the new message".into(),
        })?;
        let message: Message = from_row(row).map_err(|e| TutordeskError::Insert {
            source: e.into_source(),
        })?;

        debug!(
            conversation_id = %message.conversation_id,
            message_id = %message.id,
            sender_type = %message.sender_type,
            "message sent"
        );

        if let Err(e) = self
            .directory
            .record_activity(&message.conversation_id, &message.created_at)
            .await
        {
            warn!(
                conversation_id = %message.conversation_id,
                error = %e,
                "message stored but conversation activity was not recorded"
            );
        }
        Ok(message)
    }

    /// Mark the given messages read. Best-effort: failures are logged.
    ///
    /// Returns how many messages were updated.
    pub async fn mark_read(&self, message_ids: &[String]) -> usize {
        if message_ids.is_empty() {
            return 0;
        }
        let filter = Filter::all().is_in("id", message_ids.iter().cloned());
        self.set_read(filter, "mark_read").await
    }

    /// Mark every unread guest message in a conversation read. Best-effort.
    pub async fn mark_conversation_read(&self, conversation_id: &str) -> usize {
        self.set_read(unread_guest_filter(conversation_id), "mark_conversation_read")
            .await
    }

    async fn set_read(&self, filter: Filter, operation: &'static str) -> usize {
        let mut patch = Row::new();
        patch.insert("is_read".into(), Value::Bool(true));
        match self.store.update(Table::Messages, patch, &filter).await {
            Ok(rows) => {
                debug!(operation, count = rows.len(), "messages marked read");
                rows.len()
            }
            Err(e) => {
                warn!(operation, error = %e, "failed to mark messages read");
                0
            }
        }
    }

    /// Unread messages from the guest in a conversation.
    pub async fn unread_count(&self, conversation_id: &str) -> Result<usize, TutordeskError> {
        let rows = self
            .store
            .select(Table::Messages, &unread_guest_filter(conversation_id), None)
            .await
            .map_err(|e| TutordeskError::query("unread_count", e.into_source()))?;
        Ok(rows.len())
    }
}

fn unread_guest_filter(conversation_id: &str) -> Filter {
    Filter::all()
        .eq("conversation_id", conversation_id)
        .eq("sender_type", SenderType::Guest.to_string())
        .eq("is_read", json!(false))
}

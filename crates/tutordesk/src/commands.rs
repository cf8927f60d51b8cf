// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin subcommands over the support subsystem.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use tutordesk_config::model::TutordeskConfig;
use tutordesk_core::{
    Conversation, ConversationStatus, Message, PersistenceAdapter, PluginAdapter, SenderType,
    TutordeskError,
};
use tutordesk_storage::SqlitePersistence;
use tutordesk_support::{Author, ConversationDirectory, MessageStore};

/// The support components wired to the configured database.
pub struct Desk {
    persistence: Arc<SqlitePersistence>,
    directory: ConversationDirectory,
    messages: MessageStore,
    agent_name: String,
    json: bool,
}

impl Desk {
    pub async fn open(config: &TutordeskConfig, json: bool) -> Result<Self, TutordeskError> {
        let persistence = Arc::new(SqlitePersistence::open(&config.storage, &config.live).await?);
        let store: Arc<dyn PersistenceAdapter> = persistence.clone();
        Ok(Self {
            directory: ConversationDirectory::new(Arc::clone(&store)),
            messages: MessageStore::new(store),
            persistence,
            agent_name: config.support.agent_name.clone(),
            json,
        })
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.persistence.shutdown().await {
            warn!(error = %e, "storage shutdown failed");
        }
    }

    pub async fn conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<(), TutordeskError> {
        let conversations = self.directory.list(status).await?;
        if self.json {
            return print_json(&conversations);
        }
        if conversations.is_empty() {
            println!("no conversations");
        }
        for conversation in &conversations {
            println!("{}", conversation_line(conversation));
        }
        Ok(())
    }

    pub async fn show(&self, id: &str) -> Result<(), TutordeskError> {
        let conversation = self.directory.get(id).await.ok_or_else(|| not_found(id))?;
        self.print_conversation(&conversation)
    }

    pub async fn open_conversation(
        &self,
        guest_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<(), TutordeskError> {
        let conversation = self.directory.create(guest_id, email, name).await?;
        self.print_conversation(&conversation)
    }

    pub async fn assign(&self, id: &str, agent: &str) -> Result<(), TutordeskError> {
        let conversation = self.directory.assign(id, agent).await?;
        self.print_conversation(&conversation)
    }

    pub async fn close(&self, id: &str) -> Result<(), TutordeskError> {
        let conversation = self.directory.close(id).await?;
        self.print_conversation(&conversation)
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: ConversationStatus,
        agent: Option<&str>,
    ) -> Result<(), TutordeskError> {
        let conversation = self.directory.update_status(id, status, agent).await?;
        self.print_conversation(&conversation)
    }

    pub async fn messages(&self, id: &str) -> Result<(), TutordeskError> {
        let messages = self.messages.list(Some(id)).await?;
        if self.json {
            return print_json(&messages);
        }
        if messages.is_empty() {
            println!("no messages");
        }
        for message in &messages {
            println!("{}", message_line(message));
        }
        Ok(())
    }

    pub async fn send(
        &self,
        id: &str,
        body: &str,
        sender: SenderType,
        sender_id: Option<String>,
        sender_name: Option<String>,
    ) -> Result<(), TutordeskError> {
        let author = Author {
            sender_type: sender,
            sender_id,
            sender_name: sender_name.or_else(|| {
                (sender == SenderType::Admin).then(|| self.agent_name.clone())
            }),
        };
        let message = self.messages.send(Some(id), body, &author).await?;
        if self.json {
            return print_json(&message);
        }
        println!("{}", message_line(&message));
        Ok(())
    }

    pub async fn mark_read(&self, ids: &[String]) -> Result<(), TutordeskError> {
        let updated = self.messages.mark_read(ids).await;
        if self.json {
            return print_json(&serde_json::json!({ "marked_read": updated }));
        }
        println!("marked {updated} message(s) read");
        Ok(())
    }

    pub async fn unread(&self, id: &str) -> Result<(), TutordeskError> {
        let count = self.messages.unread_count(id).await?;
        if self.json {
            return print_json(&serde_json::json!({ "conversation_id": id, "unread": count }));
        }
        println!("{count}");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), TutordeskError> {
        if !self.directory.delete(id).await? {
            return Err(not_found(id));
        }
        if !self.json {
            println!("deleted {id}");
        }
        Ok(())
    }

    fn print_conversation(&self, conversation: &Conversation) -> Result<(), TutordeskError> {
        if self.json {
            return print_json(conversation);
        }
        println!("{}", conversation_line(conversation));
        Ok(())
    }
}

fn not_found(id: &str) -> TutordeskError {
    TutordeskError::NotFound {
        entity: "conversation",
        id: id.to_string(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TutordeskError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| TutordeskError::Internal(format!("failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// One-line summary: id, status, guest, assignee, message count, last activity.
pub fn conversation_line(c: &Conversation) -> String {
    let guest = match (&c.guest_name, &c.guest_email) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (Some(name), None) => name.clone(),
        (None, Some(email)) => email.clone(),
        (None, None) => c.guest_id.clone(),
    };
    format!(
        "{}  {:<11}  {:<28}  {:<12}  {:>3} msg  {}",
        c.id,
        c.status.to_string(),
        guest,
        c.assigned_admin_id.as_deref().unwrap_or("-"),
        c.total_messages,
        c.activity_at(),
    )
}

/// `[time] sender: body`, with an asterisk on unread messages.
pub fn message_line(m: &Message) -> String {
    let who = m
        .sender_name
        .as_deref()
        .or(m.sender_id.as_deref())
        .map(|name| format!("{} ({})", name, m.sender_type))
        .unwrap_or_else(|| m.sender_type.to_string());
    let unread = if m.is_read { " " } else { "*" };
    format!("{unread}[{}] {who}: {}", m.created_at, m.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_line_prefers_name_and_email() {
        let mut c = Conversation::new("guest-1".into(), Some("g@example.com".into()), None);
        c.guest_name = Some("Gia".into());
        let line = conversation_line(&c);
        assert!(line.contains("Gia <g@example.com>"));
        assert!(line.contains("open"));
        assert!(line.contains(" - "));
    }

    #[test]
    fn conversation_line_falls_back_to_guest_id() {
        let c = Conversation::new("guest-9".into(), None, None);
        assert!(conversation_line(&c).contains("guest-9"));
    }

    #[test]
    fn message_line_marks_unread() {
        let m = Message {
            id: "m1".into(),
            conversation_id: "c1".into(),
            sender_type: SenderType::Guest,
            sender_id: Some("guest-1".into()),
            sender_name: None,
            content: "Hello".into(),
            is_read: false,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert_eq!(
            message_line(&m),
            "*[2026-01-01T00:00:00.000Z] guest-1 (guest): Hello"
        );
    }
}

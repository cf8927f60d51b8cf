// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin conversation view: the consumer side of the support subsystem.
//!
//! List failures put the view into [`ListState::Failed`] until
//! [`AdminConversationView::retry`]. Action failures become [`Notice`]s and
//! leave local state untouched.

use std::sync::Arc;

use tracing::{info, warn};

use tutordesk_core::row::to_row;
use tutordesk_core::{
    ChangeEvent, Conversation, ConversationStatus, Message, PersistenceAdapter, Table,
};

use crate::directory::ConversationDirectory;
use crate::live::{LiveConversations, LiveMessages};
use crate::messages::{Author, MessageStore};

/// Loading state of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    /// Not mounted.
    Idle,
    Loading,
    Ready,
    /// The list could not be loaded; shown inline with a retry control.
    Failed(String),
}

/// A transient notification about a failed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub action: &'static str,
    pub message: String,
}

/// Conversation list plus at most one open conversation.
pub struct AdminConversationView {
    store: Arc<dyn PersistenceAdapter>,
    directory: ConversationDirectory,
    messages: MessageStore,
    filter: Option<ConversationStatus>,
    state: ListState,
    list: Option<LiveConversations>,
    open: Option<LiveMessages>,
    notices: Vec<Notice>,
}

impl AdminConversationView {
    pub fn new(store: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            directory: ConversationDirectory::new(Arc::clone(&store)),
            messages: MessageStore::new(Arc::clone(&store)),
            store,
            filter: None,
            state: ListState::Idle,
            list: None,
            open: None,
            notices: Vec::new(),
        }
    }

    /// Start the live conversation list, replacing any previous one.
    pub async fn mount(&mut self, status: Option<ConversationStatus>) -> &ListState {
        if let Some(previous) = self.list.take() {
            previous.unsubscribe().await;
        }
        self.filter = status;
        self.state = ListState::Loading;

        match LiveConversations::start(self.directory.clone(), Arc::clone(&self.store), status).await
        {
            Ok(live) => {
                self.list = Some(live);
                self.state = ListState::Ready;
            }
            Err(e) => {
                warn!(status = ?status, error = %e, "conversation list failed to load");
                self.state = ListState::Failed(e.to_string());
            }
        }
        &self.state
    }

    /// Mount again with the current filter.
    pub async fn retry(&mut self) -> &ListState {
        self.mount(self.filter).await
    }

    pub async fn set_filter(&mut self, status: Option<ConversationStatus>) -> &ListState {
        self.mount(status).await
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn filter(&self) -> Option<ConversationStatus> {
        self.filter
    }

    /// Conversations currently listed. Empty unless the list is ready.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.list.as_ref().map(|l| l.snapshot()).unwrap_or_default()
    }

    /// Wait for the conversation list to change. `false` if nothing is mounted.
    pub async fn list_changed(&mut self) -> bool {
        match self.list.as_mut() {
            Some(list) => list.changed().await,
            None => false,
        }
    }

    pub async fn assign(&mut self, id: &str, agent_id: &str) -> bool {
        match self.directory.assign(id, agent_id).await {
            Ok(_) => true,
            Err(e) => {
                self.notify("assign", e);
                false
            }
        }
    }

    pub async fn close(&mut self, id: &str) -> bool {
        match self.directory.close(id).await {
            Ok(_) => true,
            Err(e) => {
                self.notify("close", e);
                false
            }
        }
    }

    /// Open a conversation's live message log and mark the guest's messages read.
    pub async fn open(&mut self, conversation_id: &str) -> bool {
        if let Some(previous) = self.open.take() {
            previous.unsubscribe().await;
        }
        match LiveMessages::start(self.messages.clone(), Arc::clone(&self.store), conversation_id)
            .await
        {
            Ok(live) => {
                self.open = Some(live);
                self.messages.mark_conversation_read(conversation_id).await;
                info!(conversation_id, "conversation opened");
                true
            }
            Err(e) => {
                self.notify("open", e);
                false
            }
        }
    }

    /// Id of the open conversation, if any.
    pub fn opened(&self) -> Option<String> {
        self.open
            .as_ref()
            .map(|log| log.with_state(|s| s.conversation_id().to_string()))
    }

    /// Messages of the open conversation.
    pub fn open_messages(&self) -> Vec<Message> {
        self.open.as_ref().map(|l| l.snapshot()).unwrap_or_default()
    }

    /// Wait for the open message log to change. `false` if none is open.
    pub async fn messages_changed(&mut self) -> bool {
        match self.open.as_mut() {
            Some(log) => log.changed().await,
            None => false,
        }
    }

    /// Reply into the open conversation as an agent.
    ///
    /// The sent message is appended locally right away; the matching change
    /// event later is a no-op.
    pub async fn reply(&mut self, body: &str, agent_id: &str, agent_name: &str) -> Option<Message> {
        let conversation_id = self.opened();
        let author = Author::admin(agent_id, agent_name);
        match self
            .messages
            .send(conversation_id.as_deref(), body, &author)
            .await
        {
            Ok(message) => {
                if let (Some(log), Ok(row)) = (self.open.as_ref(), to_row(&message)) {
                    log.apply_local(&ChangeEvent::inserted(Table::Messages, row));
                }
                Some(message)
            }
            Err(e) => {
                self.notify("reply", e);
                None
            }
        }
    }

    /// Stop following the open conversation.
    pub async fn leave(&mut self) {
        if let Some(log) = self.open.take() {
            log.unsubscribe().await;
        }
    }

    /// Unread guest messages for a badge. Failures read as zero.
    pub async fn unread_badge(&mut self, conversation_id: &str) -> usize {
        match self.messages.unread_count(conversation_id).await {
            Ok(count) => count,
            Err(e) => {
                self.notify("unread_badge", e);
                0
            }
        }
    }

    /// Drain pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Release every subscription held by the view.
    pub async fn unmount(&mut self) {
        self.leave().await;
        if let Some(list) = self.list.take() {
            list.unsubscribe().await;
        }
        self.state = ListState::Idle;
    }

    fn notify(&mut self, action: &'static str, error: tutordesk_core::TutordeskError) {
        warn!(action, error = %error, "admin action failed");
        self.notices.push(Notice {
            action,
            message: error.to_string(),
        });
    }
}

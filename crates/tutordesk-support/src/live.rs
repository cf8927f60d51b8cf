// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live update bridge: folds store change events into in-memory views.
//!
//! A [`Live`] handle is an explicit subscription manager owned by one view.
//! It subscribes before fetching the initial snapshot, so anything committed
//! in between arrives twice; reconciliation is idempotent against that. When
//! the subscription reports a gap the whole snapshot is refetched.
//!
//! ```text
//!  store ──change feed──► Subscription ──pump task──► Mutex<state> ──► snapshot()
//!                                            │
//!                                            └── revision watch ──► changed()
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tutordesk_core::row::from_row;
use tutordesk_core::{
    ChangeEvent, ChangeKind, Conversation, ConversationStatus, EventMask, Filter, Message,
    PersistenceAdapter, Subscription, SubscriptionItem, Table, TutordeskError,
};

use crate::directory::ConversationDirectory;
use crate::messages::MessageStore;

/// Local state that change events are folded into.
pub trait Reconcile: Send + 'static {
    type Item: Clone + Send + 'static;

    /// Apply one change. Returns whether the visible state changed.
    fn apply(&mut self, event: &ChangeEvent) -> bool;

    /// Replace everything with an authoritative snapshot.
    fn reset(&mut self, items: Vec<Self::Item>);

    fn items(&self) -> &[Self::Item];
}

/// Conversations shown in a list view, optionally limited to one status.
#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    status: Option<ConversationStatus>,
    items: Vec<Conversation>,
}

impl ConversationList {
    pub fn new(status: Option<ConversationStatus>, items: Vec<Conversation>) -> Self {
        let mut list = Self {
            status,
            items: Vec::new(),
        };
        list.reset(items);
        list
    }

    pub fn status(&self) -> Option<ConversationStatus> {
        self.status
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.items.iter().find(|c| c.id == id)
    }

    fn accepts(&self, conversation: &Conversation) -> bool {
        self.status.is_none_or(|s| s == conversation.status)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|c| c.id == id)
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }
}

impl Reconcile for ConversationList {
    type Item = Conversation;

    fn apply(&mut self, event: &ChangeEvent) -> bool {
        if event.table != Table::Conversations {
            return false;
        }
        match event.kind {
            ChangeKind::Insert => {
                let Some(conversation) = decode::<Conversation>(event.new.as_ref()) else {
                    return false;
                };
                if !self.accepts(&conversation) {
                    return self.remove(&conversation.id);
                }
                match self.position(&conversation.id) {
                    Some(idx) if self.items[idx] == conversation => false,
                    Some(idx) => {
                        self.items[idx] = conversation;
                        true
                    }
                    None => {
                        self.items.insert(0, conversation);
                        true
                    }
                }
            }
            ChangeKind::Update => {
                let Some(conversation) = decode::<Conversation>(event.new.as_ref()) else {
                    return false;
                };
                let Some(idx) = self.position(&conversation.id) else {
                    return false;
                };
                if !self.accepts(&conversation) {
                    self.items.remove(idx);
                    return true;
                }
                if self.items[idx] == conversation {
                    return false;
                }
                self.items[idx] = conversation;
                true
            }
            ChangeKind::Delete => match event.row_id() {
                Some(id) => self.remove(id),
                None => false,
            },
        }
    }

    fn reset(&mut self, items: Vec<Conversation>) {
        let status = self.status;
        self.items = items
            .into_iter()
            .filter(|c| status.is_none_or(|s| s == c.status))
            .collect();
    }

    fn items(&self) -> &[Conversation] {
        &self.items
    }
}

/// The message log of one open conversation.
#[derive(Debug, Clone)]
pub struct MessageLog {
    conversation_id: String,
    items: Vec<Message>,
}

impl MessageLog {
    pub fn new(conversation_id: impl Into<String>, items: Vec<Message>) -> Self {
        let mut log = Self {
            conversation_id: conversation_id.into(),
            items: Vec::new(),
        };
        log.reset(items);
        log
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl Reconcile for MessageLog {
    type Item = Message;

    fn apply(&mut self, event: &ChangeEvent) -> bool {
        if event.table != Table::Messages || event.kind != ChangeKind::Insert {
            return false;
        }
        let Some(message) = decode::<Message>(event.new.as_ref()) else {
            return false;
        };
        if message.conversation_id != self.conversation_id
            || self.items.iter().any(|m| m.id == message.id)
        {
            return false;
        }
        self.items.push(message);
        true
    }

    fn reset(&mut self, items: Vec<Message>) {
        let id = self.conversation_id.clone();
        self.items = items
            .into_iter()
            .filter(|m| m.conversation_id == id)
            .collect();
    }

    fn items(&self) -> &[Message] {
        &self.items
    }
}

fn decode<T: serde::de::DeserializeOwned>(row: Option<&tutordesk_core::Row>) -> Option<T> {
    let row = row?.clone();
    match from_row(row) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "ignoring change event with an undecodable row");
            None
        }
    }
}

/// Source of the authoritative snapshot behind a live view.
#[async_trait]
trait Snapshot: Send + Sync + 'static {
    type Item: Send + 'static;

    async fn fetch(&self) -> Result<Vec<Self::Item>, TutordeskError>;
}

struct DirectorySnapshot {
    directory: ConversationDirectory,
    status: Option<ConversationStatus>,
}

#[async_trait]
impl Snapshot for DirectorySnapshot {
    type Item = Conversation;

    async fn fetch(&self) -> Result<Vec<Conversation>, TutordeskError> {
        self.directory.list(self.status).await
    }
}

struct MessageSnapshot {
    messages: MessageStore,
    conversation_id: String,
}

#[async_trait]
impl Snapshot for MessageSnapshot {
    type Item = Message;

    async fn fetch(&self) -> Result<Vec<Message>, TutordeskError> {
        self.messages.list(Some(&self.conversation_id)).await
    }
}

/// A running subscription keeping `S` in sync with the store.
///
/// Dropping the handle cancels the pump; [`Live::unsubscribe`] also waits
/// for it, so no reconciliation happens after it returns.
pub struct Live<S: Reconcile> {
    state: Arc<Mutex<S>>,
    revision: watch::Receiver<u64>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Live conversation list for the admin view.
pub type LiveConversations = Live<ConversationList>;

/// Live message log for one open conversation.
pub type LiveMessages = Live<MessageLog>;

impl LiveConversations {
    /// Subscribe to every conversation change, then load the list.
    ///
    /// The subscription is unfiltered so that a conversation moving out of
    /// `status` is still seen and removed.
    pub async fn start(
        directory: ConversationDirectory,
        store: Arc<dyn PersistenceAdapter>,
        status: Option<ConversationStatus>,
    ) -> Result<Self, TutordeskError> {
        let subscription = store
            .subscribe(Table::Conversations, EventMask::ALL, Filter::all())
            .await?;
        let source = DirectorySnapshot { directory, status };
        let snapshot = source.fetch().await?;
        debug!(status = ?status, count = snapshot.len(), "live conversation list started");
        Ok(Self::spawn(
            subscription,
            ConversationList::new(status, snapshot),
            source,
        ))
    }
}

impl LiveMessages {
    /// Subscribe to new messages of one conversation, then load its log.
    pub async fn start(
        messages: MessageStore,
        store: Arc<dyn PersistenceAdapter>,
        conversation_id: &str,
    ) -> Result<Self, TutordeskError> {
        let subscription = store
            .subscribe(
                Table::Messages,
                EventMask::INSERT,
                Filter::all().eq("conversation_id", conversation_id),
            )
            .await?;
        let source = MessageSnapshot {
            messages,
            conversation_id: conversation_id.to_string(),
        };
        let snapshot = source.fetch().await?;
        debug!(conversation_id, count = snapshot.len(), "live message log started");
        Ok(Self::spawn(
            subscription,
            MessageLog::new(conversation_id, snapshot),
            source,
        ))
    }
}

impl<S: Reconcile> Live<S> {
    fn spawn<F>(subscription: Subscription, initial: S, source: F) -> Self
    where
        F: Snapshot<Item = S::Item>,
    {
        let state = Arc::new(Mutex::new(initial));
        let (revision_tx, revision) = watch::channel(0);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(
            subscription,
            source,
            Arc::clone(&state),
            revision_tx,
            cancel.clone(),
        ));
        Self {
            state,
            revision,
            cancel,
            task: Some(task),
        }
    }

    /// Current contents.
    pub fn snapshot(&self) -> Vec<S::Item> {
        lock(&self.state).items().to_vec()
    }

    /// Run `f` against the current state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&lock(&self.state))
    }

    /// Fold a locally known change in ahead of its event.
    ///
    /// Does not bump the revision; the event itself arrives later as a no-op.
    pub fn apply_local(&self, event: &ChangeEvent) -> bool {
        lock(&self.state).apply(event)
    }

    /// Number of visible changes applied by the pump so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Wait until the state changes. Returns `false` once the pump has stopped.
    pub async fn changed(&mut self) -> bool {
        self.revision.changed().await.is_ok()
    }

    /// Cancel the pump and wait for it to finish.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "live update task ended abnormally");
            }
        }
    }
}

impl<S: Reconcile> Drop for Live<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pump<S, F>(
    mut subscription: Subscription,
    source: F,
    state: Arc<Mutex<S>>,
    revision: watch::Sender<u64>,
    cancel: CancellationToken,
) where
    S: Reconcile,
    F: Snapshot<Item = S::Item>,
{
    let table = subscription.table();
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = subscription.next() => item,
        };

        let changed = match item {
            Some(SubscriptionItem::Event(event)) => lock(&state).apply(&event),
            Some(SubscriptionItem::Gap(missed)) => {
                warn!(%table, missed, "live subscription fell behind, refetching");
                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    fetched = source.fetch() => fetched,
                };
                match fetched {
                    Ok(items) => {
                        lock(&state).reset(items);
                        true
                    }
                    Err(e) => {
                        warn!(%table, error = %e, "refetch failed, keeping stale state");
                        false
                    }
                }
            }
            None => {
                debug!(%table, "change feed closed");
                break;
            }
        };

        if changed {
            revision.send_modify(|r| *r += 1);
        }
    }
    debug!(%table, "live update pump stopped");
}

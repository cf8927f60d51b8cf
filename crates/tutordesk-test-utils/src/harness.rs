// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring the support subsystem to a throwaway SQLite database.

use std::sync::Arc;

use tutordesk_config::model::{LiveConfig, StorageConfig, TutordeskConfig};
use tutordesk_core::{Conversation, Message, PersistenceAdapter, TutordeskError};
use tutordesk_storage::SqlitePersistence;
use tutordesk_support::{AdminConversationView, Author, ConversationDirectory, MessageStore};

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    feed_capacity: usize,
    wal_mode: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            feed_capacity: LiveConfig::default().feed_capacity,
            wal_mode: true,
        }
    }

    /// Buffer size of the change feed; small values make subscribers lag.
    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Open the database in a fresh temp directory.
    pub async fn build(self) -> Result<TestHarness, TutordeskError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| TutordeskError::Persistence { source: e.into() })?;
        let db_path = temp_dir.path().join("support.db");

        let config = TutordeskConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().into_owned(),
                wal_mode: self.wal_mode,
                ..StorageConfig::default()
            },
            live: LiveConfig {
                feed_capacity: self.feed_capacity,
            },
            ..TutordeskConfig::default()
        };

        let persistence = Arc::new(SqlitePersistence::open(&config.storage, &config.live).await?);
        let store: Arc<dyn PersistenceAdapter> = persistence.clone();

        Ok(TestHarness {
            directory: ConversationDirectory::new(Arc::clone(&store)),
            messages: MessageStore::new(Arc::clone(&store)),
            persistence,
            store,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A support subsystem over a temp SQLite database, removed on drop.
pub struct TestHarness {
    /// The concrete adapter, for feed and database access.
    pub persistence: Arc<SqlitePersistence>,
    /// The same adapter behind the trait object the components use.
    pub store: Arc<dyn PersistenceAdapter>,
    pub directory: ConversationDirectory,
    pub messages: MessageStore,
    pub config: TutordeskConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, TutordeskError> {
        Self::builder().build().await
    }

    /// A fresh admin view over the harness store.
    pub fn admin_view(&self) -> AdminConversationView {
        AdminConversationView::new(Arc::clone(&self.store))
    }

    /// Create a conversation for `guest_id` and send its opening message.
    pub async fn guest_opens_chat(
        &self,
        guest_id: &str,
        body: &str,
    ) -> Result<(Conversation, Message), TutordeskError> {
        let conversation = self.directory.create(guest_id, None, None).await?;
        let message = self
            .messages
            .send(Some(&conversation.id), body, &Author::guest(guest_id))
            .await?;
        Ok((conversation, message))
    }
}

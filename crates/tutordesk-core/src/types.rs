// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the persistence adapters and the support components.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp format used for every stored timestamp.
///
/// Fixed width, so lexical order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Returns the current UTC time formatted with [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Generates a new record identifier (UUID v4).
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Persistence,
}

/// Lifecycle status of a support conversation.
///
/// `open -> in-progress -> closed` is the usual path; `waiting` is reachable
/// only through an explicit status update. No transition is blocked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ConversationStatus {
    #[serde(rename = "open")]
    #[strum(serialize = "open")]
    Open,
    #[serde(rename = "in-progress")]
    #[strum(serialize = "in-progress")]
    InProgress,
    #[serde(rename = "closed")]
    #[strum(serialize = "closed")]
    Closed,
    #[serde(rename = "waiting")]
    #[strum(serialize = "waiting")]
    Waiting,
}

/// Who authored a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SenderType {
    Guest,
    Admin,
    System,
}

/// A guest-to-support interaction thread.
///
/// Messages are not embedded; they are fetched separately by `conversation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub guest_id: String,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub status: ConversationStatus,
    pub assigned_admin_id: Option<String>,
    pub total_messages: i64,
    pub last_message_at: Option<String>,
    pub created_at: String,
    pub closed_at: Option<String>,
}

impl Conversation {
    /// Builds a brand-new `open` conversation with no messages.
    pub fn new(guest_id: String, guest_email: Option<String>, guest_name: Option<String>) -> Self {
        Self {
            id: new_record_id(),
            guest_id,
            guest_email,
            guest_name,
            status: ConversationStatus::Open,
            assigned_admin_id: None,
            total_messages: 0,
            last_message_at: None,
            created_at: now_timestamp(),
            closed_at: None,
        }
    }

    /// Timestamp of the most recent activity: last message, else creation.
    pub fn activity_at(&self) -> &str {
        self.last_message_at.as_deref().unwrap_or(&self.created_at)
    }
}

/// A single utterance within a conversation.
///
/// Immutable once stored, except for `is_read` (false -> true only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support-conversation subsystem for the tutordesk platform.
//!
//! - [`ConversationDirectory`]: create, list and transition conversations.
//! - [`MessageStore`]: append-only message log with read tracking.
//! - [`live`]: subscription managers that keep in-memory views current.
//! - [`AdminConversationView`]: the admin-facing consumer of all three.
//!
//! Every component takes an injected `Arc<dyn PersistenceAdapter>`; none of
//! them holds local state that outranks the store.

pub mod admin;
pub mod directory;
pub mod live;
pub mod messages;

pub use admin::{AdminConversationView, ListState, Notice};
pub use directory::ConversationDirectory;
pub use live::{ConversationList, Live, LiveConversations, LiveMessages, MessageLog, Reconcile};
pub use messages::{Author, MessageStore};

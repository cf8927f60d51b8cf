// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the tutordesk support subsystem.
//!
//! This crate provides the error type, the conversation and message domain
//! types, the generic row model, and the persistence adapter traits that the
//! storage backends implement and the support components consume.

pub mod error;
pub mod row;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TutordeskError;
pub use row::{ChangeEvent, ChangeKind, EventMask, Filter, Order, Row, Table};
pub use traits::{PersistenceAdapter, PluginAdapter, Subscription, SubscriptionItem};
pub use types::{
    AdapterType, Conversation, ConversationStatus, HealthStatus, Message, SenderType,
};

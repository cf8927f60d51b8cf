// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the tutordesk support subsystem.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, generic row CRUD over the
//! `conversations` and `messages` tables, and an in-process change feed that
//! backs live subscriptions.

pub mod adapter;
pub mod database;
pub mod feed;
pub mod migrations;
mod sql;

pub use adapter::SqlitePersistence;
pub use database::Database;
pub use feed::ChangeFeed;

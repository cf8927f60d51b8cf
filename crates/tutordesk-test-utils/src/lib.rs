// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for tutordesk integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a hosted store.
//!
//! # Components
//!
//! - [`MockPersistence`] - In-memory persistence with call recording and failure injection
//! - [`TestHarness`] - Support components wired to a temp SQLite database

pub mod harness;
pub mod mock_persistence;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_persistence::{Call, MockPersistence, Operation};

// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the tutordesk support subsystem.

use thiserror::Error;

/// The primary error type used across the persistence traits and support components.
#[derive(Debug, Error)]
pub enum TutordeskError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence backend errors (connection failure, migration failure, bad column).
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A read or status-changing operation was rejected or could not reach the backend.
    ///
    /// Never fatal: callers surface it and offer a retry.
    #[error("query failed during {operation}: {source}")]
    Query {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Creating a conversation failed. Propagated, because nothing can be sent
    /// without the new conversation's id.
    #[error("failed to create conversation: {source}")]
    Create {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Inserting a message failed. Message delivery never fails silently.
    #[error("failed to insert message: {source}")]
    Insert {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A local precondition was violated before any persistence call.
    #[error("validation error: {0}")]
    Validation(String),

    /// The addressed record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A change subscription could not be established or was closed.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TutordeskError {
    /// Wraps any error as a [`TutordeskError::Query`] for the named operation.
    pub fn query(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TutordeskError::Query {
            operation,
            source: source.into(),
        }
    }

    /// Returns the innermost cause for errors that wrap another error.
    ///
    /// Used to re-tag a persistence failure as the taxonomy entry of the
    /// operation that hit it (a failed insert during `create` becomes `Create`).
    pub fn into_source(self) -> Box<dyn std::error::Error + Send + Sync> {
        match self {
            TutordeskError::Persistence { source }
            | TutordeskError::Query { source, .. }
            | TutordeskError::Create { source }
            | TutordeskError::Insert { source } => source,
            other => Box::new(other),
        }
    }

    /// True for errors raised locally before any persistence call.
    pub fn is_validation(&self) -> bool {
        matches!(self, TutordeskError::Validation(_))
    }
}

// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied
//! when a [`crate::Database`] is opened.

use tutordesk_core::TutordeskError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply all pending migrations to the given connection.
///
/// Refinery records applied versions in `refinery_schema_history`, so this is
/// safe to call on every open.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), TutordeskError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| TutordeskError::Persistence {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::info!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}

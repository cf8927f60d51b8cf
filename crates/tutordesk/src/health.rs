// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tutordesk health` command implementation.
//!
//! Checks that the database opens and answers, then reports how many
//! conversations are waiting on an agent.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use tutordesk_config::model::TutordeskConfig;
use tutordesk_core::{
    ConversationStatus, Filter, HealthStatus, PersistenceAdapter, PluginAdapter, Table,
    TutordeskError,
};
use tutordesk_storage::SqlitePersistence;

/// Status of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: String, start: Instant) -> Self {
        Self {
            name,
            status,
            message,
            duration: start.elapsed(),
        }
    }
}

/// Run every check, print a report and fail if any check failed.
pub async fn run_health(config: &TutordeskConfig) -> Result<(), TutordeskError> {
    let use_color = std::io::stdout().is_terminal();
    let mut results = Vec::new();

    let start = Instant::now();
    match SqlitePersistence::open(&config.storage, &config.live).await {
        Ok(storage) => {
            results.push(CheckResult::new(
                "Database",
                CheckStatus::Pass,
                format!("opened {}", config.storage.database_path),
                start,
            ));
            results.push(check_adapter(&storage).await);
            results.push(check_backlog(&storage).await);
            if let Err(e) = storage.shutdown().await {
                tracing::warn!(error = %e, "storage shutdown failed");
            }
        }
        Err(e) => results.push(CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("open failed: {e}"),
            start,
        )),
    }

    println!();
    println!("  tutordesk health");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let failed = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    if failed > 0 {
        return Err(TutordeskError::Internal(format!(
            "{failed} health check(s) failed"
        )));
    }
    println!("  All checks passed.");
    Ok(())
}

async fn check_adapter(storage: &SqlitePersistence) -> CheckResult {
    let start = Instant::now();
    let (status, message) = match storage.health_check().await {
        Ok(HealthStatus::Healthy) => (CheckStatus::Pass, "responding".to_string()),
        Ok(HealthStatus::Degraded(why)) => (CheckStatus::Warn, why),
        Ok(HealthStatus::Unhealthy(why)) => (CheckStatus::Fail, why),
        Err(e) => (CheckStatus::Fail, e.to_string()),
    };
    CheckResult::new("Connection", status, message, start)
}

/// Open conversations nobody has picked up yet.
async fn check_backlog(storage: &SqlitePersistence) -> CheckResult {
    let start = Instant::now();
    let filter = Filter::all().eq("status", ConversationStatus::Open.to_string());
    match storage.select(Table::Conversations, &filter, None).await {
        Ok(rows) if rows.is_empty() => CheckResult::new(
            "Backlog",
            CheckStatus::Pass,
            "no unassigned conversations".to_string(),
            start,
        ),
        Ok(rows) => CheckResult::new(
            "Backlog",
            CheckStatus::Warn,
            format!("{} open conversation(s) awaiting an agent", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new("Backlog", CheckStatus::Fail, e.to_string(), start),
    }
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    use colored::Colorize;

    let duration_ms = result.duration.as_millis();
    let (symbol, message) = match (result.status, use_color) {
        (CheckStatus::Pass, true) => ("✓".green().to_string(), result.message.clone()),
        (CheckStatus::Warn, true) => ("!".yellow().to_string(), result.message.yellow().to_string()),
        (CheckStatus::Fail, true) => ("✗".red().to_string(), result.message.red().to_string()),
        (CheckStatus::Pass, false) => ("[OK]  ".to_string(), result.message.clone()),
        (CheckStatus::Warn, false) => ("[WARN]".to_string(), result.message.clone()),
        (CheckStatus::Fail, false) => ("[FAIL]".to_string(), result.message.clone()),
    };
    format!("    {symbol} {:<12} {message} ({duration_ms}ms)", result.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutordesk_config::model::StorageConfig;

    fn config_in(dir: &tempfile::TempDir) -> TutordeskConfig {
        TutordeskConfig {
            storage: StorageConfig {
                database_path: dir.path().join("health.db").to_string_lossy().into_owned(),
                ..StorageConfig::default()
            },
            ..TutordeskConfig::default()
        }
    }

    #[test]
    fn plain_lines_carry_status_tags() {
        let result = CheckResult {
            name: "Database",
            status: CheckStatus::Fail,
            message: "open failed".into(),
            duration: Duration::from_millis(3),
        };
        assert_eq!(
            render_line(&result, false),
            "    [FAIL] Database     open failed (3ms)"
        );
    }

    #[tokio::test]
    async fn fresh_database_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        run_health(&config_in(&dir)).await.unwrap();
    }

    #[tokio::test]
    async fn backlog_warns_about_open_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let storage = SqlitePersistence::open(&config.storage, &config.live)
            .await
            .unwrap();
        let conversation = tutordesk_core::Conversation::new("guest-1".into(), None, None);
        storage
            .insert(
                Table::Conversations,
                vec![tutordesk_core::row::to_row(&conversation).unwrap()],
            )
            .await
            .unwrap();

        let result = check_backlog(&storage).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.starts_with("1 open"));
    }
}

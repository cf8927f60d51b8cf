// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that drive the `tutordesk` binary against a temp database.
//!
//! Each test writes its own config file pointing at an isolated SQLite file.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

struct Workspace {
    config: PathBuf,
    _dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("desk.db");
        let config = dir.path().join("tutordesk.toml");
        std::fs::write(
            &config,
            format!(
                "[storage]\ndatabase_path = {:?}\n\n[support]\nagent_name = \"Riley\"\n",
                db.to_string_lossy()
            ),
        )
        .unwrap();
        Self { config, _dir: dir }
    }

    fn run(&self, args: &[&str]) -> Output {
        run_with_config(&self.config, args)
    }

    fn json(&self, args: &[&str]) -> Value {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let output = self.run(&full);
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

fn run_with_config(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tutordesk"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn guest_chat_is_handled_by_an_agent() {
    let ws = Workspace::new();

    let conversation = ws.json(&["open", "guest-1", "--email", "g@example.com"]);
    assert_eq!(conversation["status"], "open");
    let id = conversation["id"].as_str().unwrap().to_string();

    ws.json(&["send", &id, "My lesson link is broken", "--as", "guest", "--sender-id", "guest-1"]);
    ws.json(&["send", &id, "Still there?", "--as", "guest", "--sender-id", "guest-1"]);
    assert_eq!(ws.json(&["unread", &id])["unread"], 2);

    let assigned = ws.json(&["assign", &id, "agent-7"]);
    assert_eq!(assigned["status"], "in-progress");
    assert_eq!(assigned["assigned_admin_id"], "agent-7");

    let reply = ws.json(&["send", &id, "Sending a new one now"]);
    assert_eq!(reply["sender_type"], "admin");
    assert_eq!(reply["sender_name"], "Riley");

    let messages = ws.json(&["messages", &id]);
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 3);
    let guest_ids: Vec<String> = messages
        .iter()
        .filter(|m| m["sender_type"] == "guest")
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();

    let mut mark = vec!["mark-read"];
    mark.extend(guest_ids.iter().map(String::as_str));
    assert_eq!(ws.json(&mark)["marked_read"], 2);
    assert_eq!(ws.json(&["unread", &id])["unread"], 0);

    let closed = ws.json(&["close", &id]);
    assert_eq!(closed["status"], "closed");
    assert!(closed["closed_at"].is_string());
    assert_eq!(closed["total_messages"], 3);
}

#[test]
fn conversations_filter_by_status() {
    let ws = Workspace::new();
    let first = ws.json(&["open", "guest-1"]);
    ws.json(&["open", "guest-2"]);
    ws.json(&["close", first["id"].as_str().unwrap()]);

    let open = ws.json(&["conversations", "--status", "open"]);
    let open = open.as_array().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["guest_id"], "guest-2");

    let all = ws.json(&["conversations"]);
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[test]
fn plain_output_lists_conversations() {
    let ws = Workspace::new();
    ws.json(&["open", "guest-1", "--name", "Gia"]);

    let output = ws.run(&["conversations"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Gia"));
    assert!(stdout.contains("open"));
}

#[test]
fn unknown_conversation_exits_non_zero() {
    let ws = Workspace::new();
    let output = ws.run(&["close", "missing"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing"));
}

#[test]
fn blank_message_is_rejected() {
    let ws = Workspace::new();
    let conversation = ws.json(&["open", "guest-1"]);
    let output = ws.run(&["send", conversation["id"].as_str().unwrap(), "   "]);
    assert!(!output.status.success());
    assert_eq!(ws.json(&["conversations"])[0]["total_messages"], 0);
}

#[test]
fn delete_removes_conversation() {
    let ws = Workspace::new();
    let conversation = ws.json(&["open", "guest-1"]);
    let id = conversation["id"].as_str().unwrap();
    ws.json(&["send", id, "hello", "--as", "guest"]);

    assert!(ws.run(&["delete", id]).status.success());
    assert!(ws.json(&["conversations"]).as_array().unwrap().is_empty());
    assert!(!ws.run(&["show", id]).status.success());
}

#[test]
fn health_passes_on_fresh_database() {
    let ws = Workspace::new();
    let output = ws.run(&["health"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[OK]"));
    assert!(stdout.contains("All checks passed."));
}

#[test]
fn invalid_config_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[storage]\ndatabse_path = \"x.db\"\n").unwrap();

    let output = run_with_config(&config, &["conversations"]);
    assert!(!output.status.success());
}

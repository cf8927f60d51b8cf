// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the support subsystem against the in-memory mock
//! and the SQLite harness.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_test::traced_test;

use tutordesk_core::row::to_row;
use tutordesk_core::{
    ChangeEvent, Conversation, ConversationStatus, PersistenceAdapter, SenderType, Table,
    TutordeskError,
};
use tutordesk_support::{
    AdminConversationView, Author, ConversationDirectory, ListState, LiveConversations,
    LiveMessages, MessageStore,
};
use tutordesk_test_utils::{MockPersistence, Operation, TestHarness};

fn mock_components(mock: &Arc<MockPersistence>) -> (ConversationDirectory, MessageStore) {
    let store: Arc<dyn PersistenceAdapter> = mock.clone();
    (
        ConversationDirectory::new(Arc::clone(&store)),
        MessageStore::new(store),
    )
}

async fn until(live: &mut LiveConversations, done: impl Fn(&[Conversation]) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(&live.snapshot()) {
            assert!(live.changed().await, "live pump stopped");
        }
    })
    .await
    .expect("live list never converged");
}

// --- Message store -------------------------------------------------------

#[tokio::test]
async fn blank_body_never_reaches_the_store() {
    let mock = Arc::new(MockPersistence::new());
    let (_directory, messages) = mock_components(&mock);

    for body in ["", "   ", "\n\t "] {
        let err = messages
            .send(Some("c1"), body, &Author::new(SenderType::Guest))
            .await
            .unwrap_err();
        assert!(matches!(err, TutordeskError::Validation(_)));
    }
    let err = messages
        .send(None, "hello", &Author::system())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(mock.calls().is_empty(), "no persistence call expected");
}

#[tokio::test]
async fn mark_read_of_empty_set_performs_no_write() {
    let mock = Arc::new(MockPersistence::new());
    let (_directory, messages) = mock_components(&mock);
    assert_eq!(messages.mark_read(&[]).await, 0);
    assert_eq!(mock.call_count(Operation::Update), 0);
}

#[tokio::test]
#[traced_test]
async fn mark_read_failures_are_logged_not_raised() {
    let mock = Arc::new(MockPersistence::new());
    let (_directory, messages) = mock_components(&mock);
    mock.fail_on(Operation::Update);

    assert_eq!(messages.mark_read(&["m1".to_string()]).await, 0);
    assert_eq!(mock.call_count(Operation::Update), 1);
    assert!(logs_contain("failed to mark messages read"));
}

#[tokio::test]
async fn insert_failures_propagate_as_insert_errors() {
    let mock = Arc::new(MockPersistence::new());
    let (_directory, messages) = mock_components(&mock);
    mock.fail_on(Operation::Insert);

    let err = messages
        .send(Some("c1"), "hello", &Author::guest("g"))
        .await
        .unwrap_err();
    assert!(matches!(err, TutordeskError::Insert { .. }));
}

#[tokio::test]
#[traced_test]
async fn send_survives_a_failed_activity_update() {
    let mock = Arc::new(MockPersistence::new());
    let (directory, messages) = mock_components(&mock);
    let conv = directory.create("guest-1", None, None).await.unwrap();
    mock.fail_on(Operation::Update);

    let msg = messages
        .send(Some(&conv.id), "hello", &Author::guest("guest-1"))
        .await
        .unwrap();
    assert_eq!(msg.content, "hello");
    assert!(logs_contain("conversation activity was not recorded"));

    mock.heal();
    assert_eq!(directory.get(&conv.id).await.unwrap().total_messages, 0);
}

#[tokio::test]
async fn unread_count_propagates_query_errors() {
    let mock = Arc::new(MockPersistence::new());
    let (_directory, messages) = mock_components(&mock);
    mock.fail_on(Operation::Select);

    let err = messages.unread_count("c1").await.unwrap_err();
    assert!(matches!(
        err,
        TutordeskError::Query {
            operation: "unread_count",
            ..
        }
    ));
}

// --- Conversation directory ---------------------------------------------

#[tokio::test]
async fn list_failures_are_query_errors() {
    let mock = Arc::new(MockPersistence::new());
    let (directory, _messages) = mock_components(&mock);
    mock.fail_on(Operation::Select);

    let err = directory.list(None).await.unwrap_err();
    assert!(matches!(err, TutordeskError::Query { operation: "list", .. }));
}

#[tokio::test]
#[traced_test]
async fn get_failures_read_as_absent() {
    let mock = Arc::new(MockPersistence::new());
    let (directory, _messages) = mock_components(&mock);
    mock.fail_on(Operation::Select);

    assert!(directory.get("c1").await.is_none());
    assert!(logs_contain("conversation lookup failed"));
}

#[tokio::test]
async fn create_failures_propagate_as_create_errors() {
    let mock = Arc::new(MockPersistence::new());
    let (directory, _messages) = mock_components(&mock);
    mock.fail_on(Operation::Insert);

    let err = directory.create("guest-1", None, None).await.unwrap_err();
    assert!(matches!(err, TutordeskError::Create { .. }));
}

#[tokio::test]
async fn three_statuses_filter_to_exactly_one_closed() {
    let harness = TestHarness::new().await.unwrap();
    let open = harness.directory.create("g-open", None, None).await.unwrap();
    let busy = harness.directory.create("g-busy", None, None).await.unwrap();
    let done = harness.directory.create("g-done", None, None).await.unwrap();
    harness.directory.assign(&busy.id, "agent").await.unwrap();
    harness.directory.close(&done.id).await.unwrap();

    let closed = harness
        .directory
        .list(Some(ConversationStatus::Closed))
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, done.id);

    for c in harness.directory.list(None).await.unwrap() {
        assert_eq!(c.closed_at.is_some(), c.status == ConversationStatus::Closed);
    }
    assert!(harness.directory.get(&open.id).await.is_some());
}

#[tokio::test]
async fn concurrent_assignments_resolve_last_write_wins() {
    let harness = TestHarness::new().await.unwrap();
    let conv = harness.directory.create("guest-1", None, None).await.unwrap();

    let (a, b) = tokio::join!(
        harness.directory.assign(&conv.id, "agent-a"),
        harness.directory.assign(&conv.id, "agent-b"),
    );
    a.unwrap();
    b.unwrap();

    let assignee = harness
        .directory
        .get(&conv.id)
        .await
        .unwrap()
        .assigned_admin_id
        .unwrap();
    assert!(assignee == "agent-a" || assignee == "agent-b");
}

// --- Live update bridge --------------------------------------------------

#[tokio::test]
async fn live_list_sees_inserts_updates_and_deletes() {
    let harness = TestHarness::new().await.unwrap();
    let mut live = LiveConversations::start(
        harness.directory.clone(),
        Arc::clone(&harness.store),
        None,
    )
    .await
    .unwrap();
    assert!(live.snapshot().is_empty());

    let conv = harness.directory.create("guest-1", None, None).await.unwrap();
    until(&mut live, |list| list.iter().any(|c| c.id == conv.id)).await;

    harness.directory.close(&conv.id).await.unwrap();
    until(&mut live, |list| {
        list.iter()
            .any(|c| c.id == conv.id && c.status == ConversationStatus::Closed)
    })
    .await;

    harness.directory.delete(&conv.id).await.unwrap();
    until(&mut live, |list| list.is_empty()).await;
    live.unsubscribe().await;
}

#[tokio::test]
async fn gap_triggers_a_full_resync() {
    let mock = Arc::new(MockPersistence::with_feed_capacity(2));
    let (directory, _messages) = mock_components(&mock);
    let store: Arc<dyn PersistenceAdapter> = mock.clone();
    let mut live = LiveConversations::start(directory, store, None)
        .await
        .unwrap();

    // Land five rows and five events without yielding, so the pump falls behind.
    let conversations: Vec<Conversation> = (0..5)
        .map(|i| Conversation::new(format!("guest-{i}"), None, None))
        .collect();
    for c in &conversations {
        let row = to_row(c).unwrap();
        mock.seed(Table::Conversations, [row.clone()]);
        mock.feed()
            .publish(ChangeEvent::inserted(Table::Conversations, row));
    }
    let selects_before = mock.call_count(Operation::Select);

    until(&mut live, |list| list.len() == 5).await;
    assert!(mock.call_count(Operation::Select) > selects_before, "expected a refetch");

    let mut ids: Vec<_> = live.snapshot().into_iter().map(|c| c.id).collect();
    ids.sort();
    let mut expected: Vec<_> = conversations.into_iter().map(|c| c.id).collect();
    expected.sort();
    assert_eq!(ids, expected);
    live.unsubscribe().await;
}

#[tokio::test]
async fn no_reconciliation_after_unsubscribe() {
    let mock = Arc::new(MockPersistence::new());
    let (directory, _messages) = mock_components(&mock);
    let store: Arc<dyn PersistenceAdapter> = mock.clone();
    let live = LiveConversations::start(directory.clone(), store, None)
        .await
        .unwrap();
    assert_eq!(mock.feed().subscriber_count(), 1);

    // The pump has exited and released its receiver by the time this returns.
    live.unsubscribe().await;
    assert_eq!(mock.feed().subscriber_count(), 0);

    directory.create("guest-late", None, None).await.unwrap();
    assert_eq!(mock.rows(Table::Conversations).len(), 1);
}

#[tokio::test]
async fn dropping_a_live_handle_releases_its_subscription() {
    let mock = Arc::new(MockPersistence::new());
    let (_directory, messages) = mock_components(&mock);
    let store: Arc<dyn PersistenceAdapter> = mock.clone();
    let live = LiveMessages::start(messages, store, "c1").await.unwrap();
    assert_eq!(mock.feed().subscriber_count(), 1);

    drop(live);
    tokio::time::timeout(Duration::from_secs(5), async {
        while mock.feed().subscriber_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("pump kept its subscription after drop");
}

#[tokio::test]
async fn message_log_appends_live_inserts_for_its_conversation_only() {
    let harness = TestHarness::new().await.unwrap();
    let (conv, first) = harness.guest_opens_chat("guest-1", "hi").await.unwrap();
    let (other, _) = harness.guest_opens_chat("guest-2", "elsewhere").await.unwrap();

    let mut live = LiveMessages::start(
        harness.messages.clone(),
        Arc::clone(&harness.store),
        &conv.id,
    )
    .await
    .unwrap();
    assert_eq!(live.snapshot()[0].id, first.id);

    harness
        .messages
        .send(Some(&other.id), "not for you", &Author::guest("guest-2"))
        .await
        .unwrap();
    let second = harness
        .messages
        .send(Some(&conv.id), "anyone?", &Author::guest("guest-1"))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while live.snapshot().len() < 2 {
            assert!(live.changed().await);
        }
    })
    .await
    .unwrap();
    let ids: Vec<_> = live.snapshot().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    live.unsubscribe().await;
}

// --- Admin view ----------------------------------------------------------

#[tokio::test]
async fn failed_list_shows_error_state_until_retry() {
    let mock = Arc::new(MockPersistence::new());
    let store: Arc<dyn PersistenceAdapter> = mock.clone();
    let mut view = AdminConversationView::new(store);

    mock.fail_on(Operation::Select);
    let state = view.mount(Some(ConversationStatus::Open)).await.clone();
    assert!(matches!(state, ListState::Failed(ref msg) if msg.contains("list")));
    assert!(view.conversations().is_empty());

    mock.heal();
    assert_eq!(view.retry().await, &ListState::Ready);
    assert_eq!(view.filter(), Some(ConversationStatus::Open));
    view.unmount().await;
}

#[tokio::test]
async fn failed_actions_leave_state_unchanged() {
    let mock = Arc::new(MockPersistence::new());
    let (directory, _messages) = mock_components(&mock);
    let conv = directory.create("guest-1", None, None).await.unwrap();
    let store: Arc<dyn PersistenceAdapter> = mock.clone();
    let mut view = AdminConversationView::new(store);
    view.mount(None).await;

    mock.fail_on(Operation::Update);
    assert!(!view.assign(&conv.id, "agent").await);
    assert!(!view.close(&conv.id).await);
    mock.heal();

    let listed = view.conversations();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, ConversationStatus::Open);
    let actions: Vec<_> = view.take_notices().into_iter().map(|n| n.action).collect();
    assert_eq!(actions, vec!["assign", "close"]);
    view.unmount().await;
}

#[tokio::test]
async fn unread_badge_degrades_to_zero_with_a_notice() {
    let mock = Arc::new(MockPersistence::new());
    let store: Arc<dyn PersistenceAdapter> = mock.clone();
    let mut view = AdminConversationView::new(store);
    mock.fail_on(Operation::Select);

    assert_eq!(view.unread_badge("c1").await, 0);
    assert_eq!(view.take_notices()[0].action, "unread_badge");
}

#[tokio::test]
async fn admin_workflow_end_to_end() {
    let harness = TestHarness::new().await.unwrap();
    let mut view = harness.admin_view();
    assert_eq!(view.mount(None).await, &ListState::Ready);

    let (conv, _) = harness.guest_opens_chat("guest-42", "Hello").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while view.conversations().is_empty() {
            assert!(view.list_changed().await);
        }
    })
    .await
    .unwrap();
    assert_eq!(view.unread_badge(&conv.id).await, 1);

    assert!(view.assign(&conv.id, "agent-7").await);
    assert!(view.open(&conv.id).await);
    assert_eq!(view.unread_badge(&conv.id).await, 0);
    view.reply("Happy to help", "agent-7", "Sam").await.unwrap();
    assert!(view.close(&conv.id).await);

    let stored = harness.directory.get(&conv.id).await.unwrap();
    assert_eq!(stored.status, ConversationStatus::Closed);
    assert_eq!(stored.assigned_admin_id.as_deref(), Some("agent-7"));
    assert_eq!(stored.total_messages, 2);
    assert!(stored.closed_at.unwrap() >= stored.created_at);
    assert_eq!(
        serde_json::to_value(stored.status).unwrap(),
        json!("closed")
    );

    view.unmount().await;
    assert!(view.take_notices().is_empty());
}

//! Edge case tests for chatsync-engine
//!
//! These tests cover boundary conditions and the message list scenarios the
//! sync controller relies on.

use chatsync_engine::{
    apply_pushes, validate_content, ConversationSnapshot, EarlyPushQueue, Error, MergeOutcome,
    Message, MessageStore, PushFilter, ReconcileOutcome, SyncState,
};

fn row(id: &str, sender: &str, created_at: u64) -> Message {
    Message::confirmed(id, "conv-1", sender, format!("message {}", id), created_at)
}

fn ids(store: &MessageStore) -> Vec<String> {
    store.messages().iter().map(|m| m.id.clone()).collect()
}

// ============================================================================
// Load and Merge Scenarios
// ============================================================================

#[test]
fn initialize_then_duplicate_push() {
    let mut store = MessageStore::new("conv-1");
    store.initialize(vec![row("1", "bob", 10), row("2", "bob", 20)]);
    assert_eq!(ids(&store), vec!["1", "2"]);

    let outcome = store.merge_remote(row("2", "bob", 20)).unwrap();
    assert_eq!(outcome, MergeOutcome::Duplicate);
    assert_eq!(ids(&store), vec!["1", "2"]);
    assert_eq!(store.len(), 2);
}

#[test]
fn optimistic_append_and_rollback() {
    let mut store = MessageStore::new("conv-1");
    store.initialize(vec![row("1", "bob", 10), row("2", "bob", 20)]);

    let t1 = store.append_optimistic(Message::optimistic("t1", "conv-1", "alice", "hi", 30));
    assert_eq!(t1, "t1");
    assert_eq!(store.len(), 3);
    assert!(store.messages()[2].local_only);

    assert!(store.remove_optimistic("t1"));
    assert_eq!(store.len(), 2);
}

#[test]
fn pushes_out_of_creation_order() {
    let mut store = MessageStore::new("conv-1");
    store.initialize(vec![]);

    for (id, ts) in [("c", 30), ("a", 10), ("b", 20), ("a", 10), ("d", 25)] {
        store.merge_remote(row(id, "bob", ts)).unwrap();
    }
    assert_eq!(ids(&store), vec!["a", "b", "d", "c"]);
}

#[test]
fn same_timestamp_keeps_arrival_order() {
    let mut store = MessageStore::new("conv-1");
    store.merge_remote(row("z", "bob", 100)).unwrap();
    store.merge_remote(row("a", "bob", 100)).unwrap();
    store.merge_remote(row("m", "bob", 100)).unwrap();
    assert_eq!(ids(&store), vec!["z", "a", "m"]);
}

#[test]
fn timestamp_boundaries() {
    let mut store = MessageStore::new("conv-1");
    store.merge_remote(row("max", "bob", u64::MAX)).unwrap();
    store.merge_remote(row("zero", "bob", 0)).unwrap();
    store.append_optimistic(Message::optimistic("tmp-1", "conv-1", "alice", "x", u64::MAX));
    assert_eq!(ids(&store), vec!["zero", "max", "tmp-1"]);
}

// ============================================================================
// Send Races
// ============================================================================

#[test]
fn push_before_send_response() {
    // Filter off: the own row arrives through the subscription first
    let mut store = MessageStore::new("conv-1");
    store.append_optimistic(Message::optimistic("tmp-1", "conv-1", "alice", "hi", 30));

    let stored = row("srv-1", "alice", 31);
    apply_pushes(&mut store, &PushFilter::disabled("alice"), vec![stored.clone()]);
    assert_eq!(store.len(), 2);

    // Then the insert response confirms the optimistic entry
    let outcome = store.reconcile_sent("tmp-1", stored);
    assert_eq!(outcome, ReconcileOutcome::AlreadyDelivered);
    assert_eq!(ids(&store), vec!["srv-1"]);
}

#[test]
fn push_after_send_response() {
    let mut store = MessageStore::new("conv-1");
    store.append_optimistic(Message::optimistic("tmp-1", "conv-1", "alice", "hi", 30));

    let stored = row("srv-1", "alice", 31);
    store.reconcile_sent("tmp-1", stored.clone());
    let result = apply_pushes(&mut store, &PushFilter::disabled("alice"), vec![stored]);

    assert_eq!(result.duplicates, 1);
    assert_eq!(ids(&store), vec!["srv-1"]);
}

#[test]
fn failed_send_between_pushes() {
    let mut store = MessageStore::new("conv-1");
    store.initialize(vec![row("1", "bob", 10)]);
    store.append_optimistic(Message::optimistic("tmp-1", "conv-1", "alice", "hi", 20));
    store.merge_remote(row("2", "bob", 25)).unwrap();
    store.remove_optimistic("tmp-1");

    assert_eq!(ids(&store), vec!["1", "2"]);
    assert_eq!(store.pending_count(), 0);
}

#[test]
fn several_pending_sends_resolve_independently() {
    let mut store = MessageStore::new("conv-1");
    for i in 0..3u64 {
        store.append_optimistic(Message::optimistic(
            format!("tmp-{}", i),
            "conv-1",
            "alice",
            "x",
            10 + i,
        ));
    }

    store.reconcile_sent("tmp-1", row("srv-1", "alice", 11));
    store.remove_optimistic("tmp-0");
    assert!(store.promote("tmp-2"));

    assert_eq!(ids(&store), vec!["srv-1", "tmp-2"]);
    assert_eq!(store.pending_count(), 0);
}

// ============================================================================
// Early Pushes
// ============================================================================

#[test]
fn early_pushes_applied_after_load() {
    let mut queue = EarlyPushQueue::default();
    queue.push(row("3", "bob", 30));
    queue.push(row("2", "bob", 20)); // also part of the load
    queue.push(row("4", "alice", 40)); // own, not in the load
    queue.push(row("5", "alice", 50)); // own, also part of the load

    let mut store = MessageStore::new("conv-1");
    store.initialize(vec![row("1", "bob", 10), row("2", "bob", 20), row("5", "alice", 50)]);
    let result = apply_pushes(&mut store, &PushFilter::new("alice"), queue.drain());

    assert_eq!(result.merged, 2);
    assert_eq!(result.duplicates, 1);
    assert_eq!(result.discarded_own, 1);
    assert_eq!(ids(&store), vec!["1", "2", "3", "4", "5"]);
}

// ============================================================================
// Content and Snapshot Edge Cases
// ============================================================================

#[test]
fn unicode_content() {
    let contents = ["日本語テスト", "Привет мир", "🎉🚀💯", "Hello\nWorld\tTab"];
    let mut store = MessageStore::new("conv-1");

    for (i, content) in contents.iter().enumerate() {
        assert!(validate_content(content, 100).is_ok());
        store
            .merge_remote(Message::confirmed(i.to_string(), "conv-1", "bob", *content, i as u64))
            .unwrap();
    }

    let snapshot = ConversationSnapshot::capture(&store, SyncState::Ready, None);
    let parsed = ConversationSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(parsed.messages[2].content, "🎉🚀💯");
}

#[test]
fn whitespace_only_content_is_blank() {
    assert_eq!(validate_content("\u{2003}\n", 10), Err(Error::BlankContent));
}

#[test]
fn snapshot_of_empty_store() {
    let store = MessageStore::new("conv-1");
    let snapshot = ConversationSnapshot::capture(&store, SyncState::Loading, None);
    let json = snapshot.to_json_pretty().unwrap();
    let parsed = ConversationSnapshot::from_json(&json).unwrap();
    assert_eq!(parsed.state, SyncState::Loading);
    assert!(parsed.messages.is_empty());
}

#[test]
fn snapshot_rejects_garbage() {
    let result = ConversationSnapshot::from_json("{not json");
    assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
}

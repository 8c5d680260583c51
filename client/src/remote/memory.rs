//! In-process remote store.
//!
//! Keeps rows per conversation and fans inserted rows out to every open
//! subscription whose filter matches, including the inserter's own. Faults
//! can be injected to exercise the controller's failure paths.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chatsync_engine::{ConversationId, Message, MessageFilter, NewMessage, Timestamp};
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};

use super::{InsertAck, RemoteStore, Subscription, SubscriptionId};
use crate::error::RemoteError;

/// Sender side of a subscription.
type RowSender = mpsc::UnboundedSender<Message>;

#[derive(Debug)]
struct Subscriber {
    filter: MessageFilter,
    sender: RowSender,
}

/// Thread-safe in-memory implementation of [`RemoteStore`].
#[derive(Debug)]
pub struct MemoryRemote {
    /// Stored rows, keyed by conversation, in insertion order.
    rows: DashMap<ConversationId, Vec<Message>>,
    /// Open subscriptions, keyed by subscription ID.
    subscribers: DashMap<SubscriptionId, Subscriber>,
    /// Last server timestamp handed out.
    clock: AtomicU64,
    /// Queries wait while this is true.
    query_gate: watch::Sender<bool>,
    queries_started: AtomicUsize,
    /// Inserts wait while this is true.
    insert_gate: watch::Sender<bool>,
    inserts_started: AtomicUsize,
    fail_queries: AtomicBool,
    fail_subscribe: AtomicBool,
    failing_inserts: AtomicUsize,
    echo_rows: AtomicBool,
    duplicate_pushes: AtomicBool,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Create an empty store.
    pub fn new() -> Self {
        let (query_gate, _) = watch::channel(false);
        let (insert_gate, _) = watch::channel(false);
        Self {
            rows: DashMap::new(),
            subscribers: DashMap::new(),
            clock: AtomicU64::new(0),
            query_gate,
            queries_started: AtomicUsize::new(0),
            insert_gate,
            inserts_started: AtomicUsize::new(0),
            fail_queries: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            failing_inserts: AtomicUsize::new(0),
            echo_rows: AtomicBool::new(true),
            duplicate_pushes: AtomicBool::new(false),
        }
    }

    /// Store rows directly, without notifying subscribers.
    pub fn seed(&self, rows: impl IntoIterator<Item = Message>) {
        for row in rows {
            self.clock.fetch_max(row.created_at, Ordering::SeqCst);
            self.rows
                .entry(row.conversation_id.clone())
                .or_default()
                .push(row);
        }
    }

    /// Deliver a row to matching subscribers without storing it.
    ///
    /// Returns the number of subscriptions that received it.
    pub fn push_raw(&self, row: Message) -> usize {
        let mut sent_count = 0;

        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if subscriber.filter.matches(&row) && subscriber.sender.send(row.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::debug!(
            message_id = %row.id,
            recipients = sent_count,
            "Pushed row to subscribers"
        );

        sent_count
    }

    /// Rows stored for a conversation, in insertion order.
    pub fn stored(&self, conversation_id: &str) -> Vec<Message> {
        self.rows
            .get(conversation_id)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    /// Hold every query until [`MemoryRemote::release_queries`] is called.
    pub fn hold_queries(&self) {
        self.query_gate.send_replace(true);
    }

    /// Let held and future queries complete.
    pub fn release_queries(&self) {
        self.query_gate.send_replace(false);
    }

    /// Number of queries that have started, held ones included.
    pub fn queries_started(&self) -> usize {
        self.queries_started.load(Ordering::SeqCst)
    }

    /// Hold every insert, before it is stored, until
    /// [`MemoryRemote::release_inserts`] is called.
    pub fn hold_inserts(&self) {
        self.insert_gate.send_replace(true);
    }

    /// Let held and future inserts complete.
    pub fn release_inserts(&self) {
        self.insert_gate.send_replace(false);
    }

    /// Number of inserts that have started, held ones included.
    pub fn inserts_started(&self) -> usize {
        self.inserts_started.load(Ordering::SeqCst)
    }

    /// Make queries fail with a transport error.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make subscribe calls fail with a transport error.
    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` inserts.
    pub fn fail_next_inserts(&self, count: usize) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Whether insert acks include the stored row.
    pub fn echo_rows(&self, echo: bool) {
        self.echo_rows.store(echo, Ordering::SeqCst);
    }

    /// Deliver every inserted row twice.
    pub fn duplicate_pushes(&self, duplicate: bool) {
        self.duplicate_pushes.store(duplicate, Ordering::SeqCst);
    }

    /// Close every open subscription from the server side.
    pub fn drop_subscriptions(&self) {
        self.subscribers.clear();
        tracing::info!("All subscriptions dropped");
    }

    /// Get the number of open subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.len()
    }

    fn next_timestamp(&self) -> Timestamp {
        let now = chrono::Utc::now().timestamp_millis().max(0) as Timestamp;
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        now.max(previous.saturating_add(1))
    }

    fn take_insert_failure(&self) -> bool {
        self.failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn query(&self, filter: &MessageFilter) -> Result<Vec<Message>, RemoteError> {
        self.queries_started.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.query_gate.subscribe();
        gate.wait_for(|held| !*held)
            .await
            .map_err(|_| RemoteError::Closed)?;

        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("query failed".to_string()));
        }

        let mut rows = self.stored(&filter.conversation_id);
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn insert(&self, row: NewMessage) -> Result<InsertAck, RemoteError> {
        self.inserts_started.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.insert_gate.subscribe();
        gate.wait_for(|held| !*held)
            .await
            .map_err(|_| RemoteError::Closed)?;

        if self.take_insert_failure() {
            return Err(RemoteError::Transport("insert failed".to_string()));
        }

        let stored = Message::confirmed(
            uuid::Uuid::new_v4().to_string(),
            row.conversation_id,
            row.sender_id,
            row.content,
            self.next_timestamp(),
        )
        .with_client_id(row.client_id);

        self.rows
            .entry(stored.conversation_id.clone())
            .or_default()
            .push(stored.clone());

        self.push_raw(stored.clone());
        if self.duplicate_pushes.load(Ordering::SeqCst) {
            self.push_raw(stored.clone());
        }

        let row = self.echo_rows.load(Ordering::SeqCst).then_some(stored);
        Ok(InsertAck { row })
    }

    async fn subscribe(&self, filter: &MessageFilter) -> Result<Subscription, RemoteError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("subscribe failed".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.insert(
            id.clone(),
            Subscriber {
                filter: filter.clone(),
                sender,
            },
        );

        tracing::info!(
            subscription_id = %id,
            conversation_id = %filter.conversation_id,
            "Subscription opened"
        );

        let rows = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|row| (row, receiver))
        })
        .boxed();

        Ok(Subscription { id, rows })
    }

    async fn unsubscribe(&self, id: &str) -> Result<(), RemoteError> {
        if self.subscribers.remove(id).is_some() {
            tracing::info!(subscription_id = %id, "Subscription closed");
        }
        Ok(())
    }
}

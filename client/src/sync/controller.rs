//! Conversation sync controller.
//!
//! Drives one conversation at a time through
//! `Idle -> Loading -> Ready -> TornDown`: loads the history, keeps the push
//! subscription attached, sends messages optimistically and reconciles them
//! with what the server stored.

use std::sync::Arc;

use chatsync_engine::{
    apply_pushes, validate_content, ConversationBinding, ConversationId, ConversationSnapshot,
    EarlyPushQueue, ErrorKind, Message, MessageStore, PushFilter, SyncState, Timestamp, UserId,
    TEMP_ID_PREFIX,
};
use futures::{stream::BoxStream, StreamExt};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::session::{ActiveSubscription, Session};
use super::SyncOptions;
use crate::error::{RemoteError, Result, SyncError};
use crate::remote::{InsertAck, RemoteStore};

/// Owns the message store of the active conversation.
///
/// All methods take `&self`; the controller can be shared behind an `Arc`
/// and driven from several tasks. The session lock is never held across a
/// remote call.
pub struct SyncController<R: RemoteStore> {
    remote: Arc<R>,
    options: SyncOptions,
    session: Arc<Mutex<Session>>,
    view: Arc<watch::Sender<ConversationSnapshot>>,
}

impl<R: RemoteStore> SyncController<R> {
    /// Create an idle controller.
    pub fn new(remote: Arc<R>, options: SyncOptions) -> Self {
        let (view, _) = watch::channel(ConversationSnapshot::empty(SyncState::Idle));
        let session = Session {
            early: EarlyPushQueue::with_capacity(options.early_push_capacity),
            ..Default::default()
        };
        Self {
            remote,
            options,
            session: Arc::new(Mutex::new(session)),
            view: Arc::new(view),
        }
    }

    /// Subscribe to the read-only view of the conversation.
    pub fn view(&self) -> watch::Receiver<ConversationSnapshot> {
        self.view.subscribe()
    }

    /// The latest published view.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.view.borrow().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SyncState {
        self.view.borrow().state
    }

    /// Enter a conversation, leaving the current one first.
    ///
    /// Opens the push subscription, then loads the history. Rows pushed while
    /// the load is in flight are queued and merged once it lands. A failed
    /// load leaves the controller in `Loading` with a load error in the view;
    /// call `enter` again to retry. A failed subscription is reported but not
    /// fatal: the conversation becomes ready in send-only mode.
    pub async fn enter(
        &self,
        conversation_id: impl Into<ConversationId>,
        current_user_id: impl Into<UserId>,
    ) -> Result<()> {
        let binding = ConversationBinding::new(conversation_id, current_user_id);
        self.leave().await;

        let generation = {
            let mut session = self.session.lock().await;
            session.generation += 1;
            session.binding = Some(binding.clone());
            session.state = SyncState::Loading;
            session.filter = Some(self.push_filter(&binding));
            session.early = EarlyPushQueue::with_capacity(self.options.early_push_capacity);
            session.error = None;
            self.publish(&session);
            session.generation
        };

        tracing::info!(
            conversation_id = %binding.conversation_id,
            user_id = %binding.current_user_id,
            generation,
            "Entering conversation"
        );

        let filter = binding.filter();

        // Subscribe before querying so no insert falls between the two
        match self.remote.subscribe(&filter).await {
            Ok(subscription) => {
                let mut session = self.session.lock().await;
                if !session.is_current(generation) {
                    drop(session);
                    self.close_subscription(&subscription.id).await;
                    return Err(SyncError::Cancelled);
                }
                let pump = self.spawn_pump(generation, subscription.rows);
                session.subscription = Some(ActiveSubscription {
                    id: subscription.id,
                    pump,
                });
            }
            Err(source) => {
                tracing::warn!(
                    conversation_id = %binding.conversation_id,
                    error = %source,
                    "Failed to open subscription, continuing without live updates"
                );
                let mut session = self.session.lock().await;
                if !session.is_current(generation) {
                    return Err(SyncError::Cancelled);
                }
                session.error = SyncError::Subscription(source).to_view_error();
                self.publish(&session);
            }
        }

        let loaded = self.remote.query(&filter).await;

        let mut session = self.session.lock().await;
        if !session.is_current(generation) {
            tracing::debug!(
                conversation_id = %binding.conversation_id,
                generation,
                "Discarding stale load"
            );
            return Err(SyncError::Cancelled);
        }

        match loaded {
            Ok(rows) => {
                let mut store = MessageStore::new(binding.conversation_id.clone());
                let loaded_count = store.initialize(rows);

                let queued = session.early.drain();
                let push_filter = self.push_filter(&binding);
                let early = apply_pushes(&mut store, &push_filter, queued);

                session.store = Some(store);
                session.state = SyncState::Ready;
                if session.error.as_ref().is_some_and(|e| e.kind == ErrorKind::Load) {
                    session.error = None;
                }
                self.publish(&session);

                tracing::info!(
                    conversation_id = %binding.conversation_id,
                    loaded = loaded_count,
                    early_merged = early.merged,
                    early_duplicates = early.duplicates,
                    "Conversation ready"
                );
                Ok(())
            }
            Err(source) => {
                tracing::warn!(
                    conversation_id = %binding.conversation_id,
                    error = %source,
                    "Failed to load conversation"
                );
                let err = SyncError::Load {
                    conversation_id: binding.conversation_id,
                    source,
                };
                session.error = err.to_view_error();
                self.publish(&session);
                Err(err)
            }
        }
    }

    /// Send a message in the active conversation.
    ///
    /// Blank content is ignored and returns `Ok(None)`. Otherwise an
    /// optimistic entry is shown immediately and replaced by the stored row
    /// once the insert succeeds. On failure the entry is removed and the
    /// returned [`SyncError::Send`] carries the content for a retry.
    pub async fn send(&self, content: &str) -> Result<Option<Message>> {
        if content.trim().is_empty() {
            return Ok(None);
        }

        let (generation, optimistic) = {
            let mut session = self.session.lock().await;
            let binding = match (&session.binding, session.state) {
                (Some(binding), SyncState::Ready) => binding.clone(),
                _ => return Err(SyncError::NotReady),
            };

            if let Err(e) = validate_content(content, self.options.max_content_len) {
                let err = SyncError::from(e);
                session.error = err.to_view_error();
                self.publish(&session);
                return Err(err);
            }

            let optimistic = Message::optimistic(
                new_temp_id(),
                binding.conversation_id,
                binding.current_user_id,
                content,
                now_millis(),
            );
            let Some(store) = session.store.as_mut() else {
                return Err(SyncError::NotReady);
            };
            store.append_optimistic(optimistic.clone());
            self.publish(&session);
            (session.generation, optimistic)
        };

        tracing::debug!(temp_id = %optimistic.id, "Sending message");
        let result = self.remote.insert(optimistic.to_new_message()).await;

        let mut session = self.session.lock().await;
        if !session.is_current(generation) {
            // Re-entered the same conversation: the stored row still belongs
            // in the list even though the optimistic entry is gone
            if let Ok(InsertAck { row: Some(row) }) = result {
                let same_conversation = session
                    .binding
                    .as_ref()
                    .is_some_and(|b| b.conversation_id == row.conversation_id);
                if same_conversation && session.apply_push(row) {
                    self.publish(&session);
                }
            }
            tracing::debug!(temp_id = %optimistic.id, "Discarding send response after leave");
            return Err(SyncError::Cancelled);
        }
        let Some(store) = session.store.as_mut() else {
            return Err(SyncError::Cancelled);
        };

        match result {
            Ok(InsertAck { row: Some(row) }) => {
                let outcome = store.reconcile_sent(&optimistic.id, row.clone());
                tracing::debug!(
                    temp_id = %optimistic.id,
                    message_id = %row.id,
                    ?outcome,
                    "Message confirmed"
                );
                self.clear_error(&mut session, ErrorKind::Send);
                self.publish(&session);
                Ok(Some(row))
            }
            Ok(InsertAck { row: None }) => {
                store.promote(&optimistic.id);
                // A push carrying the client id may already have confirmed it
                let confirmed = store
                    .get(&optimistic.id)
                    .or_else(|| store.find_by_client_id(&optimistic.id))
                    .cloned()
                    .unwrap_or_else(|| Message {
                        local_only: false,
                        ..optimistic.clone()
                    });
                tracing::debug!(
                    temp_id = %optimistic.id,
                    message_id = %confirmed.id,
                    "Message acknowledged without row"
                );
                self.clear_error(&mut session, ErrorKind::Send);
                self.publish(&session);
                Ok(Some(confirmed))
            }
            Err(source) => {
                store.remove_optimistic(&optimistic.id);
                tracing::warn!(temp_id = %optimistic.id, error = %source, "Failed to send message");
                let err = SyncError::Send {
                    content: content.to_string(),
                    source,
                };
                session.error = err.to_view_error();
                self.publish(&session);
                Err(err)
            }
        }
    }

    /// Leave the active conversation.
    ///
    /// Closes the push subscription and discards the message store. Any load,
    /// send or push still in flight for it is ignored when it lands. Calling
    /// this with nothing entered is a no-op.
    pub async fn leave(&self) {
        let (subscription, conversation_id) = {
            let mut session = self.session.lock().await;
            if session.binding.is_none() && session.subscription.is_none() {
                return;
            }
            let conversation_id = session.binding.as_ref().map(|b| b.conversation_id.clone());
            let subscription = session.tear_down();
            self.publish(&session);
            (subscription, conversation_id)
        };

        if let Some(id) = subscription {
            self.close_subscription(&id).await;
        }

        tracing::info!(conversation_id = ?conversation_id, "Left conversation");
    }

    fn push_filter(&self, binding: &ConversationBinding) -> PushFilter {
        if self.options.filter_own_pushes {
            PushFilter::new(binding.current_user_id.clone())
        } else {
            PushFilter::disabled(binding.current_user_id.clone())
        }
    }

    fn publish(&self, session: &Session) {
        self.view.send_replace(session.snapshot());
    }

    fn clear_error(&self, session: &mut Session, kind: ErrorKind) {
        if session.error.as_ref().is_some_and(|e| e.kind == kind) {
            session.error = None;
        }
    }

    async fn close_subscription(&self, id: &str) {
        if let Err(e) = self.remote.unsubscribe(id).await {
            tracing::warn!(subscription_id = %id, error = %e, "Failed to close subscription");
        }
    }

    /// Drain pushed rows into the session until the stream ends or the
    /// generation moves on.
    fn spawn_pump(
        &self,
        generation: u64,
        mut rows: BoxStream<'static, Message>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let view = Arc::clone(&self.view);

        tokio::spawn(async move {
            while let Some(row) = rows.next().await {
                let mut session = session.lock().await;
                if !session.is_current(generation) {
                    return;
                }
                if session.apply_push(row) {
                    view.send_replace(session.snapshot());
                }
            }

            let mut session = session.lock().await;
            if session.is_current(generation) {
                tracing::warn!(generation, "Subscription dropped, live updates stopped");
                session.subscription = None;
                session.error = SyncError::Subscription(RemoteError::Closed).to_view_error();
                view.send_replace(session.snapshot());
            }
        })
    }
}

/// Dropping a controller without [`SyncController::leave`] still closes its
/// subscription. Outside a tokio runtime only the pump is stopped and the
/// remote keeps the subscription open.
impl<R: RemoteStore> Drop for SyncController<R> {
    fn drop(&mut self) {
        let session = Arc::clone(&self.session);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            if let Ok(mut session) = session.try_lock() {
                session.tear_down();
            }
            return;
        };

        let remote = Arc::clone(&self.remote);
        handle.spawn(async move {
            let subscription = session.lock().await.tear_down();
            if let Some(id) = subscription {
                if let Err(e) = remote.unsubscribe(&id).await {
                    tracing::warn!(subscription_id = %id, error = %e, "Failed to close subscription");
                }
            }
        });
    }
}

fn new_temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4())
}

fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

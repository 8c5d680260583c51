//! Mutable state of the active conversation.

use chatsync_engine::{
    apply_pushes, ConversationBinding, ConversationSnapshot, EarlyPushQueue, Message,
    MessageStore, PushFilter, SyncState, ViewError,
};
use tokio::task::JoinHandle;

use crate::remote::SubscriptionId;

/// An attached push subscription and the task draining it.
#[derive(Debug)]
pub(crate) struct ActiveSubscription {
    pub id: SubscriptionId,
    pub pump: JoinHandle<()>,
}

/// Everything the controller owns for one conversation.
///
/// `generation` identifies the current binding. Every enter and leave bumps
/// it; responses and pushes tagged with an older generation are stale.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub generation: u64,
    pub binding: Option<ConversationBinding>,
    pub state: SyncState,
    pub store: Option<MessageStore>,
    pub filter: Option<PushFilter>,
    pub early: EarlyPushQueue,
    pub subscription: Option<ActiveSubscription>,
    pub error: Option<ViewError>,
}

impl Session {
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Apply one pushed row. Returns true if the visible list changed.
    ///
    /// While loading, rows are queued and applied once the load lands.
    pub fn apply_push(&mut self, row: Message) -> bool {
        match self.state {
            SyncState::Loading => {
                if !self.early.push(row) {
                    tracing::warn!(
                        dropped = self.early.dropped(),
                        "Early push queue full, oldest row dropped"
                    );
                }
                false
            }
            SyncState::Ready => {
                let (Some(store), Some(filter)) = (self.store.as_mut(), self.filter.as_ref()) else {
                    return false;
                };
                let message_id = row.id.clone();
                let result = apply_pushes(store, filter, std::iter::once(row));
                tracing::debug!(
                    message_id = %message_id,
                    merged = result.merged,
                    reconciled = result.reconciled,
                    duplicates = result.duplicates,
                    discarded_own = result.discarded_own,
                    "Applied pushed row"
                );
                result.changed()
            }
            SyncState::Idle | SyncState::TornDown => false,
        }
    }

    /// Current read-only view.
    pub fn snapshot(&self) -> ConversationSnapshot {
        match &self.store {
            Some(store) => ConversationSnapshot::capture(store, self.state, self.error.clone()),
            None => ConversationSnapshot {
                conversation_id: self.binding.as_ref().map(|b| b.conversation_id.clone()),
                error: self.error.clone(),
                ..ConversationSnapshot::empty(self.state)
            },
        }
    }

    /// Drop the store and everything bound to the conversation.
    ///
    /// The pump is aborted before the store goes away; the returned id still
    /// needs an unsubscribe call.
    pub fn tear_down(&mut self) -> Option<SubscriptionId> {
        self.generation += 1;
        let subscription = self.subscription.take().map(|sub| {
            sub.pump.abort();
            sub.id
        });
        self.binding = None;
        self.store = None;
        self.filter = None;
        self.early.clear();
        self.error = None;
        self.state = SyncState::TornDown;
        subscription
    }
}

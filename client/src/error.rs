//! Unified error handling for the sync client.

use chatsync_engine::{ConversationId, ErrorKind, ViewError};

/// Failure reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Uniqueness/constraint violation on insert
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Channel closed")]
    Closed,
}

/// Sync controller error type.
///
/// None of these are fatal: the message list is left consistent and the
/// failed operation can be retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Initial fetch failed; list stays empty, retry by entering again
    #[error("Failed to load conversation {conversation_id}: {source}")]
    Load {
        conversation_id: ConversationId,
        source: RemoteError,
    },

    /// Insert failed; the optimistic entry was rolled back
    #[error("Failed to send message: {source}")]
    Send {
        /// The content that was not sent, kept for retry
        content: String,
        source: RemoteError,
    },

    /// Push channel failed to open or dropped
    #[error("Subscription error: {0}")]
    Subscription(RemoteError),

    #[error("No conversation is ready")]
    NotReady,

    /// The conversation was left or switched while the call was in flight
    #[error("Conversation changed while the request was in flight")]
    Cancelled,

    #[error("Engine error: {0}")]
    Engine(#[from] chatsync_engine::Error),
}

impl SyncError {
    /// The notification to show for this error, if any.
    pub fn to_view_error(&self) -> Option<ViewError> {
        let kind = match self {
            SyncError::Load { .. } => ErrorKind::Load,
            SyncError::Send { .. } | SyncError::Engine(_) => ErrorKind::Send,
            SyncError::Subscription(_) => ErrorKind::Subscription,
            SyncError::NotReady | SyncError::Cancelled => return None,
        };
        Some(ViewError::new(kind, self.to_string()))
    }
}

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, SyncError>;

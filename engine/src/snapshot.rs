//! Read-only snapshots of a conversation for the presentation layer.
//!
//! A snapshot captures the visible message list together with the sync
//! state and the last user-facing error. Snapshots serialize to JSON so a
//! view can be handed across a process or language boundary.

use crate::{error::Result, ConversationId, Error, Message, MessageStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Lifecycle state of the active conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    /// No conversation entered yet
    #[default]
    Idle,
    /// Initial query in flight
    Loading,
    /// Loaded; sends and pushes are applied
    Ready,
    /// Conversation left; subscription closed
    TornDown,
}

/// Category of a user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Load,
    Send,
    Subscription,
}

/// A failure to show as a transient notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ViewError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A point-in-time view of the active conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Active conversation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    /// Lifecycle state
    pub state: SyncState,
    /// Messages in display order
    pub messages: Vec<Message>,
    /// Last failure, cleared on the next successful operation of the same kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ViewError>,
}

impl ConversationSnapshot {
    /// An empty snapshot in the given state.
    pub fn empty(state: SyncState) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            state,
            ..Default::default()
        }
    }

    /// Capture the current contents of a store.
    pub fn capture(store: &MessageStore, state: SyncState, error: Option<ViewError>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            conversation_id: Some(store.conversation_id().clone()),
            state,
            messages: store.messages().to_vec(),
            error,
        }
    }

    /// Count of optimistic entries still awaiting confirmation.
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.local_only).count()
    }

    /// Check ordering and uniqueness of the message list.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for message in &self.messages {
            if !seen.insert(message.id.as_str()) {
                return Err(Error::InvalidSnapshot(format!(
                    "duplicate message id: {}",
                    message.id
                )));
            }
        }

        if let Some(pair) = self
            .messages
            .windows(2)
            .find(|w| w[0].created_at > w[1].created_at)
        {
            return Err(Error::InvalidSnapshot(format!(
                "messages out of order: {} after {}",
                pair[1].id, pair[0].id
            )));
        }

        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        // Validate format version
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> MessageStore {
        let mut store = MessageStore::new("conv-1");
        store.initialize(vec![
            Message::confirmed("1", "conv-1", "bob", "hello", 10),
            Message::confirmed("2", "conv-1", "alice", "hi", 20),
        ]);
        store.append_optimistic(Message::optimistic("tmp-1", "conv-1", "alice", "how are you", 30));
        store
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = ConversationSnapshot::empty(SyncState::Idle);
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert!(snapshot.conversation_id.is_none());
        assert!(snapshot.messages.is_empty());
    }

    #[test]
    fn capture_store() {
        let snapshot = ConversationSnapshot::capture(&test_store(), SyncState::Ready, None);
        assert_eq!(snapshot.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.pending_count(), 1);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn json_roundtrip() {
        let error = ViewError::new(ErrorKind::Send, "network down");
        let snapshot = ConversationSnapshot::capture(&test_store(), SyncState::Ready, Some(error));

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"state\":\"ready\""));
        assert!(json.contains("\"kind\":\"send\""));

        let parsed = ConversationSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn from_json_rejects_future_version() {
        let mut snapshot = ConversationSnapshot::empty(SyncState::Ready);
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;
        let json = snapshot.to_json().unwrap();

        let result = ConversationSnapshot::from_json(&json);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn validate_rejects_duplicates_and_disorder() {
        let mut snapshot = ConversationSnapshot::capture(&test_store(), SyncState::Ready, None);
        snapshot.messages.push(snapshot.messages[0].clone());
        assert!(matches!(snapshot.validate(), Err(Error::InvalidSnapshot(_))));

        let mut snapshot = ConversationSnapshot::capture(&test_store(), SyncState::Ready, None);
        snapshot.messages.swap(0, 1);
        let err = snapshot.validate().unwrap_err();
        assert_eq!(
            err,
            Error::InvalidSnapshot("messages out of order: 1 after 2".into())
        );
    }
}

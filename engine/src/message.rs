//! Message types exchanged with the remote store.

use crate::{error::Result, ConversationId, Error, MessageId, Timestamp, UserId, TEMP_ID_PREFIX};
use serde::{Deserialize, Serialize};

/// A chat message, either confirmed by the server or shown optimistically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id, or a temporary id while `local_only`
    pub id: MessageId,
    /// Conversation this message belongs to
    pub conversation_id: ConversationId,
    /// Author of the message
    pub sender_id: UserId,
    /// Message text
    pub content: String,
    /// Creation time (milliseconds since epoch)
    pub created_at: Timestamp,
    /// True until the server has confirmed the message
    #[serde(default)]
    pub local_only: bool,
    /// Temporary id of the optimistic entry this row was inserted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<MessageId>,
}

impl Message {
    /// Create a confirmed message, as returned by a query or pushed by a subscription.
    pub fn confirmed(
        id: impl Into<MessageId>,
        conversation_id: impl Into<ConversationId>,
        sender_id: impl Into<UserId>,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            created_at,
            local_only: false,
            client_id: None,
        }
    }

    /// Attach the temporary id the row was inserted from.
    pub fn with_client_id(mut self, client_id: impl Into<MessageId>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Create an optimistic message under a temporary id.
    pub fn optimistic(
        temp_id: impl Into<MessageId>,
        conversation_id: impl Into<ConversationId>,
        sender_id: impl Into<UserId>,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            local_only: true,
            ..Self::confirmed(temp_id, conversation_id, sender_id, content, created_at)
        }
    }

    /// Whether this message carries a client-generated temporary id.
    pub fn has_temp_id(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// The insert payload for this (optimistic) message.
    pub fn to_new_message(&self) -> NewMessage {
        NewMessage {
            conversation_id: self.conversation_id.clone(),
            sender_id: self.sender_id.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            client_id: self.id.clone(),
        }
    }
}

/// Row payload sent to the remote store on insert.
///
/// The server assigns the final id; `client_id` carries the temporary id so
/// a stored row can be traced back to its optimistic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
    pub client_id: MessageId,
}

/// Which conversation is active and who is looking at it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationBinding {
    pub conversation_id: ConversationId,
    pub current_user_id: UserId,
}

impl ConversationBinding {
    pub fn new(conversation_id: impl Into<ConversationId>, current_user_id: impl Into<UserId>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            current_user_id: current_user_id.into(),
        }
    }

    /// The query/subscription filter for this binding.
    pub fn filter(&self) -> MessageFilter {
        MessageFilter {
            conversation_id: self.conversation_id.clone(),
        }
    }
}

/// Filter used for both the initial query and the push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    pub conversation_id: ConversationId,
}

impl MessageFilter {
    pub fn matches(&self, message: &Message) -> bool {
        message.conversation_id == self.conversation_id
    }
}

/// Check outgoing content. Blank content and content over `max_len`
/// characters are rejected.
pub fn validate_content(content: &str, max_len: usize) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::BlankContent);
    }
    let len = content.chars().count();
    if len > max_len {
        return Err(Error::ContentTooLong { len, max: max_len });
    }
    Ok(())
}

//! MessageStore - the ordered message list of one conversation.
//!
//! The store merges optimistic local entries with confirmed rows from the
//! initial load, send acknowledgements and push subscriptions. After any
//! sequence of operations the list holds at most one entry per id and is
//! sorted by `created_at`, ties broken by insertion order.

use crate::{error::Result, ConversationId, Error, Message, MessageId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of merging a remote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeOutcome {
    /// Row was new and inserted at `index`
    Inserted { index: usize },
    /// Row id already present, nothing changed
    Duplicate,
    /// Row confirmed an optimistic entry (matched by client id), now at `index`
    Reconciled { index: usize },
}

/// Result of reconciling an optimistic entry with its confirmed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// Replaced in place
    Replaced { index: usize },
    /// Confirmed timestamp did not fit between the neighbours; moved
    Repositioned { from: usize, to: usize },
    /// Confirmed row was already in the list; optimistic entry dropped
    AlreadyDelivered,
    /// No optimistic entry with that temporary id
    NotFound,
}

/// In-memory, ordered, de-duplicated message list for one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageStore {
    conversation_id: ConversationId,
    messages: Vec<Message>,
    /// Ids of every entry in `messages` (server and temporary)
    ids: HashSet<MessageId>,
}

impl MessageStore {
    /// Create an empty store for a conversation.
    pub fn new(conversation_id: impl Into<ConversationId>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Get the conversation ID.
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Replace all content with a full load.
    ///
    /// Rows are stable-sorted by `created_at`. Rows for another conversation
    /// and repeated ids (after the first) are skipped. Returns the number of
    /// rows kept.
    pub fn initialize(&mut self, rows: Vec<Message>) -> usize {
        self.messages.clear();
        self.ids.clear();

        for mut row in rows {
            if row.conversation_id != self.conversation_id || self.ids.contains(&row.id) {
                continue;
            }
            row.local_only = false;
            self.ids.insert(row.id.clone());
            self.messages.push(row);
        }

        // sort_by_key is stable: equal timestamps keep load order
        self.messages.sort_by_key(|m| m.created_at);
        self.messages.len()
    }

    /// Show a message before the server has confirmed it.
    ///
    /// The entry is newest by construction and lands at the end; a skewed
    /// clock still places it at its sorted position. Returns the temporary id.
    pub fn append_optimistic(&mut self, mut message: Message) -> MessageId {
        let temp_id = message.id.clone();
        if self.ids.contains(&temp_id) {
            return temp_id;
        }

        message.local_only = true;
        let index = self.upper_bound(message.created_at);
        self.ids.insert(temp_id.clone());
        self.messages.insert(index, message);
        temp_id
    }

    /// Replace the optimistic entry `temp_id` with its confirmed row.
    ///
    /// A no-op when the optimistic entry is gone. When the confirmed row was
    /// already delivered by a push, the optimistic entry is dropped instead.
    pub fn reconcile_sent(&mut self, temp_id: &str, confirmed: Message) -> ReconcileOutcome {
        let Some(index) = self.position_pending(temp_id) else {
            return ReconcileOutcome::NotFound;
        };
        self.confirm_at(index, confirmed)
    }

    /// Mark the optimistic entry `temp_id` confirmed under its temporary id.
    ///
    /// Used when an insert was acknowledged without the stored row.
    pub fn promote(&mut self, temp_id: &str) -> bool {
        match self.position_pending(temp_id) {
            Some(index) => {
                self.messages[index].local_only = false;
                true
            }
            None => false,
        }
    }

    /// Delete a pending optimistic entry (send failed).
    pub fn remove_optimistic(&mut self, temp_id: &str) -> bool {
        match self.position_pending(temp_id) {
            Some(index) => {
                let removed = self.messages.remove(index);
                self.ids.remove(&removed.id);
                true
            }
            None => false,
        }
    }

    /// Merge a row delivered by the remote store.
    ///
    /// Idempotent on the row id. A row whose `client_id` names an entry still
    /// under its temporary id confirms that entry in place. Otherwise the row
    /// is inserted after every entry with the same or an earlier `created_at`.
    pub fn merge_remote(&mut self, mut row: Message) -> Result<MergeOutcome> {
        if row.conversation_id != self.conversation_id {
            return Err(Error::ConversationMismatch {
                expected: self.conversation_id.clone(),
                actual: row.conversation_id,
            });
        }

        if self.ids.contains(&row.id) {
            return Ok(MergeOutcome::Duplicate);
        }

        if let Some(index) = row
            .client_id
            .as_deref()
            .and_then(|cid| self.position(cid))
        {
            return Ok(match self.confirm_at(index, row) {
                ReconcileOutcome::Replaced { index } => MergeOutcome::Reconciled { index },
                ReconcileOutcome::Repositioned { to, .. } => MergeOutcome::Reconciled { index: to },
                ReconcileOutcome::AlreadyDelivered | ReconcileOutcome::NotFound => {
                    MergeOutcome::Duplicate
                }
            });
        }

        row.local_only = false;
        let index = self.upper_bound(row.created_at);
        self.ids.insert(row.id.clone());
        self.messages.insert(index, row);
        Ok(MergeOutcome::Inserted { index })
    }

    /// All messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get a message by ID (server or temporary).
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.position(id).map(|i| &self.messages[i])
    }

    /// Check if a message id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Find the confirmed row that replaced the optimistic entry `client_id`.
    pub fn find_by_client_id(&self, client_id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.client_id.as_deref() == Some(client_id))
    }

    /// Count of optimistic entries awaiting confirmation.
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.local_only).count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    /// Index of the first entry strictly newer than `created_at`.
    fn upper_bound(&self, created_at: Timestamp) -> usize {
        self.messages.partition_point(|m| m.created_at <= created_at)
    }

    fn position(&self, id: &str) -> Option<usize> {
        if !self.ids.contains(id) {
            return None;
        }
        self.messages.iter().position(|m| m.id == id)
    }

    fn position_pending(&self, temp_id: &str) -> Option<usize> {
        self.position(temp_id)
            .filter(|&i| self.messages[i].local_only)
    }

    fn confirm_at(&mut self, index: usize, mut confirmed: Message) -> ReconcileOutcome {
        let old_id = self.messages[index].id.clone();

        if confirmed.id != old_id && self.ids.contains(&confirmed.id) {
            self.messages.remove(index);
            self.ids.remove(&old_id);
            return ReconcileOutcome::AlreadyDelivered;
        }

        confirmed.local_only = false;
        self.ids.remove(&old_id);
        self.ids.insert(confirmed.id.clone());

        let fits_before = index == 0 || self.messages[index - 1].created_at <= confirmed.created_at;
        let fits_after = index + 1 >= self.messages.len()
            || confirmed.created_at <= self.messages[index + 1].created_at;

        if fits_before && fits_after {
            self.messages[index] = confirmed;
            return ReconcileOutcome::Replaced { index };
        }

        self.messages.remove(index);
        let to = self.upper_bound(confirmed.created_at);
        self.messages.insert(to, confirmed);
        ReconcileOutcome::Repositioned { from: index, to }
    }
}

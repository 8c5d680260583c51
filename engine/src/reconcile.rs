//! Reconciliation of pushed rows with the message store.
//!
//! A push subscription delivers rows at least once and in no particular
//! order, possibly including rows the current user inserted. This module
//! decides what happens to each pushed row.
//!
//! # Algorithm
//!
//! 1. Rows sent by the current user are discarded when the store already
//!    holds them, either under their id or as the optimistic entry named by
//!    their client id; that entry is confirmed through the send path instead.
//!    Own rows the store has never seen (a send whose response was dropped
//!    because the conversation was re-entered) are merged
//! 2. Rows arriving before the initial load completed are queued
//! 3. Everything else goes through [`MessageStore::merge_remote`], which is
//!    idempotent on the row id and inserts at the sorted position

use crate::{Message, MergeOutcome, MessageStore, UserId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default capacity of the early push queue.
pub const DEFAULT_EARLY_PUSH_CAPACITY: usize = 256;

/// What to do with a pushed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PushDecision {
    /// Merge into the store
    Merge,
    /// Sent by the current user and already in the store
    DiscardOwn,
}

/// Sender-based filter applied at the subscription boundary.
///
/// This is a second line of defence only: the store de-duplicates by id and
/// by client id regardless of the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFilter {
    current_user_id: UserId,
    enabled: bool,
}

impl PushFilter {
    pub fn new(current_user_id: impl Into<UserId>) -> Self {
        Self {
            current_user_id: current_user_id.into(),
            enabled: true,
        }
    }

    /// A filter that lets every row through, own rows included.
    pub fn disabled(current_user_id: impl Into<UserId>) -> Self {
        Self {
            enabled: false,
            ..Self::new(current_user_id)
        }
    }

    pub fn decide(&self, row: &Message, store: &MessageStore) -> PushDecision {
        if !self.enabled || row.sender_id != self.current_user_id {
            return PushDecision::Merge;
        }

        let represented = store.contains(&row.id)
            || row
                .client_id
                .as_deref()
                .is_some_and(|client_id| store.contains(client_id));

        if represented {
            PushDecision::DiscardOwn
        } else {
            PushDecision::Merge
        }
    }
}

/// Counts describing what happened to a batch of pushed rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    /// Rows inserted as new messages
    pub merged: usize,
    /// Rows that confirmed an optimistic entry
    pub reconciled: usize,
    /// Rows already present
    pub duplicates: usize,
    /// Rows dropped by the sender filter
    pub discarded_own: usize,
    /// Rows for another conversation
    pub rejected: usize,
}

impl ReconcileResult {
    /// Whether the store changed.
    pub fn changed(&self) -> bool {
        self.merged > 0 || self.reconciled > 0
    }

    fn record(&mut self, outcome: &crate::error::Result<MergeOutcome>) {
        match outcome {
            Ok(MergeOutcome::Inserted { .. }) => self.merged += 1,
            Ok(MergeOutcome::Reconciled { .. }) => self.reconciled += 1,
            Ok(MergeOutcome::Duplicate) => self.duplicates += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Apply pushed rows to the store through the sender filter.
pub fn apply_pushes(
    store: &mut MessageStore,
    filter: &PushFilter,
    rows: impl IntoIterator<Item = Message>,
) -> ReconcileResult {
    let mut result = ReconcileResult::default();
    for row in rows {
        match filter.decide(&row, store) {
            PushDecision::DiscardOwn => result.discarded_own += 1,
            PushDecision::Merge => {
                let outcome = store.merge_remote(row);
                result.record(&outcome);
            }
        }
    }
    result
}

/// Bounded FIFO of rows pushed before the initial load completed.
///
/// When full the oldest row is dropped; the next full reload recovers it.
#[derive(Debug, Clone)]
pub struct EarlyPushQueue {
    rows: VecDeque<Message>,
    capacity: usize,
    dropped: usize,
}

impl Default for EarlyPushQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EARLY_PUSH_CAPACITY)
    }
}

impl EarlyPushQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Queue a row. Returns false if an older row had to be dropped.
    pub fn push(&mut self, row: Message) -> bool {
        if self.capacity == 0 {
            self.dropped += 1;
            return false;
        }
        let mut kept_all = true;
        if self.rows.len() >= self.capacity {
            self.rows.pop_front();
            self.dropped += 1;
            kept_all = false;
        }
        self.rows.push_back(row);
        kept_all
    }

    /// Take every queued row in arrival order.
    pub fn drain(&mut self) -> Vec<Message> {
        self.rows.drain(..).collect()
    }

    /// Number of rows dropped because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.dropped = 0;
    }
}

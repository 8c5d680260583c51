//! Conversation synchronization.
//!
//! The [`SyncController`] owns the message store of the active conversation
//! and keeps it in step with the remote store: initial load, optimistic
//! sends, push merging and teardown.

mod controller;
mod session;

pub use controller::SyncController;

use chatsync_engine::{DEFAULT_EARLY_PUSH_CAPACITY, DEFAULT_MAX_CONTENT_LEN};

/// Tunables for a [`SyncController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Longest accepted message, in characters
    pub max_content_len: usize,
    /// Rows kept while the initial load is in flight
    pub early_push_capacity: usize,
    /// Drop pushed rows sent by the current user
    pub filter_own_pushes: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
            early_push_capacity: DEFAULT_EARLY_PUSH_CAPACITY,
            filter_own_pushes: true,
        }
    }
}

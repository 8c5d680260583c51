//! # Chatsync Engine
//!
//! The deterministic core of realtime chat synchronization.
//!
//! This crate holds the ordered, de-duplicated message list of a single
//! conversation and the rules for merging optimistic local entries with rows
//! confirmed by the server or pushed over a subscription.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine knows nothing about networks or subscriptions
//! - **Deterministic**: the same sequence of calls always yields the same list
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Messages
//!
//! A [`Message`] is either *confirmed* (carries a server id) or *optimistic*
//! (`local_only`, carries a temporary id generated by the client at send time).
//!
//! ### Message Store
//!
//! The [`MessageStore`] keeps messages sorted by `created_at`, ties broken by
//! insertion order, and never holds two entries with the same id:
//! - [`MessageStore::initialize`] - replace everything with a full load
//! - [`MessageStore::append_optimistic`] - show a message before the server has it
//! - [`MessageStore::reconcile_sent`] - swap the optimistic entry for the confirmed row
//! - [`MessageStore::remove_optimistic`] - roll back a failed send
//! - [`MessageStore::merge_remote`] - idempotently insert a pushed row
//!
//! ### Push Reconciliation
//!
//! The [`PushFilter`] drops rows the current user sent when they are already
//! on screen, as optimistic entries or loaded rows, and the [`EarlyPushQueue`]
//! holds rows pushed before the initial load completed.
//!
//! ## Quick Start
//!
//! ```rust
//! use chatsync_engine::{Message, MessageStore, MergeOutcome};
//!
//! let mut store = MessageStore::new("conv-1");
//! store.initialize(vec![
//!     Message::confirmed("1", "conv-1", "bob", "hello", 10),
//!     Message::confirmed("2", "conv-1", "alice", "hi bob", 20),
//! ]);
//!
//! // A pushed duplicate is ignored
//! let outcome = store
//!     .merge_remote(Message::confirmed("2", "conv-1", "alice", "hi bob", 20))
//!     .unwrap();
//! assert_eq!(outcome, MergeOutcome::Duplicate);
//!
//! // Optimistic send, then rollback
//! let temp_id = store.append_optimistic(Message::optimistic("tmp-1", "conv-1", "alice", "hi", 30));
//! assert_eq!(store.len(), 3);
//! store.remove_optimistic(&temp_id);
//! assert_eq!(store.len(), 2);
//! ```

pub mod error;
pub mod message;
pub mod reconcile;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use error::Error;
pub use message::{validate_content, ConversationBinding, Message, MessageFilter, NewMessage};
pub use reconcile::{
    apply_pushes, EarlyPushQueue, PushDecision, PushFilter, ReconcileResult,
    DEFAULT_EARLY_PUSH_CAPACITY,
};
pub use snapshot::{
    ConversationSnapshot, ErrorKind, SyncState, ViewError, SNAPSHOT_FORMAT_VERSION,
};
pub use store::{MergeOutcome, MessageStore, ReconcileOutcome};

/// Type aliases for clarity
pub type MessageId = String;
pub type ConversationId = String;
pub type UserId = String;
pub type Timestamp = u64;

/// Prefix of client-generated temporary message ids.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Default upper bound on message content length, in characters.
pub const DEFAULT_MAX_CONTENT_LEN: usize = 4000;

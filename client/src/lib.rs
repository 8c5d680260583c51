//! Chatsync Client - realtime conversation sync over a remote row store.
//!
//! The [`SyncController`] loads a conversation, attaches a push
//! subscription, sends messages optimistically and reconciles them with the
//! rows the server stores, using the `chatsync-engine` message store.
//! The remote store is reached through the [`RemoteStore`] trait.

pub mod config;
pub mod error;
pub mod remote;
pub mod sync;

pub use config::{Config, ConfigError};
pub use error::{RemoteError, SyncError};
pub use remote::{InsertAck, MemoryRemote, RemoteStore, Subscription, SubscriptionId};
pub use sync::{SyncController, SyncOptions};

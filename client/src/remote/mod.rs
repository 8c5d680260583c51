//! The remote store seam.
//!
//! The hosted database is an external collaborator reached through the
//! [`RemoteStore`] trait: row queries, inserts and an insert-event
//! subscription. [`MemoryRemote`] is an in-process implementation used by
//! the tests and the demo binary.

mod memory;

pub use memory::MemoryRemote;

use async_trait::async_trait;
use chatsync_engine::{Message, MessageFilter, NewMessage};
use futures::stream::BoxStream;

use crate::error::RemoteError;

/// Identifier of an open subscription.
pub type SubscriptionId = String;

/// Acknowledgement of an insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsertAck {
    /// The stored row with its server-assigned id, when the store echoes it
    pub row: Option<Message>,
}

/// An open insert-event subscription.
///
/// Emission is at-least-once with no ordering guarantee and may include rows
/// the subscriber inserted itself. The stream ends when the channel drops;
/// close it with [`RemoteStore::unsubscribe`].
pub struct Subscription {
    pub id: SubscriptionId,
    pub rows: BoxStream<'static, Message>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Row store for the `messages` table.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// All rows matching `filter`, ordered by `created_at` ascending.
    async fn query(&self, filter: &MessageFilter) -> Result<Vec<Message>, RemoteError>;

    /// Insert a row.
    async fn insert(&self, row: NewMessage) -> Result<InsertAck, RemoteError>;

    /// Subscribe to rows inserted under `filter`.
    async fn subscribe(&self, filter: &MessageFilter) -> Result<Subscription, RemoteError>;

    /// Close a subscription. Closing an unknown id is not an error.
    async fn unsubscribe(&self, id: &str) -> Result<(), RemoteError>;
}

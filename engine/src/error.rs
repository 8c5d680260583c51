//! Error types for the chatsync engine.

use crate::ConversationId;
use thiserror::Error;

/// All possible errors from the chatsync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("message content is blank")]
    BlankContent,

    #[error("message content too long: {len} chars (max {max})")]
    ContentTooLong { len: usize, max: usize },

    // Merge errors
    #[error("conversation mismatch: expected {expected}, got {actual}")]
    ConversationMismatch {
        expected: ConversationId,
        actual: ConversationId,
    },

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

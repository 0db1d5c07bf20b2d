use thiserror::Error;

use huddle_shared::{ChatId, MessageId};

/// Errors produced by the store reducers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The action referenced a chat that is not in the directory.
    #[error("Chat not found: {0}")]
    ChatNotFound(ChatId),

    /// A message with blank content and no attachment.
    #[error("Message {0} has neither content nor attachment")]
    InvalidMessage(MessageId),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

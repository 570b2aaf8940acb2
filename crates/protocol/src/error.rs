//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding an inbound message.
///
/// None of these are fatal: the message is dropped and the connection stays open.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Binary frames are not supported")]
    BinaryFrame,

    #[error("Empty chat message")]
    EmptyChat,
}

//! Client -> Server message parsing.

use crate::ProtocolError;
use serde::Deserialize;
use serde_json::Number;

/// Parsed client message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// New movement target in world coordinates.
    Move { x: f64, y: f64 },
    /// Latency check; the timestamp is echoed back untouched.
    Ping { timestamp: Number },
    /// Chat line broadcast to every connection.
    Chat { message: String },
    /// Room hint from the lobby. Room assignment happens upstream.
    JoinRoom { room_id: String },
}

impl ClientMessage {
    /// Parse a client message from a text frame.
    ///
    /// Unknown `type` values and missing or mistyped fields are all reported as
    /// [`ProtocolError::Malformed`].
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let message: ClientMessage = serde_json::from_str(text)?;
        match message {
            ClientMessage::Chat { message } => {
                let trimmed = message.trim();
                if trimmed.is_empty() {
                    return Err(ProtocolError::EmptyChat);
                }
                Ok(ClientMessage::Chat {
                    message: trimmed.to_string(),
                })
            }
            other => Ok(other),
        }
    }
}

//! Shared protocol crate for the arena server.
//!
//! This crate contains:
//! - Inbound and outbound message definitions (JSON, tagged by `type`)
//! - View structs carried inside snapshots
//! - Shared types (Color, timestamps)

mod error;
pub mod messages;

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use error::ProtocolError;
pub use messages::{
    ClientMessage, CoinView, LeaderboardEntry, PlayerView, ServerMessage, VirusView, WorldView,
};

/// RGB color used for players and pickups.
///
/// Serialized as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Milliseconds since the Unix epoch, as stamped on every outbound message.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

//! Client session state.

use axum::extract::ws::Utf8Bytes;
use protocol::ServerMessage;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a connection may have queued before it counts as backlogged.
pub const OUTBOUND_QUEUE: usize = 64;

/// Frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialized message. Broadcasts serialize once and share the buffer.
    Text(Utf8Bytes),
    /// Transport-level liveness ping.
    Ping,
    /// Close the socket and stop the connection task.
    Close,
}

/// A connected client session.
#[derive(Debug)]
pub struct Client {
    /// Unique client ID.
    pub id: u32,
    /// Remote address.
    pub addr: SocketAddr,
    /// Id of the player this connection controls (from the token).
    pub player_id: String,
    pub player_name: String,
    /// Cleared by each heartbeat sweep, set again by a pong.
    pub is_alive: bool,
    pub connected_at: Instant,
    tx: mpsc::Sender<Outbound>,
    /// Set when the queue overflowed. The next heartbeat sweep reaps the client.
    backlogged: AtomicBool,
}

impl Client {
    /// Create a new client session.
    pub fn new(
        id: u32,
        addr: SocketAddr,
        player_id: String,
        player_name: String,
        tx: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id,
            addr,
            player_id,
            player_name,
            is_alive: true,
            connected_at: Instant::now(),
            tx,
            backlogged: AtomicBool::new(false),
        }
    }

    /// Queue a frame without waiting.
    ///
    /// Returns false if the frame was dropped, either because the connection
    /// task is gone or because its queue is full. A full queue marks the client
    /// backlogged.
    pub fn send(&self, frame: Outbound) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.backlogged.store(true, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Whether a frame has been dropped because the client stopped reading.
    pub fn is_backlogged(&self) -> bool {
        self.backlogged.load(Ordering::Relaxed)
    }

    /// Serialize and queue a message for this client only.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        self.send(Outbound::Text(message.to_json().into()))
    }
}

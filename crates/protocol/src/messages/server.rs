//! Server -> Client message building.

use crate::Color;
use serde::Serialize;
use serde_json::Number;

/// A player as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub target_x: f64,
    pub target_y: f64,
    pub mass: f64,
    pub radius: f64,
    pub color: Color,
    pub score: f64,
}

/// A coin pickup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinView {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub value: f64,
    pub color: Color,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// A virus hazard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirusView {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: Color,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Full world state carried by `init`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldView {
    pub players: Vec<PlayerView>,
    pub coins: Vec<CoinView>,
    pub viruses: Vec<VirusView>,
    pub world_size: f64,
}

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub score: f64,
}

/// Outbound message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent once to a freshly admitted connection.
    Init {
        player: PlayerView,
        game_state: WorldView,
        timestamp: u64,
    },
    /// Greeting sent to a freshly admitted connection after `init`.
    Welcome {
        message: String,
        player_count: usize,
        timestamp: u64,
    },
    /// Broadcast to everyone else when a player joins.
    PlayerJoined { player: PlayerView, timestamp: u64 },
    /// Broadcast when a player's connection goes away.
    PlayerLeft {
        player_id: String,
        player_name: String,
        timestamp: u64,
    },
    /// Reply to `ping`.
    Pong {
        timestamp: u64,
        client_timestamp: Number,
    },
    /// Chat line, echoed to the sender too.
    Chat {
        player_id: String,
        player_name: String,
        message: String,
        timestamp: u64,
    },
    /// Periodic snapshot.
    GameUpdate {
        players: Vec<PlayerView>,
        leaderboard: Vec<LeaderboardEntry>,
        coins: Vec<CoinView>,
        viruses: Vec<VirusView>,
        timestamp: u64,
    },
}

impl ServerMessage {
    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> String {
        // serde_json only fails on non-string map keys, which none of these types have.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn sample_player() -> PlayerView {
        PlayerView {
            id: "u1".to_string(),
            name: "Ann".to_string(),
            x: 10.0,
            y: 20.0,
            target_x: 10.0,
            target_y: 20.0,
            mass: 100.0,
            radius: 40.0,
            color: Color::new(255, 0, 0),
            score: 0.0,
        }
    }

    #[test]
    fn test_player_left_shape() {
        let msg = ServerMessage::PlayerLeft {
            player_id: "u1".to_string(),
            player_name: "Ann".to_string(),
            timestamp: 5,
        };
        let value: Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(
            value,
            json!({"type": "player_left", "playerId": "u1", "playerName": "Ann", "timestamp": 5})
        );
    }

    #[test]
    fn test_init_shape() {
        let msg = ServerMessage::Init {
            player: sample_player(),
            game_state: WorldView {
                players: vec![sample_player()],
                coins: vec![],
                viruses: vec![],
                world_size: 4000.0,
            },
            timestamp: 1,
        };
        let value: Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["player"]["targetX"], 10.0);
        assert_eq!(value["player"]["color"], "#ff0000");
        assert_eq!(value["gameState"]["worldSize"], 4000.0);
    }

    #[test]
    fn test_pong_echoes_client_timestamp() {
        let msg = ServerMessage::Pong {
            timestamp: 9,
            client_timestamp: Number::from(1700000000123u64),
        };
        assert_eq!(
            msg.to_json(),
            r#"{"type":"pong","timestamp":9,"clientTimestamp":1700000000123}"#
        );
    }
}

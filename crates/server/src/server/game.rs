//! Game state and main loops.

use super::client::{Client, Outbound};
use crate::auth::Identity;
use crate::config::Config;
use crate::physics::{self, TickReport};
use crate::world::World;
use axum::extract::ws::Utf8Bytes;
use futures_util::FutureExt;
use protocol::{ClientMessage, ProtocolError, ServerMessage, now_millis};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Name used when a token carries a blank one.
const DEFAULT_NAME: &str = "Player";

/// Longest frame the physics step integrates in one go.
const MAX_FRAME_SECS: f64 = 0.25;

/// Ticks between timing summaries in the debug log.
const STATS_INTERVAL_TICKS: u64 = 600;

/// `game_update` frames buffered per connection. A slower reader skips ahead
/// to the newest ones.
pub const SNAPSHOT_BACKLOG: usize = 5;

/// Main game state: the world plus every open connection.
///
/// Lives behind a single `RwLock`. The physics loop and the connection handlers
/// both take the write lock, which serializes every mutation of the world.
pub struct GameState {
    pub config: Config,
    pub tick_count: u64,
    pub start_time: std::time::Instant,

    next_client_id: u32,

    // Connected clients
    pub clients: HashMap<u32, Client>,

    pub world: World,

    snapshot_tx: broadcast::Sender<Utf8Bytes>,

    /// Average tick duration in milliseconds (exponential moving average).
    pub update_time_avg: f64,
}

impl GameState {
    /// Create the game state with a fully populated world.
    pub fn new(config: &Config) -> Self {
        let mut world = World::new(config);
        world.populate();
        let counts = world.counts();
        info!(
            "World initialized: {} coins, {} viruses, size {}",
            counts.coins, counts.viruses, config.world.size
        );

        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_BACKLOG);

        Self {
            config: config.clone(),
            tick_count: 0,
            start_time: std::time::Instant::now(),
            next_client_id: 1,
            clients: HashMap::new(),
            world,
            snapshot_tx,
            update_time_avg: 0.0,
        }
    }

    /// Whether the connection cap has been reached.
    pub fn at_capacity(&self) -> bool {
        self.clients.len() >= self.config.server.max_connections
    }

    /// Whether a connection for `player_id` may join. Under the cap anyone may,
    /// at the cap only a reconnect that replaces its own session.
    pub fn admits(&self, player_id: &str) -> bool {
        !self.at_capacity() || self.clients.values().any(|c| c.player_id == player_id)
    }

    /// Register a verified connection and spawn its player.
    ///
    /// Sends `init` and `welcome` to the new connection and `player_joined` to
    /// everyone else. An open connection already controlling the same player is
    /// closed without a `player_left`.
    ///
    /// Returns `None` and changes nothing if the connection cap is reached. The
    /// handshake checks the cap too, but only under a read lock, so concurrent
    /// upgrades are settled here.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        identity: &Identity,
        tx: mpsc::Sender<Outbound>,
    ) -> Option<u32> {
        if !self.admits(&identity.id) {
            warn!(
                "Refusing player {} from {}: {} connections open",
                identity.id,
                addr,
                self.clients.len()
            );
            return None;
        }

        let name = sanitize_name(&identity.name, self.config.player.max_name_length);

        let superseded: Vec<u32> = self
            .clients
            .values()
            .filter(|c| c.player_id == identity.id)
            .map(|c| c.id)
            .collect();
        for old_id in superseded {
            if let Some(old) = self.clients.remove(&old_id) {
                info!(
                    "Client {} superseded by a new connection for player {}",
                    old_id, identity.id
                );
                old.send(Outbound::Close);
            }
        }

        let id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1).max(1);

        let player = self.world.add_player(&identity.id, &name).view();
        let timestamp = now_millis();
        let client = Client::new(id, addr, identity.id.clone(), name, tx);
        client.send_message(&ServerMessage::Init {
            player: player.clone(),
            game_state: self.world.snapshot(),
            timestamp,
        });
        info!(
            "Client {} connected from {} as player {} ({})",
            id, addr, client.player_id, client.player_name
        );
        self.clients.insert(id, client);

        self.broadcast_except(id, &ServerMessage::PlayerJoined { player, timestamp });

        let welcome = ServerMessage::Welcome {
            message: self.config.server.welcome_message.clone(),
            player_count: self.clients.len(),
            timestamp,
        };
        if let Some(client) = self.clients.get(&id) {
            client.send_message(&welcome);
        }
        Some(id)
    }

    /// Remove a client and its player, announcing `player_left` to the rest.
    ///
    /// Returns false if the client was already gone, in which case nothing is sent.
    pub fn remove_client(&mut self, id: u32) -> bool {
        let Some(client) = self.clients.remove(&id) else {
            return false;
        };
        info!(
            "Client {} ({}) disconnected after {:?}",
            id,
            client.addr,
            client.connected_at.elapsed()
        );

        self.world.remove_player(&client.player_id);
        self.broadcast(&ServerMessage::PlayerLeft {
            player_id: client.player_id,
            player_name: client.player_name,
            timestamp: now_millis(),
        });
        true
    }

    /// Handle a text frame from a client.
    pub fn handle_message(&mut self, client_id: u32, text: &str) -> Result<(), ProtocolError> {
        let message = ClientMessage::parse(text)?;
        let Some(client) = self.clients.get(&client_id) else {
            return Ok(());
        };

        match message {
            ClientMessage::Move { x, y } => {
                self.world.update_target(&client.player_id, x, y);
            }
            ClientMessage::Ping { timestamp } => {
                client.send_message(&ServerMessage::Pong {
                    timestamp: now_millis(),
                    client_timestamp: timestamp,
                });
            }
            ClientMessage::Chat { message } => {
                let message = truncate_chars(&message, self.config.server.max_chat_length);
                debug!("[Chat] {}: {}", client.player_name, message);
                let chat = ServerMessage::Chat {
                    player_id: client.player_id.clone(),
                    player_name: client.player_name.clone(),
                    message,
                    timestamp: now_millis(),
                };
                self.broadcast(&chat);
            }
            ClientMessage::JoinRoom { room_id } => {
                debug!("Client {} asked for room {}", client_id, room_id);
            }
        }
        Ok(())
    }

    /// Record a pong from a client.
    pub fn mark_alive(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.is_alive = true;
        }
    }

    /// Run one liveness sweep and return the ids of terminated clients.
    ///
    /// A client that has not answered since the previous sweep, or whose
    /// outbound queue overflowed, is closed and removed. Every other client is
    /// marked pending and pinged.
    pub fn heartbeat_sweep(&mut self) -> Vec<u32> {
        let mut stale = Vec::new();
        for client in self.clients.values_mut() {
            if client.is_backlogged() {
                stale.push(client.id);
            } else if client.is_alive {
                client.is_alive = false;
                client.send(Outbound::Ping);
            } else {
                stale.push(client.id);
            }
        }
        stale.sort_unstable();

        for &id in &stale {
            if let Some(client) = self.clients.get(&id) {
                if client.is_backlogged() {
                    warn!("Client {} ({}) stopped reading, terminating", id, client.addr);
                } else {
                    warn!("Client {} ({}) missed heartbeat, terminating", id, client.addr);
                }
                client.send(Outbound::Close);
            }
            self.remove_client(id);
        }
        stale
    }

    /// Run a single physics tick.
    pub fn tick(&mut self, delta_time: f64) -> TickReport {
        self.tick_count += 1;
        let tick_rate = f64::from(self.config.server.tick_rate_hz);
        let report = physics::step(&mut self.world, delta_time, tick_rate);
        for absorption in &report.events.absorptions {
            info!(
                "Player {} absorbed {} (+{:.1} mass)",
                absorption.eater, absorption.victim, absorption.mass_gained
            );
        }
        report
    }

    /// Build the periodic `game_update` snapshot.
    pub fn prepare_game_update(&self) -> ServerMessage {
        let snapshot = self.world.snapshot();
        ServerMessage::GameUpdate {
            players: snapshot.players,
            leaderboard: self.world.leaderboard(self.config.server.leaderboard_size),
            coins: snapshot.coins,
            viruses: snapshot.viruses,
            timestamp: now_millis(),
        }
    }

    /// Receiver for the periodic `game_update` frames.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<Utf8Bytes> {
        self.snapshot_tx.subscribe()
    }

    /// Serialize one `game_update` and hand it to every subscribed connection.
    ///
    /// Returns the number of receivers it reached.
    pub fn publish_game_update(&self) -> usize {
        let text: Utf8Bytes = self.prepare_game_update().to_json().into();
        self.snapshot_tx.send(text).unwrap_or(0)
    }

    /// Send a message to every client.
    pub fn broadcast(&self, message: &ServerMessage) {
        let text: Utf8Bytes = message.to_json().into();
        for client in self.clients.values() {
            client.send(Outbound::Text(text.clone()));
        }
    }

    /// Send a message to every client except `skip`.
    pub fn broadcast_except(&self, skip: u32, message: &ServerMessage) {
        let text: Utf8Bytes = message.to_json().into();
        for client in self.clients.values().filter(|c| c.id != skip) {
            client.send(Outbound::Text(text.clone()));
        }
    }
}

/// Trim a display name and cap its length. Blank names become [`DEFAULT_NAME`].
fn sanitize_name(input: &str, max_len: usize) -> String {
    let name = truncate_chars(input.trim(), max_len);
    let name = name.trim_end();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

fn period_for(rate_hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)))
}

/// Run the physics loop. Never returns; a panic here ends the task.
pub async fn run_game_loop(state: Arc<RwLock<GameState>>, tick_rate_hz: u32) {
    let period = period_for(tick_rate_hz);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let budget_ms = period.as_secs_f64() * 1000.0 * 0.9;
    let mut last_tick = Instant::now();

    loop {
        let scheduled = ticker.tick().await;

        // Drain any backlog so the step below covers the real elapsed time once.
        let mut skipped = 0u32;
        while ticker.tick().now_or_never().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(
                "Skipped {} ticks to stay current (lag: {:?})",
                skipped,
                Instant::now().saturating_duration_since(scheduled)
            );
        }

        let now = Instant::now();
        let delta_time = now
            .saturating_duration_since(last_tick)
            .as_secs_f64()
            .min(MAX_FRAME_SECS);
        last_tick = now;

        let mut game = state.write().await;
        let tick_start = std::time::Instant::now();
        game.tick(delta_time);
        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;

        game.update_time_avg = game.update_time_avg * 0.5 + tick_ms * 0.5;

        if tick_ms > budget_ms {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} players",
                game.tick_count,
                tick_ms,
                budget_ms,
                game.world.players.len()
            );
        }
        if game.tick_count % STATS_INTERVAL_TICKS == 0 {
            let counts = game.world.counts();
            debug!(
                "Tick #{}: avg {:.3}ms, {} clients, {}/{} players alive, {} coins, {} viruses",
                game.tick_count,
                game.update_time_avg,
                game.clients.len(),
                counts.alive,
                counts.players,
                counts.coins,
                counts.viruses
            );
        }
    }
}

/// Broadcast `game_update` to every connection at a fixed rate.
pub async fn run_snapshot_loop(state: Arc<RwLock<GameState>>, snapshot_rate_hz: u32) {
    let period = period_for(snapshot_rate_hz);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let game = state.read().await;
        if game.clients.is_empty() {
            continue;
        }
        game.publish_game_update();
    }
}

/// Ping every connection and reap the ones that stopped answering.
pub async fn run_heartbeat_loop(state: Arc<RwLock<GameState>>, interval: Duration) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = state.write().await.heartbeat_sweep();
        if !removed.is_empty() {
            info!("Heartbeat sweep terminated {} clients", removed.len());
        }
    }
}

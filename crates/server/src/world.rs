//! World state management.
//!
//! The single authoritative aggregate of players, coins and viruses.
//! Transport-agnostic: it is mutated by the physics tick and by the connection
//! hub's message handlers, both of which hold the game state write lock.

use crate::config::{CoinConfig, Config, PlayerConfig, VirusConfig};
use crate::entity::{Coin, Player, Virus};
use glam::DVec2;
use protocol::{Color, LeaderboardEntry, PlayerView, WorldView};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// World border bounds: the square `[0, size] x [0, size]`.
#[derive(Debug, Clone, Copy)]
pub struct WorldBorder {
    pub size: f64,
}

impl WorldBorder {
    pub fn new(size: f64) -> Self {
        Self { size }
    }

    /// Clamp a point into the world.
    #[inline]
    pub fn clamp(&self, point: DVec2) -> DVec2 {
        point.clamp(DVec2::ZERO, DVec2::splat(self.size))
    }

    /// Get a random position within the border.
    #[inline]
    pub fn random_position(&self) -> DVec2 {
        let mut rng = rand::rng();
        DVec2::new(
            rng.random_range(0.0..=self.size),
            rng.random_range(0.0..=self.size),
        )
    }
}

/// The game world.
#[derive(Debug)]
pub struct World {
    /// Next coin/virus ID to assign.
    next_entity_id: u32,

    /// Players ordered by id, which fixes the per-tick processing order.
    pub players: BTreeMap<String, Player>,
    pub coins: HashMap<u32, Coin>,
    pub viruses: HashMap<u32, Virus>,

    pub border: WorldBorder,

    player_rules: PlayerConfig,
    coin_rules: CoinConfig,
    virus_rules: VirusConfig,
}

impl World {
    /// Create an empty world. Call [`World::populate`] to spawn the pickups.
    pub fn new(config: &Config) -> Self {
        Self {
            next_entity_id: 1,
            players: BTreeMap::new(),
            coins: HashMap::with_capacity(config.coin.max_amount),
            viruses: HashMap::with_capacity(config.virus.max_amount),
            border: WorldBorder::new(config.world.size),
            player_rules: config.player.clone(),
            coin_rules: config.coin.clone(),
            virus_rules: config.virus.clone(),
        }
    }

    /// Get the next coin/virus ID.
    fn next_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1).max(1);
        id
    }

    pub fn player_rules(&self) -> &PlayerConfig {
        &self.player_rules
    }

    /// Spawn coins and viruses up to their configured counts.
    pub fn populate(&mut self) {
        while self.coins.len() < self.coin_rules.max_amount {
            self.spawn_coin();
        }
        while self.viruses.len() < self.virus_rules.max_amount {
            self.spawn_virus();
        }
    }

    /// Generate a random color.
    #[inline]
    pub fn random_color() -> Color {
        let mut rng = rand::rng();
        Color::new(
            rng.random_range(50..=255),
            rng.random_range(50..=255),
            rng.random_range(50..=255),
        )
    }

    /// Add a player at a random position. An existing player with the same id is replaced.
    pub fn add_player(&mut self, id: &str, name: &str) -> &Player {
        let position = self.border.random_position();
        self.insert_player(id, name, position)
    }

    /// Add a player at a known position.
    pub fn insert_player(&mut self, id: &str, name: &str, position: DVec2) -> &Player {
        let player = Player::new(
            id.to_string(),
            name.to_string(),
            self.border.clamp(position),
            self.player_rules.start_mass,
            self.player_rules.base_speed,
            Self::random_color(),
        );
        self.players.insert(id.to_string(), player);
        &self.players[id]
    }

    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        self.players.remove(id)
    }

    /// Set a player's movement target, clamped into the world.
    ///
    /// Returns false (and does nothing) when the player is missing or not alive.
    pub fn update_target(&mut self, id: &str, x: f64, y: f64) -> bool {
        let border = self.border;
        match self.players.get_mut(id) {
            Some(player) if player.alive => {
                // NaN cannot arrive through JSON, but keep the target finite regardless.
                let target = DVec2::new(x, y);
                if !target.is_finite() {
                    return false;
                }
                player.target = border.clamp(target);
                player.last_update = protocol::now_millis();
                true
            }
            _ => false,
        }
    }

    /// Spawn a coin at a random position.
    pub fn spawn_coin(&mut self) -> u32 {
        let position = self.border.random_position();
        self.insert_coin(position)
    }

    /// Add a coin at a known position.
    pub fn insert_coin(&mut self, position: DVec2) -> u32 {
        let id = self.next_id();
        let coin = Coin::new(
            id,
            self.border.clamp(position),
            self.coin_rules.radius,
            self.coin_rules.value,
        );
        self.coins.insert(id, coin);
        id
    }

    /// Spawn a virus with a random radius at a random position.
    pub fn spawn_virus(&mut self) -> u32 {
        let position = self.border.random_position();
        let (min, max) = (self.virus_rules.min_radius, self.virus_rules.max_radius);
        let radius = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        self.insert_virus(position, radius)
    }

    /// Add a virus at a known position.
    pub fn insert_virus(&mut self, position: DVec2, radius: f64) -> u32 {
        let id = self.next_id();
        self.viruses
            .insert(id, Virus::new(id, self.border.clamp(position), radius));
        id
    }

    /// Remove a coin and spawn its replacement.
    pub fn replace_coin(&mut self, id: u32) -> Option<Coin> {
        let coin = self.coins.remove(&id)?;
        self.spawn_coin();
        Some(coin)
    }

    /// Remove a virus and spawn its replacement.
    pub fn replace_virus(&mut self, id: u32) -> Option<Virus> {
        let virus = self.viruses.remove(&id)?;
        self.spawn_virus();
        Some(virus)
    }

    /// Iterate over players still in play.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.alive)
    }

    pub fn alive_player_views(&self) -> Vec<PlayerView> {
        self.alive_players().map(Player::view).collect()
    }

    /// Read-only view of the whole world.
    pub fn snapshot(&self) -> WorldView {
        WorldView {
            players: self.alive_player_views(),
            coins: self.coins.values().map(Coin::view).collect(),
            viruses: self.viruses.values().map(Virus::view).collect(),
            world_size: self.border.size,
        }
    }

    /// Alive players sorted by score, highest first. Ties fall back to id order.
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Player> = self.alive_players().collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
            .into_iter()
            .take(limit)
            .map(|p| LeaderboardEntry {
                id: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Get the count of each entity type.
    #[inline]
    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            players: self.players.len(),
            alive: self.alive_players().count(),
            coins: self.coins.len(),
            viruses: self.viruses.len(),
        }
    }
}

/// Entity count statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub players: usize,
    pub alive: usize,
    pub coins: usize,
    pub viruses: usize,
}

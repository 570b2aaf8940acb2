//! Server configuration.

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub coin: CoinConfig,
    #[serde(default)]
    pub virus: VirusConfig,
}

impl Config {
    /// Load configuration from `config.toml` (creating it with defaults if missing),
    /// then apply `PORT` and `JWT_SECRET` from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(Path::new("config.toml"))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", port))?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.server.jwt_secret = secret;
        }
        Ok(())
    }

    /// Reject settings the simulation cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.jwt_secret.is_empty() {
            bail!("no token signing secret configured (set JWT_SECRET)");
        }
        if self.world.size <= 0.0 {
            bail!("world.size must be positive");
        }
        if self.server.tick_rate_hz == 0 || self.server.snapshot_rate_hz == 0 {
            bail!("tick and snapshot rates must be non-zero");
        }
        if self.server.heartbeat_interval_secs == 0 {
            bail!("server.heartbeat_interval_secs must be non-zero");
        }
        if self.virus.min_radius > self.virus.max_radius {
            bail!("virus.min_radius must not exceed virus.max_radius");
        }
        if self.player.min_mass <= 0.0 || self.player.start_mass < self.player.min_mass {
            bail!("player masses must satisfy 0 < min_mass <= start_mass");
        }
        Ok(())
    }
}

/// Server networking and timing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum simultaneous connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Physics ticks per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: u32,
    /// Snapshot broadcasts per second.
    #[serde(default = "default_snapshot_rate")]
    pub snapshot_rate_hz: u32,
    /// Seconds between liveness sweeps.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Rows in the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    /// Chat lines are cut to this many characters.
    #[serde(default = "default_max_chat_length")]
    pub max_chat_length: usize,
    /// Text of the `welcome` message.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    /// HMAC secret for connection tokens. Usually supplied via `JWT_SECRET`.
    #[serde(default)]
    pub jwt_secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            tick_rate_hz: default_tick_rate(),
            snapshot_rate_hz: default_snapshot_rate(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            leaderboard_size: default_leaderboard_size(),
            max_chat_length: default_max_chat_length(),
            welcome_message: default_welcome_message(),
            jwt_secret: String::new(),
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    200
}
fn default_tick_rate() -> u32 {
    60
}
fn default_snapshot_rate() -> u32 {
    10
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_leaderboard_size() -> usize {
    10
}
fn default_max_chat_length() -> usize {
    200
}
fn default_welcome_message() -> String {
    "Welcome to the arena!".to_string()
}

/// World bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    /// Side length of the square world `[0, size] x [0, size]`.
    #[serde(default = "default_world_size")]
    pub size: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            size: default_world_size(),
        }
    }
}

fn default_world_size() -> f64 {
    4000.0
}

/// Player configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_start_mass")]
    pub start_mass: f64,
    /// Floor applied after a virus penalty.
    #[serde(default = "default_player_min_mass")]
    pub min_mass: f64,
    /// Distance per nominal tick at mass 100.
    #[serde(default = "default_player_speed")]
    pub base_speed: f64,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_mass: default_player_start_mass(),
            min_mass: default_player_min_mass(),
            base_speed: default_player_speed(),
            max_name_length: default_max_name_length(),
        }
    }
}

fn default_player_start_mass() -> f64 {
    100.0
}
fn default_player_min_mass() -> f64 {
    50.0
}
fn default_player_speed() -> f64 {
    5.0
}
fn default_max_name_length() -> usize {
    24
}

/// Coin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoinConfig {
    /// Live coin count, kept constant.
    #[serde(default = "default_coin_amount")]
    pub max_amount: usize,
    /// Mass and score granted on pickup.
    #[serde(default = "default_coin_value")]
    pub value: f64,
    #[serde(default = "default_coin_radius")]
    pub radius: f64,
}

impl Default for CoinConfig {
    fn default() -> Self {
        Self {
            max_amount: default_coin_amount(),
            value: default_coin_value(),
            radius: default_coin_radius(),
        }
    }
}

fn default_coin_amount() -> usize {
    500
}
fn default_coin_value() -> f64 {
    1.0
}
fn default_coin_radius() -> f64 {
    5.0
}

/// Virus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirusConfig {
    /// Live virus count, kept constant.
    #[serde(default = "default_virus_amount")]
    pub max_amount: usize,
    #[serde(default = "default_virus_min_radius")]
    pub min_radius: f64,
    #[serde(default = "default_virus_max_radius")]
    pub max_radius: f64,
}

impl Default for VirusConfig {
    fn default() -> Self {
        Self {
            max_amount: default_virus_amount(),
            min_radius: default_virus_min_radius(),
            max_radius: default_virus_max_radius(),
        }
    }
}

fn default_virus_amount() -> usize {
    15
}
fn default_virus_min_radius() -> f64 {
    50.0
}
fn default_virus_max_radius() -> f64 {
    80.0
}

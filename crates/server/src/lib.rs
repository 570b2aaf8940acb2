//! Authoritative arena game server library.

pub mod auth;
pub mod collision;
pub mod config;
pub mod entity;
pub mod physics;
pub mod server;
pub mod world;

// Re-export commonly used types
pub use auth::{AuthError, Identity, TokenGate};
pub use config::Config;
pub use server::{AppState, GameState, router, run, serve};
pub use world::World;

//! Game entities.
//!
//! Players, coins and viruses are all circles in world space.

mod coin;
mod player;
mod shape;
mod virus;

pub use coin::{COIN_COLOR, Coin};
pub use player::{Player, RADIUS_FACTOR, mass_to_radius};
pub use shape::Circle;
pub use virus::{VIRUS_COLOR, Virus};

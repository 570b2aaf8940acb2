//! Player entity.

use super::shape::Circle;
use glam::DVec2;
use protocol::{Color, PlayerView};

/// `radius = RADIUS_FACTOR * sqrt(mass)`.
pub const RADIUS_FACTOR: f64 = 4.0;

/// Speed is scaled by `REFERENCE_MASS / mass`.
const REFERENCE_MASS: f64 = 100.0;

/// Calculate radius from mass.
#[inline]
pub fn mass_to_radius(mass: f64) -> f64 {
    RADIUS_FACTOR * mass.sqrt()
}

/// A player-controlled blob.
///
/// Mass and radius are only changed together through [`Player::set_mass`].
#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub position: DVec2,
    pub target: DVec2,
    mass: f64,
    radius: f64,
    pub color: Color,
    pub score: f64,
    /// Distance per nominal tick at the reference mass.
    pub base_speed: f64,
    pub alive: bool,
    /// Milliseconds since the epoch of the last accepted move target.
    pub last_update: u64,
}

impl Player {
    /// Create a new player standing still at `position`.
    pub fn new(
        id: String,
        name: String,
        position: DVec2,
        mass: f64,
        base_speed: f64,
        color: Color,
    ) -> Self {
        Self {
            id,
            name,
            position,
            target: position,
            mass,
            radius: mass_to_radius(mass),
            color,
            score: 0.0,
            base_speed,
            alive: true,
            last_update: protocol::now_millis(),
        }
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Set the mass and recompute the radius.
    #[inline]
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        self.radius = mass_to_radius(mass);
    }

    /// Per-tick speed. Heavier players are slower, never below 1.
    #[inline]
    pub fn speed(&self) -> f64 {
        (self.base_speed * (REFERENCE_MASS / self.mass)).max(1.0)
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            target_x: self.target.x,
            target_y: self.target.y,
            mass: self.mass,
            radius: self.radius,
            color: self.color,
            score: self.score,
        }
    }
}

impl Circle for Player {
    fn position(&self) -> DVec2 {
        self.position
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(mass: f64) -> Player {
        Player::new(
            "p".to_string(),
            "P".to_string(),
            DVec2::ZERO,
            mass,
            5.0,
            Color::default(),
        )
    }

    #[test]
    fn test_radius_follows_mass() {
        let mut p = player(100.0);
        assert_eq!(p.radius(), 40.0);
        p.set_mass(225.0);
        assert_eq!(p.radius(), RADIUS_FACTOR * 15.0);
        assert_eq!(p.view().radius, p.radius());
    }

    #[test]
    fn test_speed_scales_inversely_with_mass() {
        assert_eq!(player(100.0).speed(), 5.0);
        assert_eq!(player(50.0).speed(), 10.0);
        assert_eq!(player(250.0).speed(), 2.0);
        // Clamped at 1 for very heavy players.
        assert_eq!(player(10_000.0).speed(), 1.0);
    }
}

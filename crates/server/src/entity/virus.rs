//! Virus hazard.

use super::shape::Circle;
use glam::DVec2;
use protocol::{Color, VirusView};

/// Default virus color (green).
pub const VIRUS_COLOR: Color = Color::new(51, 255, 51);

/// A virus that weakens small players and can be destroyed by large ones.
#[derive(Debug, Clone)]
pub struct Virus {
    pub id: u32,
    pub position: DVec2,
    pub radius: f64,
}

impl Virus {
    pub fn new(id: u32, position: DVec2, radius: f64) -> Self {
        Self {
            id,
            position,
            radius,
        }
    }

    /// Whether a player of `mass` is heavy enough to destroy this virus.
    #[inline]
    pub fn destroyed_by(&self, mass: f64) -> bool {
        mass > self.radius * 2.0
    }

    pub fn view(&self) -> VirusView {
        VirusView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            radius: self.radius,
            color: VIRUS_COLOR,
            kind: "virus",
        }
    }
}

impl Circle for Virus {
    fn position(&self) -> DVec2 {
        self.position
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

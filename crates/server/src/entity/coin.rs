//! Coin pickup.

use super::shape::Circle;
use glam::DVec2;
use protocol::{CoinView, Color};

/// Gold.
pub const COIN_COLOR: Color = Color::new(255, 215, 0);

/// A coin that grants mass and score when touched.
#[derive(Debug, Clone)]
pub struct Coin {
    pub id: u32,
    pub position: DVec2,
    pub radius: f64,
    pub value: f64,
}

impl Coin {
    pub fn new(id: u32, position: DVec2, radius: f64, value: f64) -> Self {
        Self {
            id,
            position,
            radius,
            value,
        }
    }

    pub fn view(&self) -> CoinView {
        CoinView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            radius: self.radius,
            value: self.value,
            color: COIN_COLOR,
            kind: "coin",
        }
    }
}

impl Circle for Coin {
    fn position(&self) -> DVec2 {
        self.position
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

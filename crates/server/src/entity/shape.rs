//! Common circle geometry.

use glam::DVec2;

/// Anything with a position and a collision radius.
pub trait Circle {
    fn position(&self) -> DVec2;

    fn radius(&self) -> f64;

    /// Circle-circle overlap: centre distance strictly less than the summed radii.
    #[inline]
    fn overlaps<C: Circle + ?Sized>(&self, other: &C) -> bool {
        self.position().distance(other.position()) < self.radius() + other.radius()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Disc(DVec2, f64);

    impl Circle for Disc {
        fn position(&self) -> DVec2 {
            self.0
        }
        fn radius(&self) -> f64 {
            self.1
        }
    }

    #[test]
    fn test_overlap() {
        let a = Disc(DVec2::new(0.0, 0.0), 50.0);
        assert!(a.overlaps(&Disc(DVec2::new(30.0, 0.0), 20.0)));
        assert!(!a.overlaps(&Disc(DVec2::new(100.0, 0.0), 10.0)));
        // Touching is not overlapping.
        assert!(!a.overlaps(&Disc(DVec2::new(60.0, 0.0), 10.0)));
    }
}

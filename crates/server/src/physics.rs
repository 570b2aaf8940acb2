//! Fixed-rate movement and collision pass.
//!
//! Never touches the network: the caller holds the game state lock for the
//! duration of [`step`] and fans results out afterwards.

use crate::collision::{self, CollisionEvents};
use crate::entity::Player;
use crate::world::{World, WorldBorder};

/// Players closer than this to their target stay put.
const ARRIVAL_DISTANCE: f64 = 1.0;

/// Result of one physics step.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Players that changed position.
    pub moved: usize,
    pub events: CollisionEvents,
}

/// Move one player toward its target.
///
/// `scale` is `delta_time * tick_rate`, i.e. 1.0 for a tick of nominal length.
/// The step never overshoots the target and the result is clamped into the world.
/// Returns true if the player moved.
pub fn move_player(player: &mut Player, border: WorldBorder, scale: f64) -> bool {
    let delta = player.target - player.position;
    let distance = delta.length();
    if distance <= ARRIVAL_DISTANCE {
        return false;
    }

    let step = (player.speed() * scale).min(distance);
    player.position = border.clamp(player.position + delta / distance * step);
    true
}

/// Advance the world by `delta_time` seconds.
///
/// Players are processed in ascending id order. Each alive player moves, then has
/// its collisions resolved before the next player is considered.
pub fn step(world: &mut World, delta_time: f64, tick_rate: f64) -> TickReport {
    let mut report = TickReport::default();
    let scale = delta_time * tick_rate;
    let border = world.border;

    let ids: Vec<String> = world.players.keys().cloned().collect();
    for id in ids {
        let Some(player) = world.players.get_mut(&id) else {
            continue;
        };
        if !player.alive {
            continue;
        }
        if move_player(player, border, scale) {
            report.moved += 1;
        }
        collision::resolve_player(world, &id, &mut report.events);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::{Circle, mass_to_radius};
    use glam::DVec2;

    const RATE: f64 = 60.0;
    const DT: f64 = 1.0 / RATE;

    fn empty_world() -> World {
        World::new(&Config::default())
    }

    fn place(world: &mut World, id: &str, x: f64, y: f64, mass: f64) {
        world.insert_player(id, id, DVec2::new(x, y));
        world.players.get_mut(id).unwrap().set_mass(mass);
    }

    #[test]
    fn test_converges_without_overshoot() {
        let mut world = empty_world();
        place(&mut world, "a", 100.0, 100.0, 100.0);
        world.update_target("a", 4000.0, 4000.0);
        let target = DVec2::new(4000.0, 4000.0);
        let max_step = world.players["a"].speed();

        let mut previous = world.players["a"].position;
        for _ in 0..2000 {
            step(&mut world, DT, RATE);
            let position = world.players["a"].position;
            assert!(position.distance(previous) <= max_step + 1e-9);
            assert!(position.x <= 4000.0 && position.y <= 4000.0);
            assert!(position.distance(target) <= previous.distance(target));
            previous = position;
        }
        assert!(previous.distance(target) <= 1.0);
    }

    #[test]
    fn test_heavier_moves_slower() {
        let mut world = empty_world();
        place(&mut world, "light", 100.0, 100.0, 100.0);
        place(&mut world, "heavy", 100.0, 3000.0, 400.0);
        world.update_target("light", 1000.0, 100.0);
        world.update_target("heavy", 1000.0, 3000.0);

        step(&mut world, DT, RATE);

        assert!((world.players["light"].position.x - 105.0).abs() < 1e-9);
        assert!((world.players["heavy"].position.x - 101.25).abs() < 1e-9);
    }

    #[test]
    fn test_long_frame_scales_step() {
        let mut world = empty_world();
        place(&mut world, "a", 100.0, 100.0, 100.0);
        world.update_target("a", 1000.0, 100.0);

        let report = step(&mut world, 2.0 * DT, RATE);

        assert_eq!(report.moved, 1);
        assert!((world.players["a"].position.x - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_positions_stay_in_bounds() {
        let mut world = empty_world();
        place(&mut world, "a", 3990.0, 5.0, 50.0);
        world.update_target("a", 1.0e9, -1.0e9);
        for _ in 0..10 {
            step(&mut world, DT, RATE);
        }
        let p = world.players["a"].position;
        assert!((0.0..=4000.0).contains(&p.x));
        assert!((0.0..=4000.0).contains(&p.y));
        assert!(p.distance(DVec2::new(4000.0, 0.0)) <= 1.0);
    }

    #[test]
    fn test_counts_hold_across_ticks() {
        let mut world = empty_world();
        world.populate();
        for i in 0..20 {
            let id = format!("p{:02}", i);
            world.add_player(&id, &id);
            world.update_target(&id, 2000.0, 2000.0);
        }
        for _ in 0..300 {
            step(&mut world, DT, RATE);
            assert_eq!(world.coins.len(), 500);
            assert_eq!(world.viruses.len(), 15);
            for p in world.players.values() {
                assert_eq!(p.radius(), mass_to_radius(p.mass()));
                assert!(p.mass() >= 50.0);
            }
        }
    }

    #[test]
    fn test_absorption_after_one_tick() {
        let mut world = empty_world();
        place(&mut world, "a", 1000.0, 1000.0, 300.0);
        place(&mut world, "b", 1020.0, 1000.0, 100.0);
        world.players.get_mut("a").unwrap().score = 8.0;
        world.players.get_mut("b").unwrap().score = 30.0;

        let report = step(&mut world, DT, RATE);

        assert_eq!(report.events.absorptions.len(), 1);
        assert!(!world.players["b"].alive);
        assert_eq!(world.players["a"].mass(), 300.0 + 100.0 * 0.8);
        assert_eq!(world.players["a"].score, 8.0 + 30.0 * 0.5);
        assert!(world.snapshot().players.iter().all(|p| p.id != "b"));
    }

    #[test]
    fn test_shared_victim_goes_to_lowest_id() {
        // "a" and "c" are both heavy enough to absorb "b" and both overlap it.
        let mut world = empty_world();
        place(&mut world, "c", 1040.0, 1000.0, 330.0);
        place(&mut world, "b", 1020.0, 1000.0, 100.0);
        place(&mut world, "a", 1000.0, 1000.0, 300.0);

        let report = step(&mut world, DT, RATE);

        let first = &report.events.absorptions[0];
        assert_eq!(first.eater, "a");
        assert_eq!(first.victim, "b");
        assert!(!world.players["b"].alive);
        assert!(report
            .events
            .absorptions
            .iter()
            .all(|abs| abs.victim != "b" || abs.eater == "a"));
        assert_eq!(world.players["a"].mass(), 380.0);
    }

    #[test]
    fn test_absorbed_player_does_not_act_later_in_tick() {
        // "a" absorbs "m" before "m" would get its turn to absorb "z".
        let mut world = empty_world();
        place(&mut world, "a", 1000.0, 1000.0, 1000.0);
        place(&mut world, "m", 1050.0, 1000.0, 300.0);
        place(&mut world, "z", 1100.0, 1000.0, 100.0);

        let report = step(&mut world, DT, RATE);

        assert!(!world.players["m"].alive);
        assert!(report.events.absorptions.iter().all(|abs| abs.eater != "m"));
    }
}

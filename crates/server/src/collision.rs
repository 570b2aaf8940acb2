//! Collision detection and resolution.
//!
//! Runs once per player per tick, in a fixed order:
//! - Coin pickups (grow, score, replace the coin)
//! - Virus contact (destroy it when heavy enough, otherwise lose mass)
//! - Absorbing smaller overlapping players
//!
//! Players are visited in ascending id order by the physics tick, and a player
//! absorbed earlier in the tick is neither processed nor absorbable again.

use crate::entity::Circle;
use crate::world::World;

/// Eater must be this many times heavier than the victim.
pub const ABSORB_MASS_RATIO: f64 = 1.2;
/// Share of the victim's mass the eater gains.
pub const ABSORB_MASS_SHARE: f64 = 0.8;
/// Share of the victim's score the eater gains.
pub const ABSORB_SCORE_SHARE: f64 = 0.5;
/// Score for destroying a virus.
pub const VIRUS_DESTROY_BONUS: f64 = 10.0;
/// Mass multiplier when bouncing off a virus.
pub const VIRUS_PENALTY: f64 = 0.8;

/// One player absorbing another.
#[derive(Debug, Clone, PartialEq)]
pub struct Absorption {
    pub eater: String,
    pub victim: String,
    pub mass_gained: f64,
    pub score_gained: f64,
}

/// Everything that happened during collision resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionEvents {
    /// Coin ids consumed (each already replaced).
    pub coins_eaten: Vec<u32>,
    /// Virus ids destroyed (each already replaced).
    pub viruses_destroyed: Vec<u32>,
    /// Virus ids that penalized a player and were left in place.
    pub virus_hits: Vec<u32>,
    pub absorptions: Vec<Absorption>,
}

impl CollisionEvents {
    pub fn is_empty(&self) -> bool {
        self.coins_eaten.is_empty()
            && self.viruses_destroyed.is_empty()
            && self.virus_hits.is_empty()
            && self.absorptions.is_empty()
    }
}

/// Resolve every interaction for one player.
pub fn resolve_player(world: &mut World, player_id: &str, events: &mut CollisionEvents) {
    if !world.players.get(player_id).is_some_and(|p| p.alive) {
        return;
    }
    resolve_coins(world, player_id, events);
    resolve_viruses(world, player_id, events);
    resolve_players(world, player_id, events);
}

fn resolve_coins(world: &mut World, player_id: &str, events: &mut CollisionEvents) {
    let Some(player) = world.players.get(player_id) else {
        return;
    };
    let touched: Vec<u32> = world
        .coins
        .values()
        .filter(|coin| player.overlaps(*coin))
        .map(|coin| coin.id)
        .collect();

    for coin_id in touched {
        let Some(coin) = world.replace_coin(coin_id) else {
            continue;
        };
        if let Some(player) = world.players.get_mut(player_id) {
            player.set_mass(player.mass() + coin.value);
            player.score += coin.value;
        }
        events.coins_eaten.push(coin_id);
    }
}

fn resolve_viruses(world: &mut World, player_id: &str, events: &mut CollisionEvents) {
    let min_mass = world.player_rules().min_mass;
    let Some(player) = world.players.get(player_id) else {
        return;
    };
    let mut touched: Vec<u32> = world
        .viruses
        .values()
        .filter(|virus| player.overlaps(*virus))
        .map(|virus| virus.id)
        .collect();
    touched.sort_unstable();

    for virus_id in touched {
        let (Some(player), Some(virus)) =
            (world.players.get(player_id), world.viruses.get(&virus_id))
        else {
            continue;
        };
        // A penalty from an earlier virus may have shrunk the player out of reach.
        if !player.overlaps(virus) {
            continue;
        }

        if virus.destroyed_by(player.mass()) {
            world.replace_virus(virus_id);
            if let Some(player) = world.players.get_mut(player_id) {
                player.score += VIRUS_DESTROY_BONUS;
            }
            events.viruses_destroyed.push(virus_id);
        } else {
            if let Some(player) = world.players.get_mut(player_id) {
                player.set_mass((player.mass() * VIRUS_PENALTY).max(min_mass));
            }
            events.virus_hits.push(virus_id);
        }
    }
}

fn resolve_players(world: &mut World, player_id: &str, events: &mut CollisionEvents) {
    let Some(eater) = world.players.get(player_id) else {
        return;
    };
    // BTreeMap iteration keeps victims in ascending id order.
    let candidates: Vec<String> = world
        .players
        .values()
        .filter(|other| other.alive && other.id != player_id && eater.overlaps(*other))
        .map(|other| other.id.clone())
        .collect();

    for victim_id in candidates {
        let Some(eater_mass) = world.players.get(player_id).map(|p| p.mass()) else {
            return;
        };
        let Some(victim) = world.players.get_mut(&victim_id) else {
            continue;
        };
        if !victim.alive || eater_mass <= victim.mass() * ABSORB_MASS_RATIO {
            continue;
        }

        victim.alive = false;
        let mass_gained = victim.mass() * ABSORB_MASS_SHARE;
        let score_gained = victim.score * ABSORB_SCORE_SHARE;

        if let Some(eater) = world.players.get_mut(player_id) {
            eater.set_mass(eater_mass + mass_gained);
            eater.score += score_gained;
        }
        events.absorptions.push(Absorption {
            eater: player_id.to_string(),
            victim: victim_id,
            mass_gained,
            score_gained,
        });
    }
}

//! Placement rules: contested moves and breeding.
//!
//! Everything here is decided on the host, against the host's replica, and
//! returns a decision instead of mutating state. The dispatcher turns a
//! decision into `place` / `died` events or a `Spawn`, and every participant
//! (the host included) applies those when they are handled.
//!
//! A move with authority succeeds in two rolls. The activity roll fails when
//! `random > activity * move_activity_scale + move_activity_floor`; the
//! piece then stays where it is and nothing is emitted. The survival roll
//! fails when `random > survival * survival_scale + survival_floor`; the
//! piece dies. Activity blends the target's rating with the origin's as
//! `(2 * target + origin) / 3` when the origin is known.

use rand::Rng;
use sotf_mutation::{Axis, TraitChain};
use sotf_world::{Territory, WorldError};
use tracing::debug;

use crate::config::RulesConfig;

/// How a requested move resolves.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveResolution {
    /// Reach, capacity or ownership forbids the move; nothing happens.
    Blocked(WorldError),
    /// The activity roll failed; nothing happens.
    Stalled,
    /// The survival roll failed; the piece dies.
    Died,
    /// The piece moves.
    Placed,
}

/// Decide the outcome of moving `piece` onto `target`.
///
/// Without authority only [`Territory::check_move`] applies and no dice are
/// rolled.
pub fn resolve_move<R: Rng + ?Sized>(
    territory: &Territory,
    rules: &RulesConfig,
    piece: &str,
    target: &str,
    authority: bool,
    rng: &mut R,
) -> MoveResolution {
    if let Err(e) = territory.check_move(piece, target) {
        debug!(piece, target, reason = %e, "Move blocked");
        return MoveResolution::Blocked(e);
    }
    if !authority {
        return MoveResolution::Placed;
    }

    let target_activity = territory.rating(piece, target, Axis::Activity);
    let activity = match territory.cell_of_piece(piece) {
        Some(origin) => {
            let origin_activity = territory.rating(piece, &origin.name, Axis::Activity);
            target_activity.mul_add(2.0, origin_activity) / 3.0
        }
        None => target_activity,
    };
    if rng.random::<f64>() > activity.mul_add(rules.move_activity_scale, rules.move_activity_floor) {
        debug!(piece, target, activity, "Move stalled");
        return MoveResolution::Stalled;
    }

    let survival = territory.rating(piece, target, Axis::Survival);
    if rng.random::<f64>() > survival.mul_add(rules.survival_scale, rules.survival_floor) {
        debug!(piece, target, survival, "Piece did not survive the move");
        return MoveResolution::Died;
    }
    MoveResolution::Placed
}

/// The breeding condition, given the draws already made.
///
/// Breeds when `draw < reproduction`, the cell is below capacity, and the
/// owner either crowds the cell (more than `breed_crowd` pieces there) or
/// wins the coin flip (`coin > breed_coin`).
pub fn breed_decision(
    rules: &RulesConfig,
    reproduction: f64,
    occupants: usize,
    capacity: usize,
    owned_on_cell: usize,
    draw: f64,
    coin: f64,
) -> bool {
    draw < reproduction
        && occupants < capacity
        && (owned_on_cell > rules.breed_crowd || coin > rules.breed_coin)
}

/// A birth the host is about to announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreedPlan {
    /// The piece that reproduced.
    pub parent: String,
    /// Cell the offspring lands on.
    pub cell: String,
    /// Name of the offspring.
    pub offspring: String,
}

/// Roll one breeding attempt for `owner`.
pub fn plan_breeding<R: Rng + ?Sized>(
    territory: &Territory,
    rules: &RulesConfig,
    owner: &str,
    rng: &mut R,
) -> Option<BreedPlan> {
    let pieces: Vec<&str> = territory.pieces_of(owner).map(|p| p.name.as_str()).collect();
    if pieces.is_empty() {
        return None;
    }
    let parent = *pieces.get(rng.random_range(0..pieces.len()))?;
    let cell = territory.cell_of_piece(parent)?;
    let reproduction = territory.rating(parent, &cell.name, Axis::Reproduction);

    let draw = rng.random::<f64>();
    if draw >= reproduction {
        return None;
    }
    let coin = rng.random::<f64>();
    let owned = territory.owned_on(&cell.name, owner);
    if !breed_decision(rules, reproduction, cell.len(), cell.capacity, owned, draw, coin) {
        return None;
    }
    Some(BreedPlan {
        parent: parent.to_owned(),
        cell: cell.name.clone(),
        offspring: offspring_name(territory, owner),
    })
}

/// A fresh piece name for `owner`'s next offspring.
pub fn offspring_name(territory: &Territory, owner: &str) -> String {
    let mut n = territory
        .pieces()
        .filter(|p| p.owner == owner)
        .count()
        .saturating_add(1);
    loop {
        let name = format!("SpeciesChip_{owner}_{n}");
        if territory.piece(&name).is_none() {
            return name;
        }
        n = n.saturating_add(1);
    }
}

/// The trait chain shared by `owner`'s species: that of its first live piece.
pub fn species_chain(territory: &Territory, owner: &str) -> TraitChain {
    territory
        .pieces_of(owner)
        .next()
        .map(|p| p.chain.clone())
        .unwrap_or_default()
}

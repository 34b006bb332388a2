//! Move policy of automated controllers.
//!
//! After thinking, an automated controller makes at most one move: it picks
//! one of its pieces at random and, with probability `agent_move_chance`,
//! heads for the neighbouring cell where that piece would survive best. The
//! move still goes through the placement rules, so it may stall, die, or be
//! refused.

use rand::Rng;
use sotf_mutation::Axis;
use sotf_world::Territory;
use tracing::debug;

/// A move an automated controller wants to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMove {
    /// Piece to move.
    pub piece: String,
    /// Destination cell.
    pub target: String,
}

/// Pick `owner`'s move for this turn, if any.
pub fn choose_move<R: Rng + ?Sized>(
    territory: &Territory,
    owner: &str,
    move_chance: f64,
    rng: &mut R,
) -> Option<AgentMove> {
    let pieces: Vec<&str> = territory.pieces_of(owner).map(|p| p.name.as_str()).collect();
    if pieces.is_empty() {
        debug!(controller = owner, "No pieces left to move");
        return None;
    }
    let piece = *pieces.get(rng.random_range(0..pieces.len()))?;
    if rng.random::<f64>() >= move_chance {
        return None;
    }

    let origin = territory.cell_of_piece(piece)?;
    let mut best: Option<(&str, f64)> = None;
    for cell in territory.neighbours(&origin.name) {
        let survival = territory.rating(piece, &cell.name, Axis::Survival);
        if survival <= 0.0 {
            continue;
        }
        match best {
            Some((_, top)) if survival <= top => {}
            _ => best = Some((&cell.name, survival)),
        }
    }
    let (target, survival) = best?;
    debug!(controller = owner, piece, target, survival, "Agent picked a move");
    Some(AgentMove {
        piece: piece.to_owned(),
        target: target.to_owned(),
    })
}

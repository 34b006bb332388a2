//! Game pieces ("species chips").

use sotf_mutation::TraitChain;
use sotf_types::Vec3;

/// Where a piece is in its lifecycle.
///
/// `Unplaced -> Placed(cell) -> Placed(other)* -> Eliminated`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PieceState {
    /// Spawned but not standing on any cell yet.
    #[default]
    Unplaced,
    /// Standing on the named cell.
    Placed(String),
    /// Removed from play. Terminal.
    Eliminated,
}

/// A piece owned by one controller.
#[derive(Debug, Clone)]
pub struct Piece {
    /// Stable name.
    pub name: String,
    /// Display name of the owning controller.
    pub owner: String,
    /// Trait stack; shared with the owner's other pieces by value.
    pub chain: TraitChain,
    /// Position in world space.
    pub position: Vec3,
    /// Lifecycle state.
    pub state: PieceState,
}

impl Piece {
    /// Create an unplaced piece.
    pub fn new(name: impl Into<String>, owner: impl Into<String>, chain: TraitChain, position: Vec3) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            chain,
            position,
            state: PieceState::Unplaced,
        }
    }

    /// The cell this piece stands on, if any.
    pub fn cell(&self) -> Option<&str> {
        match &self.state {
            PieceState::Placed(cell) => Some(cell),
            PieceState::Unplaced | PieceState::Eliminated => None,
        }
    }

    /// Whether the piece is still in play.
    pub fn is_alive(&self) -> bool {
        self.state != PieceState::Eliminated
    }
}

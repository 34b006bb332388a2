//! Error types for the `sotf-world` crate.
//!
//! Callers in the session core treat every one of these as "the action is a
//! no-op": the error is logged and nothing is replicated.

/// Errors that can occur during territory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// No cell with this name exists.
    #[error("cell not found: {0}")]
    CellNotFound(String),

    /// No piece with this name exists.
    #[error("piece not found: {0}")]
    PieceNotFound(String),

    /// A cell with this name was already added.
    #[error("duplicate cell name: {0}")]
    DuplicateCell(String),

    /// A piece with this name was already added.
    #[error("duplicate piece name: {0}")]
    DuplicatePiece(String),

    /// The cell already holds `capacity` pieces.
    #[error("cell {cell} is at capacity ({capacity})")]
    CellFull {
        /// The full cell.
        cell: String,
        /// Its capacity.
        capacity: usize,
    },

    /// The target cell already holds a piece of the moving piece's owner.
    #[error("cell {cell} already holds a piece of {owner}")]
    SameOwnerPresent {
        /// The target cell.
        cell: String,
        /// The owner of the moving piece.
        owner: String,
    },

    /// The piece has been eliminated and can no longer act.
    #[error("piece {0} has been eliminated")]
    PieceEliminated(String),

    /// A move tried to skip past the neighbouring cells.
    #[error("piece {piece} cannot reach {to} from {from}")]
    NotAdjacent {
        /// The piece being moved.
        piece: String,
        /// The cell it stands on.
        from: String,
        /// The requested cell.
        to: String,
    },
}

//! Territory model for the Survival of the Fittest session core.
//!
//! The board is a fixed set of terrain cells laid out on a hex grid. Pieces
//! live on cells, at most `capacity` per cell, and carry the trait chain that
//! rates how well they do on each terrain. Every mutation of this state is
//! driven by a just-dispatched action; the crate itself never rolls dice.
//!
//! # Modules
//!
//! - [`cell`] -- [`Cell`]: terrain, capacity, residents in arrival order.
//! - [`piece`] -- [`Piece`] and its [`PieceState`] lifecycle.
//! - [`layout`] -- [`BoardLayout`]: grid coordinates, cell names, positions,
//!   and the layout constants (spacing, neighbour radius, stack step).
//! - [`territory`] -- [`Territory`]: the cell and piece registry with
//!   placement, elimination, neighbour and rating queries.
//! - [`error`] -- Error types for territory operations.

pub mod cell;
pub mod error;
pub mod layout;
pub mod piece;
pub mod territory;

pub use cell::Cell;
pub use error::WorldError;
pub use layout::{BoardLayout, COLUMN_SPACING, GridCoord, NEIGHBOUR_RADIUS, STACK_STEP};
pub use piece::{Piece, PieceState};
pub use territory::Territory;

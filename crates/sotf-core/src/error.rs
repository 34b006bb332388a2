//! Error types for the `sotf-core` crate.
//!
//! Gameplay never fails: bad references, refused moves, and empty candidate
//! pools are dropped where they occur. What can fail is putting a session
//! together (config, catalog) and talking to the other side.

use sotf_mutation::MutationError;
use sotf_world::WorldError;

use crate::channel::ChannelError;
use crate::config::ConfigError;

/// Errors raised while building or running a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration could not be loaded.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The trait catalog could not be loaded.
    #[error("trait catalog error: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: MutationError,
    },

    /// The message channel failed.
    #[error("channel error: {source}")]
    Channel {
        /// The underlying channel error.
        #[from]
        source: ChannelError,
    },
}

/// Why the local player's move intent was refused before it could end
/// their turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    /// The piece belongs to someone else.
    #[error("piece {piece} belongs to {owner}")]
    ForeignPiece {
        /// The requested piece.
        piece: String,
        /// Its actual owner.
        owner: String,
    },

    /// The board forbids the move.
    #[error(transparent)]
    Board(#[from] WorldError),
}

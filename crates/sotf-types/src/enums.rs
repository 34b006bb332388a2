//! Enumeration types shared by every participant.
//!
//! Wire names follow the JSON records the rendering client consumes, so
//! terrain kinds serialize to the asset names (`alpineMountain`, `desert`,
//! ...) rather than the Rust variant names.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Lifecycle state of a game session.
///
/// The state only ever advances `UnReady -> Ready -> Playing` during a
/// session. A regressing transition is rejected by [`GameState::can_advance_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Participants are still joining or loading.
    #[default]
    UnReady,
    /// The local participant has signalled readiness.
    Ready,
    /// The session is running; turns are being scheduled.
    Playing,
}

impl GameState {
    /// Whether moving from `self` to `next` respects the monotonic ordering.
    ///
    /// Re-asserting the current state is allowed (it is idempotent).
    pub fn can_advance_to(self, next: Self) -> bool {
        next >= self
    }
}

/// The role a participant plays in the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerRole {
    /// The authoritative participant.
    #[default]
    Host,
    /// A mirroring participant.
    Client,
}

impl HandlerRole {
    /// Parse a role from a config or environment string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Some(Self::Host),
            "client" => Some(Self::Client),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Action type tag
// ---------------------------------------------------------------------------

/// Discriminant of an [`Action`](crate::Action) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Create a cell, piece, or controller.
    Spawn,
    /// Set one named field on a resolvable target.
    Update,
    /// Free-form text for the message listeners.
    Message,
    /// Advance the session state.
    GameState,
    /// Hand the turn to a controller.
    InvokeController,
    /// Deliver a gameplay event to a controller.
    Event,
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Terrain kind of a territory cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    /// High mountains, thin air, freezing temperatures.
    #[serde(rename = "alpineMountain")]
    Alpine,
    /// Dry desert with large temperature swings.
    #[serde(rename = "desert")]
    Desert,
    /// Dense forest with plenty of food and cover.
    #[serde(rename = "forest")]
    Forest,
    /// Mountain range with icy temperatures.
    #[serde(rename = "mountain")]
    Mountain,
    /// Temperate swamp bridging land and water.
    #[serde(rename = "swamp")]
    Swamp,
    /// Shallow water.
    #[serde(rename = "water")]
    Water,
}

impl TerrainKind {
    /// Every terrain kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Alpine,
        Self::Desert,
        Self::Forest,
        Self::Mountain,
        Self::Swamp,
        Self::Water,
    ];

    /// The wire / asset name of this terrain kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alpine => "alpineMountain",
            Self::Desert => "desert",
            Self::Forest => "forest",
            Self::Mountain => "mountain",
            Self::Swamp => "swamp",
            Self::Water => "water",
        }
    }

    /// Parse a terrain kind from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl core::fmt::Display for TerrainKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Species strategy
// ---------------------------------------------------------------------------

/// Reproductive strategy a controller plays its species with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Many offspring, little investment each.
    #[default]
    R,
    /// Few offspring, high investment each.
    K,
}

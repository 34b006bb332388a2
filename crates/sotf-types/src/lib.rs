//! Shared type definitions for the Survival of the Fittest session core.
//!
//! This crate is the single source of truth for every record that crosses
//! the message channel between host and clients, plus the small value types
//! (positions, colours, identities) those records carry.
//!
//! # Modules
//!
//! - [`actions`] -- The replicated [`Action`] record and its typed payloads
//! - [`enums`] -- Enumeration types (game state, terrain, strategy, roles)
//! - [`structs`] -- Value types: positions, rotations, colours, identities

pub mod actions;
pub mod enums;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::{
    Action, ActionBody, EventInfo, FieldUpdate, GameEvent, InvokeControllerInfo, SPAWN_FACTORY,
    SYSTEM_INVOKER, SpawnClass, SpawnExtra, SpawnInfo, UpdateInfo,
};
pub use enums::{ActionType, GameState, HandlerRole, Strategy, TerrainKind};
pub use structs::{Account, Color, Identity, Rotation, Vec3};

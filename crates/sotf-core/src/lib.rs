//! Session core for Survival of the Fittest.
//!
//! One participant is the host and owns the authoritative state; every other
//! participant is a client that mirrors it. Every state change travels as an
//! [`Action`](sotf_types::Action): the host applies it, then broadcasts it,
//! and clients apply what the host broadcasts.
//!
//! # Modules
//!
//! - [`agent`] -- Move policy of automated controllers.
//! - [`channel`] -- [`ActionChannel`] trait and the in-process [`LocalHub`].
//! - [`config`] -- Configuration loading from `sotf-config.yaml` into
//!   strongly-typed structs.
//! - [`controller`] -- Controllers, turn intents and outcomes, the registry.
//! - [`dispatch`] -- [`GameHandler`]: routing, application, readiness,
//!   authoritative moves and breeding.
//! - [`error`] -- Error types ([`SessionError`]).
//! - [`listeners`] -- [`GameListener`] callbacks fired after application.
//! - [`placement`] -- Move resolution and breeding decisions.
//! - [`resolver`] -- Name resolution and typed field updates.
//! - [`scheduler`] -- Round-robin [`TurnScheduler`].
//! - [`session`] -- The async [`Session`] loop.
//! - [`setup`] -- Host-side lobby, board, and start positions.

pub mod agent;
pub mod channel;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod listeners;
pub mod placement;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod setup;

#[cfg(test)]
mod testing;

pub use channel::{ActionChannel, ChannelError, ClientLink, HostLink, LocalHub, RecordingChannel};
pub use config::{ConfigError, GameConfig};
pub use controller::{Controller, ControllerKind, ControllerRegistry, TurnIntent, TurnOutcome};
pub use dispatch::{Effect, GameHandler, session_rng};
pub use error::{IntentError, SessionError};
pub use listeners::{GameListener, RecordingListener, SpawnedEntity};
pub use placement::MoveResolution;
pub use resolver::{EntityResolver, Replica, TargetKind, TargetRef};
pub use scheduler::{TurnScheduler, TurnTicket};
pub use session::{Session, SessionEndReason, SessionSummary, load_catalog, log_session_end};
pub use setup::GameSetup;

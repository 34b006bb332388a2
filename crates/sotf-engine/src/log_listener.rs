//! Listener that narrates the session to the log.
//!
//! With no render layer, this is what the player reads: spawns and field
//! updates at debug level, everything that matters to a turn at info.

use sotf_core::{GameListener, SpawnedEntity, TargetKind, TargetRef};
use sotf_types::{GameEvent, GameState, UpdateInfo};
use tracing::{debug, info};

/// Logs every applied action the handler reports.
#[derive(Debug, Clone)]
pub struct LogListener {
    player: String,
}

impl LogListener {
    /// A listener for the local player, whose own events stand out.
    pub const fn new(player: String) -> Self {
        Self { player }
    }

    fn is_local(&self, controller: &str) -> bool {
        self.player == controller
    }
}

impl GameListener for LogListener {
    fn on_spawn(&mut self, entity: &SpawnedEntity) {
        match entity {
            SpawnedEntity::Cell { name } => debug!(cell = %name, "Cell spawned"),
            SpawnedEntity::Piece { name, owner, cell } => {
                info!(piece = %name, owner = %owner, cell = ?cell, "Piece spawned");
            }
            SpawnedEntity::Controller { name, seat } => {
                info!(controller = %name, seat, "Controller joined");
            }
        }
    }

    fn on_update(&mut self, target: &TargetRef, update: &UpdateInfo) {
        if target.kind == TargetKind::SpawnFactory {
            return;
        }
        debug!(
            target = %target.name,
            kind = ?target.kind,
            field = %update.field.name,
            value = %update.field.value,
            "Field updated"
        );
    }

    fn on_message(&mut self, invoker: &str, text: &str) {
        info!(from = %invoker, "{text}");
    }

    fn on_state_change(&mut self, state: GameState) {
        info!(?state, "Session state");
    }

    fn on_event(&mut self, controller: &str, event: &GameEvent) {
        let mine = self.is_local(controller);
        match event {
            GameEvent::Place { field, species } => {
                info!(controller = %controller, mine, piece = %species, cell = %field, "Piece moved");
            }
            GameEvent::Died { species } => {
                info!(controller = %controller, mine, piece = %species, "Piece died");
            }
            GameEvent::Mutate { mutation } => {
                info!(controller = %controller, mine, mutation = %mutation, "Species mutated");
            }
            GameEvent::Unevolve { mutation } => {
                info!(controller = %controller, mine, mutation = %mutation, "Species lost a trait");
            }
            GameEvent::Move { field, species } => {
                debug!(controller = %controller, piece = %species, cell = %field, "Move requested");
            }
        }
    }
}

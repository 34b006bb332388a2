//! Listener callbacks fired after actions are applied.
//!
//! The render layer (or, in the binary, a logging listener) observes the
//! session through [`GameListener`]. Listeners fire in registration order,
//! after the action that triggered them has been applied to the replica.
//! Dropped actions never reach a listener.

use sotf_types::{GameEvent, GameState, UpdateInfo};

use crate::resolver::TargetRef;

/// An entity created by a `Spawn` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnedEntity {
    /// A territory cell.
    Cell {
        /// Cell name.
        name: String,
    },
    /// A game piece.
    Piece {
        /// Piece name.
        name: String,
        /// Owning controller.
        owner: String,
        /// Cell it landed on, if any.
        cell: Option<String>,
    },
    /// A controller.
    Controller {
        /// Identity name.
        name: String,
        /// Turn-order seat.
        seat: u32,
    },
}

/// Observer of applied actions. Every method defaults to a no-op.
pub trait GameListener: Send {
    /// An entity was spawned.
    fn on_spawn(&mut self, _entity: &SpawnedEntity) {}

    /// A field was set on `target`.
    fn on_update(&mut self, _target: &TargetRef, _update: &UpdateInfo) {}

    /// A message arrived.
    fn on_message(&mut self, _invoker: &str, _text: &str) {}

    /// The session state changed.
    fn on_state_change(&mut self, _state: GameState) {}

    /// A gameplay event was applied to `controller`.
    fn on_event(&mut self, _controller: &str, _event: &GameEvent) {}
}

/// Registered listeners, fired in registration order.
#[derive(Default)]
pub struct Listeners {
    inner: Vec<Box<dyn GameListener>>,
}

impl core::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Listeners").field("count", &self.inner.len()).finish()
    }
}

impl Listeners {
    /// Register a listener.
    pub fn add(&mut self, listener: Box<dyn GameListener>) {
        self.inner.push(listener);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn spawn(&mut self, entity: &SpawnedEntity) {
        for l in &mut self.inner {
            l.on_spawn(entity);
        }
    }

    pub(crate) fn update(&mut self, target: &TargetRef, update: &UpdateInfo) {
        for l in &mut self.inner {
            l.on_update(target, update);
        }
    }

    pub(crate) fn message(&mut self, invoker: &str, text: &str) {
        for l in &mut self.inner {
            l.on_message(invoker, text);
        }
    }

    pub(crate) fn state(&mut self, state: GameState) {
        for l in &mut self.inner {
            l.on_state_change(state);
        }
    }

    pub(crate) fn event(&mut self, controller: &str, event: &GameEvent) {
        for l in &mut self.inner {
            l.on_event(controller, event);
        }
    }
}

/// A listener that records everything it sees; handy in tests and tools.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    log: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl RecordingListener {
    /// A new recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the recorded lines.
    pub fn lines(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(line);
        }
    }
}

impl GameListener for RecordingListener {
    fn on_spawn(&mut self, entity: &SpawnedEntity) {
        let name = match entity {
            SpawnedEntity::Cell { name }
            | SpawnedEntity::Piece { name, .. }
            | SpawnedEntity::Controller { name, .. } => name,
        };
        self.push(format!("spawn {name}"));
    }

    fn on_update(&mut self, target: &TargetRef, update: &UpdateInfo) {
        self.push(format!("update {} {}", target.name, update.field.name));
    }

    fn on_message(&mut self, invoker: &str, text: &str) {
        self.push(format!("message {invoker}: {text}"));
    }

    fn on_state_change(&mut self, state: GameState) {
        self.push(format!("state {state:?}"));
    }

    fn on_event(&mut self, controller: &str, event: &GameEvent) {
        self.push(format!("event {controller} {}", event.name()));
    }
}

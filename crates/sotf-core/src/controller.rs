//! Controllers and the controller registry.
//!
//! A controller is one participant's agent in the session: a human at a
//! console or an automated opponent. Every participant holds a replica of
//! every controller; only the participant that *drives* a controller ever
//! runs its turn (see [`Controller::invoke`]).
//!
//! Turn order is the seat order the host hands out when a controller first
//! registers. Seats travel in the controller's spawn payload, so every
//! replica iterates controllers in the same order no matter when it joined.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use sotf_types::{Color, Identity, Strategy};
use tokio::sync::oneshot;
use tracing::debug;

/// How a controller takes its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// Waits for its human to move or pass, up to the turn timeout.
    Interactive,
    /// Thinks for a fixed delay, then lets the session pick a move.
    Automated,
}

/// What a human asks for during their turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnIntent {
    /// Move `piece` onto the cell `target`.
    Move {
        /// Piece name.
        piece: String,
        /// Destination cell name.
        target: String,
    },
    /// End the turn without acting.
    Pass,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The human chose a move.
    Moved {
        /// Piece name.
        piece: String,
        /// Destination cell name.
        target: String,
    },
    /// The human passed.
    Pass,
    /// The turn timeout elapsed; treated as a pass.
    TimedOut,
    /// An automated controller finished thinking; the session picks its move.
    Deliberate,
}

/// One participant's agent.
#[derive(Debug, Clone)]
pub struct Controller {
    /// Who the controller belongs to.
    pub identity: Identity,
    /// Interactive or automated.
    pub kind: ControllerKind,
    /// Whether the participant has signalled readiness.
    pub ready: bool,
    /// Reproductive strategy.
    pub strategy: Strategy,
    /// Colour of the controller's pieces, once known.
    pub color: Option<Color>,
    /// Position in turn order.
    pub seat: u32,
}

impl Controller {
    /// A new controller. Automated controllers start out ready.
    pub fn new(identity: impl Into<Identity>, kind: ControllerKind, seat: u32) -> Self {
        Self {
            identity: identity.into(),
            kind,
            ready: kind == ControllerKind::Automated,
            strategy: Strategy::default(),
            color: None,
            seat,
        }
    }

    /// Display name; this is what actions address the controller by.
    pub fn name(&self) -> &str {
        self.identity.display_name()
    }

    /// Start this controller's turn.
    ///
    /// Interactive controllers resolve with the first intent received on
    /// `intents`, or [`TurnOutcome::TimedOut`] once `timeout` elapses. A
    /// dropped sender counts as a pass. Automated controllers ignore
    /// `intents` and resolve with [`TurnOutcome::Deliberate`] after `think`.
    pub fn invoke(
        &self,
        timeout: Duration,
        think: Duration,
        intents: oneshot::Receiver<TurnIntent>,
    ) -> BoxFuture<'static, TurnOutcome> {
        let name = self.name().to_owned();
        match self.kind {
            ControllerKind::Interactive => async move {
                match tokio::time::timeout(timeout, intents).await {
                    Ok(Ok(TurnIntent::Move { piece, target })) => TurnOutcome::Moved { piece, target },
                    Ok(Ok(TurnIntent::Pass) | Err(_)) => TurnOutcome::Pass,
                    Err(_) => {
                        debug!(controller = %name, "Turn timed out");
                        TurnOutcome::TimedOut
                    }
                }
            }
            .boxed(),
            ControllerKind::Automated => async move {
                tokio::time::sleep(think).await;
                debug!(controller = %name, "Finished thinking");
                TurnOutcome::Deliberate
            }
            .boxed(),
        }
    }
}

/// Every controller known to this participant, in seat order.
#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    controllers: Vec<Controller>,
}

impl ControllerRegistry {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            controllers: Vec::new(),
        }
    }

    /// Register a controller. Returns `false` if the name is already taken.
    pub fn register(&mut self, controller: Controller) -> bool {
        if self.get(controller.name()).is_some() {
            return false;
        }
        let at = self
            .controllers
            .iter()
            .position(|c| c.seat > controller.seat)
            .unwrap_or(self.controllers.len());
        self.controllers.insert(at, controller);
        true
    }

    /// Look a controller up by identity name.
    pub fn get(&self, name: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.identity.matches(name))
    }

    /// Look a controller up by identity name for modification.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Controller> {
        self.controllers.iter_mut().find(|c| c.identity.matches(name))
    }

    /// Controllers in seat order.
    pub fn iter(&self) -> impl Iterator<Item = &Controller> {
        self.controllers.iter()
    }

    /// Names in seat order.
    pub fn names(&self) -> Vec<String> {
        self.controllers.iter().map(|c| c.name().to_owned()).collect()
    }

    /// Number of controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Whether no controller is registered.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// The seat a newly joining controller gets.
    pub fn next_seat(&self) -> u32 {
        self.controllers
            .iter()
            .map(|c| c.seat.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Whether every registered controller is ready.
    pub fn all_ready(&self) -> bool {
        self.controllers.iter().all(|c| c.ready)
    }

    /// Number of interactive controllers.
    pub fn interactive_count(&self) -> usize {
        self.controllers
            .iter()
            .filter(|c| c.kind == ControllerKind::Interactive)
            .count()
    }

    /// The controller after `name` in seat order, wrapping around.
    pub fn next_after(&self, name: &str) -> Option<&Controller> {
        let index = self.controllers.iter().position(|c| c.identity.matches(name))?;
        let next = index.checked_add(1)?.checked_rem(self.controllers.len())?;
        self.controllers.get(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sotf_types::Account;

    use super::*;

    #[test]
    fn registry_orders_by_seat_and_dedups() {
        let mut registry = ControllerRegistry::new();
        assert!(registry.register(Controller::new("C", ControllerKind::Automated, 2)));
        assert!(registry.register(Controller::new("A", ControllerKind::Interactive, 0)));
        assert!(registry.register(Controller::new("B", ControllerKind::Automated, 1)));
        assert!(!registry.register(Controller::new("A", ControllerKind::Automated, 7)));
        assert_eq!(registry.names(), vec!["A", "B", "C"]);
        assert_eq!(registry.next_seat(), 3);
        assert_eq!(registry.interactive_count(), 1);
    }

    #[test]
    fn next_after_wraps_around() {
        let mut registry = ControllerRegistry::new();
        for (seat, name) in ["A", "B", "C"].into_iter().enumerate() {
            let seat = u32::try_from(seat).unwrap();
            registry.register(Controller::new(name, ControllerKind::Automated, seat));
        }
        assert_eq!(registry.next_after("A").unwrap().name(), "B");
        assert_eq!(registry.next_after("C").unwrap().name(), "A");
        assert!(registry.next_after("Z").is_none());
    }

    #[test]
    fn accounts_resolve_by_display_name() {
        let mut registry = ControllerRegistry::new();
        let account = Identity::Account(Account {
            name: String::from("alice"),
            id: Some(1),
        });
        registry.register(Controller::new(account, ControllerKind::Interactive, 0));
        assert!(registry.get("alice").is_some());
        assert!(!registry.all_ready());
        registry.get_mut("alice").unwrap().ready = true;
        assert!(registry.all_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_turn_resolves_with_intent() {
        let human = Controller::new("alice", ControllerKind::Interactive, 0);
        let (tx, rx) = oneshot::channel();
        let turn = human.invoke(Duration::from_secs(7), Duration::ZERO, rx);
        tx.send(TurnIntent::Move {
            piece: String::from("SpeciesChip0_1"),
            target: String::from("FieldChip1_1"),
        })
        .unwrap();
        assert_eq!(
            turn.await,
            TurnOutcome::Moved {
                piece: String::from("SpeciesChip0_1"),
                target: String::from("FieldChip1_1"),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_turn_times_out() {
        let human = Controller::new("alice", ControllerKind::Interactive, 0);
        let (_tx, rx) = oneshot::channel();
        let turn = human.invoke(Duration::from_secs(7), Duration::ZERO, rx);
        assert_eq!(turn.await, TurnOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn automated_turn_deliberates_after_thinking() {
        let ai = Controller::new("AIPlayer1", ControllerKind::Automated, 1);
        let (_tx, rx) = oneshot::channel();
        let start = tokio::time::Instant::now();
        let outcome = ai.invoke(Duration::from_secs(7), Duration::from_millis(1500), rx).await;
        assert_eq!(outcome, TurnOutcome::Deliberate);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}

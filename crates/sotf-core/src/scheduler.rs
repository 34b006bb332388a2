//! Round-robin turn scheduling.
//!
//! The scheduler is idle until the first `InvokeController` arrives, then
//! always points at the controller whose turn it is. It does not run turns
//! itself: it hands back a [`TurnTicket`] when this participant drives the
//! invoked controller, and the session turns that ticket into a running
//! turn future. Tickets carry a sequence number so an outcome that arrives
//! after the turn has moved on can be recognised and ignored.

use tracing::debug;

use crate::controller::{Controller, ControllerKind, ControllerRegistry};

/// A turn this participant has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    /// Sequence number of the turn, starting at 1.
    pub turn: u64,
    /// Controller whose turn it is.
    pub controller: String,
    /// How the controller plays.
    pub kind: ControllerKind,
}

/// Scheduler state: idle, or awaiting the active controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnScheduler {
    active: Option<String>,
    turn: u64,
}

impl TurnScheduler {
    /// An idle scheduler.
    pub const fn new() -> Self {
        Self {
            active: None,
            turn: 0,
        }
    }

    /// The controller whose turn it is, if any.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Whether `name` holds the turn.
    pub fn is_active(&self, name: &str) -> bool {
        self.active.as_deref() == Some(name)
    }

    /// Number of turns started so far.
    pub const fn turns_started(&self) -> u64 {
        self.turn
    }

    /// Whether `turn` is still the current turn.
    pub const fn is_current(&self, turn: u64) -> bool {
        self.turn == turn
    }

    /// Handle `InvokeController{name}`.
    ///
    /// Unknown controllers are dropped (`None`, state unchanged). Otherwise
    /// the controller becomes active; a ticket is returned when `drives`
    /// says this participant runs its turn.
    pub fn invoke(
        &mut self,
        registry: &ControllerRegistry,
        name: &str,
        drives: impl FnOnce(&Controller) -> bool,
    ) -> Option<TurnTicket> {
        let Some(controller) = registry.get(name) else {
            debug!(controller = name, "Invoke for unknown controller dropped");
            return None;
        };
        self.turn = self.turn.saturating_add(1);
        self.active = Some(controller.name().to_owned());
        debug!(controller = name, turn = self.turn, "Turn started");
        drives(controller).then(|| TurnTicket {
            turn: self.turn,
            controller: controller.name().to_owned(),
            kind: controller.kind,
        })
    }

    /// The controller that plays after `current`, in seat order.
    pub fn next_controller(registry: &ControllerRegistry, current: &str) -> Option<String> {
        registry.next_after(current).map(|c| c.name().to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(Controller::new("A", ControllerKind::Interactive, 0));
        registry.register(Controller::new("B", ControllerKind::Automated, 1));
        registry.register(Controller::new("C", ControllerKind::Automated, 2));
        registry
    }

    #[test]
    fn round_robin_from_a() {
        let registry = registry();
        let mut scheduler = TurnScheduler::new();
        let mut order = Vec::new();
        let mut current = String::from("A");
        for _ in 0..7 {
            let ticket = scheduler.invoke(&registry, &current, |_| true).unwrap();
            order.push(ticket.controller.clone());
            current = TurnScheduler::next_controller(&registry, &ticket.controller).unwrap();
        }
        assert_eq!(order, vec!["A", "B", "C", "A", "B", "C", "A"]);
        assert_eq!(scheduler.turns_started(), 7);
    }

    #[test]
    fn unknown_controller_is_dropped() {
        let registry = registry();
        let mut scheduler = TurnScheduler::new();
        scheduler.invoke(&registry, "B", |_| false);
        assert!(scheduler.invoke(&registry, "Z", |_| true).is_none());
        assert!(scheduler.is_active("B"));
        assert_eq!(scheduler.turns_started(), 1);
    }

    #[test]
    fn only_driven_controllers_get_tickets() {
        let registry = registry();
        let mut scheduler = TurnScheduler::new();
        let drives = |c: &Controller| c.kind == ControllerKind::Automated;
        assert!(scheduler.invoke(&registry, "A", drives).is_none());
        assert!(scheduler.is_active("A"));
        let ticket = scheduler.invoke(&registry, "B", drives).unwrap();
        assert_eq!(ticket.turn, 2);
        assert!(scheduler.is_current(2));
        assert!(!scheduler.is_current(1));
    }
}

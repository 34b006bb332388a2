//! Action dispatch and replication.
//!
//! [`GameHandler`] is the one place state changes enter a participant. Every
//! change is an [`Action`]; the handler routes it by role:
//!
//! - **Host**: [`GameHandler::handle`] applies the action locally first and
//!   then broadcasts it to every client. Actions emitted while an earlier
//!   one is still being applied are queued, so local application order and
//!   broadcast order are always the same.
//! - **Client**: [`GameHandler::handle`] only transmits to the host. The local
//!   effect happens when the host's broadcast comes back through
//!   [`GameHandler::receive_remote`].
//!
//! [`GameHandler::handle_incoming`] applies one action on any participant.
//! Actions that name something the replica does not know are dropped with a
//! debug log and never reach a listener.
//!
//! Work the session has to pick up (a turn to run, a finished spawn chunk)
//! is queued as an [`Effect`] instead of being done inline.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use sotf_mutation::{Catalog, UnevolvePolicy, select_mutation, select_unevolve, unevolve_probability};
use sotf_types::{
    Action, ActionBody, EventInfo, GameEvent, GameState, HandlerRole, SYSTEM_INVOKER, SpawnClass,
    SpawnExtra, SpawnInfo, UpdateInfo, Vec3,
};
use sotf_world::{Piece, Territory};
use tracing::{debug, info, warn};

use crate::agent;
use crate::channel::{ActionChannel, ChannelError};
use crate::config::{GameConfig, RulesConfig};
use crate::controller::{Controller, ControllerKind, ControllerRegistry, TurnOutcome};
use crate::error::IntentError;
use crate::listeners::{GameListener, Listeners, SpawnedEntity};
use crate::placement::{self, BreedPlan, MoveResolution};
use crate::resolver::{EntityResolver, Replica, TargetKind};
use crate::scheduler::{TurnScheduler, TurnTicket};

/// Follow-up work for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// This participant has to run a controller's turn.
    TurnStarted(TurnTicket),
    /// The spawn tracker reached its expected count.
    ChunkFinished,
}

/// A random source for a session: seeded when `seed` is non-zero.
pub fn session_rng(seed: u64) -> Box<dyn RngCore + Send> {
    if seed == 0 {
        Box::new(StdRng::from_os_rng())
    } else {
        Box::new(StdRng::seed_from_u64(seed))
    }
}

/// One participant's dispatcher and replica.
pub struct GameHandler {
    role: HandlerRole,
    local_player: String,
    state: GameState,
    replica: Replica,
    resolver: EntityResolver,
    scheduler: TurnScheduler,
    catalog: Arc<Catalog>,
    rules: RulesConfig,
    enforce_turns: bool,
    expected_players: usize,
    breeding: bool,
    listeners: Listeners,
    channel: Box<dyn ActionChannel>,
    rng: Box<dyn RngCore + Send>,
    queue: VecDeque<Action>,
    draining: bool,
    effects: VecDeque<Effect>,
    channel_closed: bool,
}

impl core::fmt::Debug for GameHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameHandler")
            .field("role", &self.role)
            .field("local_player", &self.local_player)
            .field("state", &self.state)
            .field("active", &self.scheduler.active())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl GameHandler {
    /// A handler for the participant described by `config`.
    pub fn new(
        config: &GameConfig,
        catalog: Arc<Catalog>,
        channel: Box<dyn ActionChannel>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            role: config.participant.role,
            local_player: config.participant.player.clone(),
            state: GameState::UnReady,
            replica: Replica {
                territory: Territory::new(config.board.layout()),
                ..Replica::default()
            },
            resolver: EntityResolver::new(),
            scheduler: TurnScheduler::new(),
            catalog,
            rules: config.rules.clone(),
            enforce_turns: config.turns.enforce,
            expected_players: config.lobby.expected_players,
            breeding: false,
            listeners: Listeners::default(),
            channel,
            rng,
            queue: VecDeque::new(),
            draining: false,
            effects: VecDeque::new(),
            channel_closed: false,
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// This participant's role.
    pub const fn role(&self) -> HandlerRole {
        self.role
    }

    /// Whether this participant is the host.
    pub fn is_host(&self) -> bool {
        self.role == HandlerRole::Host
    }

    /// Name of the local human's controller.
    pub fn local_player(&self) -> &str {
        &self.local_player
    }

    /// Current session state.
    pub const fn state(&self) -> GameState {
        self.state
    }

    /// The replicated state.
    pub const fn replica(&self) -> &Replica {
        &self.replica
    }

    /// Cells and pieces.
    pub const fn territory(&self) -> &Territory {
        &self.replica.territory
    }

    /// Controllers in seat order.
    pub const fn registry(&self) -> &ControllerRegistry {
        &self.replica.registry
    }

    /// The turn scheduler.
    pub const fn scheduler(&self) -> &TurnScheduler {
        &self.scheduler
    }

    /// The trait catalog.
    pub const fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Placement and breeding parameters.
    pub const fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Whether transmitting has failed because the other side is gone.
    pub const fn channel_closed(&self) -> bool {
        self.channel_closed
    }

    /// Register a listener; listeners fire in registration order.
    pub fn add_listener(&mut self, listener: Box<dyn GameListener>) {
        self.listeners.add(listener);
    }

    /// Take the next queued effect.
    pub fn next_effect(&mut self) -> Option<Effect> {
        self.effects.pop_front()
    }

    pub(crate) fn rng(&mut self) -> &mut (dyn RngCore + Send) {
        &mut *self.rng
    }

    // -------------------------------------------------------------------
    // Routing
    // -------------------------------------------------------------------

    /// Emit an action from this participant.
    pub fn handle(&mut self, action: Action) {
        if self.role == HandlerRole::Client {
            self.transmit(&action);
            return;
        }
        self.queue.push_back(action);
        if self.draining {
            return;
        }
        self.draining = true;
        while let Some(next) = self.queue.pop_front() {
            self.handle_incoming(&next);
            self.transmit(&next);
        }
        self.draining = false;
    }

    /// Accept an action that arrived over the channel.
    ///
    /// On a client this applies the host's broadcast. On the host the action
    /// is re-handled so it is applied authoritatively and rebroadcast to
    /// everyone, the originator included. A `move` request is resolved by
    /// the placement rules instead of being forwarded, and a controller that
    /// joins without a seat gets the next free one.
    pub fn receive_remote(&mut self, action: Action) {
        if self.role == HandlerRole::Client {
            self.handle_incoming(&action);
            return;
        }
        let Action { invoker, body } = action;
        match body {
            ActionBody::Event(EventInfo {
                object_name,
                evt: GameEvent::Move { field, species },
            }) => self.remote_move(&object_name, &species, &field),
            ActionBody::Spawn(mut info)
                if matches!(
                    info.class(),
                    Some(SpawnClass::Interactive | SpawnClass::Automated)
                ) =>
            {
                let seat = self
                    .replica
                    .registry
                    .get(&info.name)
                    .map_or_else(|| self.replica.registry.next_seat(), |c| c.seat);
                info.additional
                    .get_or_insert_with(SpawnExtra::default)
                    .seat
                    .get_or_insert(seat);
                self.handle(Action::spawn(invoker, info));
            }
            body => self.handle(Action::new(invoker, body)),
        }
    }

    fn transmit(&mut self, action: &Action) {
        match self.channel.transmit(action) {
            Ok(()) => {}
            Err(ChannelError::Closed) => {
                if !self.channel_closed {
                    warn!(kind = ?action.kind(), "Channel closed, action not delivered");
                }
                self.channel_closed = true;
            }
            Err(e) => warn!(kind = ?action.kind(), error = %e, "Failed to transmit action"),
        }
    }

    // -------------------------------------------------------------------
    // Application
    // -------------------------------------------------------------------

    /// Apply one action to the local replica and fire listeners.
    pub fn handle_incoming(&mut self, action: &Action) {
        debug!(kind = ?action.kind(), invoker = %action.invoker, "Handling action");
        match &action.body {
            ActionBody::Spawn(info) => self.apply_spawn(&action.invoker, info),
            ActionBody::Update(info) => self.apply_update(info),
            ActionBody::Message(text) => self.listeners.message(&action.invoker, text),
            ActionBody::GameState(next) => self.apply_state(*next),
            ActionBody::InvokeController(info) => self.apply_invoke(&info.controller),
            ActionBody::Event(info) => self.apply_event(info),
        }
    }

    fn apply_spawn(&mut self, invoker: &str, info: &SpawnInfo) {
        let Some(class) = info.class() else {
            debug!(name = %info.name, class = %info.object_class, "Unknown spawn class dropped");
            return;
        };
        let spawned = match class {
            SpawnClass::Terrain(kind) => self
                .replica
                .territory
                .add_cell(&info.name, kind, info.position)
                .map(|_| SpawnedEntity::Cell {
                    name: info.name.clone(),
                })
                .inspect_err(|e| debug!(name = %info.name, reason = %e, "Cell spawn dropped"))
                .ok(),
            SpawnClass::Piece => self.spawn_piece(invoker, info),
            SpawnClass::Interactive => self.spawn_controller(info, ControllerKind::Interactive),
            SpawnClass::Automated => self.spawn_controller(info, ControllerKind::Automated),
        };
        let Some(entity) = spawned else {
            return;
        };
        self.listeners.spawn(&entity);
        if self.replica.tracker.record_spawn() {
            info!(
                spawned = self.replica.tracker.spawned_count,
                "Spawn chunk finished"
            );
            self.effects.push_back(Effect::ChunkFinished);
        }
    }

    fn spawn_piece(&mut self, invoker: &str, info: &SpawnInfo) -> Option<SpawnedEntity> {
        let extra = info.additional.clone().unwrap_or_default();
        let owner = extra.owner.unwrap_or_else(|| invoker.to_owned());
        let territory = &mut self.replica.territory;
        let chain = placement::species_chain(territory, &owner);
        if let Err(e) = territory.add_piece(Piece::new(&info.name, &owner, chain, info.position)) {
            debug!(name = %info.name, reason = %e, "Piece spawn dropped");
            return None;
        }

        let target = extra
            .field
            .filter(|f| territory.cell(f).is_some())
            .or_else(|| territory.nearest_cell(info.position).map(|c| c.name.clone()));
        let cell = target.and_then(|cell| match territory.settle(&info.name, &cell) {
            Ok(()) => Some(cell),
            Err(e) => {
                debug!(piece = %info.name, cell = %cell, reason = %e, "Spawned piece left unplaced");
                None
            }
        });

        if let (Some(color), Some(controller)) = (extra.color, self.replica.registry.get_mut(&owner)) {
            controller.color = Some(color);
        }
        Some(SpawnedEntity::Piece {
            name: info.name.clone(),
            owner,
            cell,
        })
    }

    fn spawn_controller(&mut self, info: &SpawnInfo, kind: ControllerKind) -> Option<SpawnedEntity> {
        let extra = info.additional.clone().unwrap_or_default();
        let registry = &mut self.replica.registry;
        let seat = extra.seat.unwrap_or_else(|| registry.next_seat());
        let mut controller = Controller::new(info.name.as_str(), kind, seat);
        controller.color = extra.color;
        if !registry.register(controller) {
            debug!(name = %info.name, "Controller already registered");
            return None;
        }
        info!(controller = %info.name, ?kind, seat, "Controller joined");
        Some(SpawnedEntity::Controller {
            name: info.name.clone(),
            seat,
        })
    }

    fn apply_update(&mut self, info: &UpdateInfo) {
        let Some(target) = self.resolver.resolve(&self.replica, &info.object_name) else {
            debug!(object = %info.object_name, "Update for unknown object dropped");
            return;
        };
        if let Err(e) = self
            .resolver
            .apply_field_update(&mut self.replica, &target, &info.field)
        {
            debug!(object = %info.object_name, reason = %e, "Update dropped");
            return;
        }
        self.listeners.update(&target, info);
    }

    fn apply_state(&mut self, next: GameState) {
        if !self.state.can_advance_to(next) {
            debug!(current = ?self.state, requested = ?next, "Regressing state change dropped");
            return;
        }
        if next != self.state {
            info!(from = ?self.state, to = ?next, "Game state changed");
        }
        self.state = next;
        self.listeners.state(next);
    }

    fn apply_invoke(&mut self, name: &str) {
        let host = self.is_host();
        let local = self.local_player.as_str();
        let ticket = self
            .scheduler
            .invoke(&self.replica.registry, name, |c| match c.kind {
                ControllerKind::Automated => host,
                ControllerKind::Interactive => c.identity.matches(local),
            });
        if let Some(ticket) = ticket {
            self.effects.push_back(Effect::TurnStarted(ticket));
        }
    }

    fn apply_event(&mut self, info: &EventInfo) {
        let target = match self.resolver.resolve(&self.replica, &info.object_name) {
            Some(t) if t.kind == TargetKind::Controller => t,
            Some(t) => {
                debug!(object = %t.name, kind = ?t.kind, "Event for a non-controller dropped");
                return;
            }
            None => {
                debug!(object = %info.object_name, "Event for unknown object dropped");
                return;
            }
        };
        let owner = target.name.as_str();
        let territory = &mut self.replica.territory;
        let applied = match &info.evt {
            GameEvent::Place { field, species } => {
                if territory.piece(species).is_some_and(|p| p.owner == owner) {
                    territory
                        .move_piece(species, field)
                        .inspect_err(|e| debug!(piece = %species, reason = %e, "Place dropped"))
                        .is_ok()
                } else {
                    debug!(piece = %species, controller = owner, "Place for a foreign piece dropped");
                    false
                }
            }
            GameEvent::Died { species } => {
                if territory.piece(species).is_some_and(|p| p.owner == owner) {
                    territory
                        .eliminate(species)
                        .inspect_err(|e| debug!(piece = %species, reason = %e, "Died dropped"))
                        .is_ok()
                } else {
                    debug!(piece = %species, controller = owner, "Died for a foreign piece dropped");
                    false
                }
            }
            GameEvent::Mutate { mutation } => match self.catalog.get(mutation) {
                Some(node) => {
                    let touched = territory.update_chains(owner, |c| c.apply(Arc::clone(node)));
                    info!(controller = owner, mutation = %mutation, pieces = touched, "Species mutated");
                    true
                }
                None => {
                    debug!(mutation = %mutation, "Unknown trait dropped");
                    false
                }
            },
            GameEvent::Unevolve { mutation } => {
                let touched = territory.update_chains(owner, |c| c.unapply(mutation));
                info!(controller = owner, mutation = %mutation, pieces = touched, "Species unevolved");
                true
            }
            GameEvent::Move { .. } => {
                debug!(controller = owner, "Move request outside the host dropped");
                false
            }
        };
        if applied {
            self.listeners.event(owner, &info.evt);
        }
    }

    // -------------------------------------------------------------------
    // Readiness
    // -------------------------------------------------------------------

    /// Announce the local human as an interactive controller.
    pub fn announce(&mut self) {
        let seat = self.is_host().then(|| self.replica.registry.next_seat());
        let spawn = SpawnInfo::new(
            self.local_player.as_str(),
            SpawnClass::Interactive,
            Vec3::default(),
        )
        .with_extra(SpawnExtra {
            seat,
            ..SpawnExtra::default()
        });
        self.handle(Action::spawn(self.local_player.as_str(), spawn));
    }

    /// One readiness poll. Returns `true` once the session is playing.
    ///
    /// The first poll signals local readiness. On the host, the session moves
    /// to `Playing` as soon as every controller is ready and enough humans
    /// have joined; a client waits for the host's `Playing`.
    pub fn poll_start(&mut self) -> bool {
        if self.state == GameState::Playing {
            return true;
        }
        if self.state == GameState::UnReady {
            let local = self.local_player.clone();
            if self.is_host() {
                self.handle(Action::game_state(local.as_str(), GameState::Ready));
            } else {
                self.apply_state(GameState::Ready);
            }
            self.handle(Action::update(
                local.as_str(),
                local.as_str(),
                "ready",
                serde_json::Value::Bool(true),
            ));
        }
        if !self.is_host() {
            return false;
        }

        let registry = &self.replica.registry;
        let humans = registry.interactive_count();
        if !registry.all_ready() || humans < self.expected_players {
            debug!(
                controllers = registry.len(),
                humans,
                expected = self.expected_players,
                "Waiting for players"
            );
            return false;
        }
        info!(controllers = registry.len(), "Everyone is ready");
        self.handle(Action::game_state(SYSTEM_INVOKER, GameState::Playing));
        true
    }

    // -------------------------------------------------------------------
    // Moves and turns
    // -------------------------------------------------------------------

    /// Resolve a move with authority and emit its outcome. Host only.
    pub fn place_with_authority(&mut self, piece: &str, target: &str) -> MoveResolution {
        let resolution = placement::resolve_move(
            &self.replica.territory,
            &self.rules,
            piece,
            target,
            true,
            &mut *self.rng,
        );
        let Some(owner) = self.replica.territory.piece(piece).map(|p| p.owner.clone()) else {
            return resolution;
        };
        let evt = match resolution {
            MoveResolution::Placed => GameEvent::Place {
                field: target.to_owned(),
                species: piece.to_owned(),
            },
            MoveResolution::Died => GameEvent::Died {
                species: piece.to_owned(),
            },
            MoveResolution::Blocked(_) | MoveResolution::Stalled => return resolution,
        };
        self.handle(Action::event(owner.as_str(), owner.as_str(), evt));
        resolution
    }

    /// Ask for a move: resolved here on the host, sent to the host otherwise.
    ///
    /// Returns the resolution on the host and `None` on a client.
    pub fn request_move(&mut self, piece: &str, target: &str) -> Option<MoveResolution> {
        if self.is_host() {
            return Some(self.place_with_authority(piece, target));
        }
        let owner = self
            .replica
            .territory
            .piece(piece)
            .map_or_else(|| self.local_player.clone(), |p| p.owner.clone());
        let evt = GameEvent::Move {
            field: target.to_owned(),
            species: piece.to_owned(),
        };
        self.handle(Action::event(self.local_player.as_str(), owner.as_str(), evt));
        None
    }

    /// Whether the local player may ask to move `piece` onto `target`.
    ///
    /// Checked against this participant's replica before an intent ends the
    /// local turn. The host still decides the move.
    ///
    /// # Errors
    ///
    /// [`IntentError::ForeignPiece`] for a piece the local player does not
    /// own, [`IntentError::Board`] for anything [`Territory::check_move`]
    /// refuses.
    pub fn check_intent(&self, piece: &str, target: &str) -> Result<(), IntentError> {
        let territory = &self.replica.territory;
        if let Some(p) = territory.piece(piece).filter(|p| p.owner != self.local_player) {
            return Err(IntentError::ForeignPiece {
                piece: piece.to_owned(),
                owner: p.owner.clone(),
            });
        }
        territory.check_move(piece, target)?;
        Ok(())
    }

    fn remote_move(&mut self, controller: &str, piece: &str, target: &str) {
        let owner = self.replica.territory.piece(piece).map(|p| p.owner.as_str());
        let owns = owner.is_some_and(|owner| {
            self.replica
                .registry
                .get(controller)
                .is_some_and(|c| c.identity.matches(owner))
        });
        if !owns {
            debug!(controller, piece, "Move request for a foreign piece dropped");
            return;
        }
        if self.enforce_turns && !self.scheduler.is_active(controller) {
            debug!(controller, piece, "Move request out of turn dropped");
            return;
        }
        self.place_with_authority(piece, target);
    }

    /// Commit the outcome of a turn this participant ran, then hand the turn
    /// on. Returns `false` if the turn had already moved on.
    pub fn commit_turn(&mut self, turn: u64, controller: &str, outcome: &TurnOutcome) -> bool {
        if !self.scheduler.is_current(turn) {
            debug!(controller, turn, "Stale turn outcome ignored");
            return false;
        }
        match outcome {
            TurnOutcome::Moved { piece, target } => {
                self.request_move(piece, target);
            }
            TurnOutcome::Deliberate => {
                let chosen = agent::choose_move(
                    &self.replica.territory,
                    controller,
                    self.rules.agent_move_chance,
                    &mut *self.rng,
                );
                if let Some(m) = chosen {
                    self.request_move(&m.piece, &m.target);
                }
            }
            TurnOutcome::Pass | TurnOutcome::TimedOut => {}
        }
        if let Some(next) = TurnScheduler::next_controller(&self.replica.registry, controller) {
            self.handle(Action::invoke_controller(controller, next));
        }
        true
    }

    // -------------------------------------------------------------------
    // Breeding
    // -------------------------------------------------------------------

    /// Allow breeding ticks to act.
    pub fn start_breeding(&mut self) {
        self.breeding = true;
    }

    /// One breeding tick: trait rolls and births for every controller.
    ///
    /// Only the host breeds, and only while playing.
    pub fn breed_tick(&mut self) {
        if !self.breeding || !self.is_host() || self.state != GameState::Playing {
            return;
        }
        for owner in self.replica.registry.names() {
            if self.rng.random::<f64>() < self.rules.trait_roll_chance {
                self.roll_traits(&owner);
            }
            let plan = placement::plan_breeding(
                &self.replica.territory,
                &self.rules,
                &owner,
                &mut *self.rng,
            );
            if let Some(plan) = plan {
                self.spawn_offspring(&owner, plan);
            }
        }
    }

    /// Gain one trait, then maybe shed the least useful one.
    ///
    /// Both the shed chance and the shed trait come from the chain as it was
    /// before the roll, so a trait gained here is never the one lost.
    pub fn roll_traits(&mut self, owner: &str) {
        let held = self.replica.territory.held_kinds(owner);
        let chain = placement::species_chain(&self.replica.territory, owner);
        if let Some(node) = select_mutation(&self.catalog, &chain, &held, false, &mut *self.rng) {
            self.handle(Action::event(
                SYSTEM_INVOKER,
                owner,
                GameEvent::Mutate {
                    mutation: node.name.clone(),
                },
            ));
        }

        if self.rng.random::<f64>() >= unevolve_probability(chain.len()) {
            return;
        }
        if let Some(node) = select_unevolve(&chain, UnevolvePolicy::Unused, &held) {
            self.handle(Action::event(
                SYSTEM_INVOKER,
                owner,
                GameEvent::Unevolve {
                    mutation: node.name.clone(),
                },
            ));
        }
    }

    fn spawn_offspring(&mut self, owner: &str, plan: BreedPlan) {
        let Some(cell) = self.replica.territory.cell(&plan.cell) else {
            return;
        };
        let position = cell.position;
        let color = self.replica.registry.get(owner).and_then(|c| c.color);
        debug!(parent = %plan.parent, offspring = %plan.offspring, cell = %plan.cell, "Birth");
        let spawn = SpawnInfo::new(plan.offspring, SpawnClass::Piece, position).with_extra(
            SpawnExtra {
                owner: Some(owner.to_owned()),
                color,
                field: Some(plan.cell),
                seat: None,
            },
        );
        self.handle(Action::spawn(SYSTEM_INVOKER, spawn));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use sotf_mutation::TraitDef;
    use sotf_types::{Color, TerrainKind};
    use sotf_world::{BoardLayout, WorldError};

    use super::*;
    use crate::channel::RecordingChannel;
    use crate::listeners::RecordingListener;
    use crate::testing::ConstRng;

    fn config(role: HandlerRole) -> GameConfig {
        let mut config = GameConfig::default();
        config.participant.role = role;
        config.participant.player = String::from("alice");
        config.board.size = 3;
        config
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![
                TraitDef::named("Gills").with_bonus(TerrainKind::Water, 0.8),
                TraitDef::named("Lungs").with_bonus(TerrainKind::Forest, 0.6),
            ])
            .unwrap(),
        )
    }

    fn handler(role: HandlerRole, rng: ConstRng) -> (GameHandler, RecordingChannel, RecordingListener) {
        let channel = RecordingChannel::new();
        let listener = RecordingListener::new();
        let mut handler =
            GameHandler::new(&config(role), catalog(), Box::new(channel.clone()), Box::new(rng));
        handler.add_listener(Box::new(listener.clone()));
        (handler, channel, listener)
    }

    fn controller(name: &str, class: SpawnClass, seat: u32) -> Action {
        let info = SpawnInfo::new(name, class, Vec3::default()).with_extra(SpawnExtra {
            seat: Some(seat),
            ..SpawnExtra::default()
        });
        Action::spawn(name, info)
    }

    fn board(handler: &mut GameHandler) {
        let layout = BoardLayout::new(3, 5);
        for coord in layout.coords() {
            let info = SpawnInfo::new(
                BoardLayout::cell_name(coord),
                SpawnClass::Terrain(TerrainKind::Forest),
                layout.position(coord),
            );
            handler.handle(Action::spawn(SYSTEM_INVOKER, info));
        }
    }

    fn piece(name: &str, owner: &str, cell: &str) -> Action {
        let info = SpawnInfo::new(name, SpawnClass::Piece, Vec3::default()).with_extra(SpawnExtra {
            owner: Some(owner.to_owned()),
            color: Some(Color::new(1.0, 0.0, 0.0)),
            field: Some(cell.to_owned()),
            seat: None,
        });
        Action::spawn(SYSTEM_INVOKER, info)
    }

    #[test]
    fn host_applies_before_broadcast() {
        let (mut host, channel, _) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        assert!(host.registry().get("alice").is_some());
        assert_eq!(channel.sent().len(), 1);
    }

    #[test]
    fn client_only_transmits() {
        let (mut client, channel, listener) = handler(HandlerRole::Client, ConstRng::low());
        client.handle(controller("alice", SpawnClass::Interactive, 0));
        assert!(client.registry().is_empty());
        assert_eq!(channel.sent().len(), 1);
        assert!(listener.lines().is_empty());

        let echo = channel.sent().into_iter().next().unwrap();
        client.receive_remote(echo);
        assert!(client.registry().get("alice").is_some());
        assert_eq!(listener.lines(), vec!["spawn alice"]);
    }

    #[test]
    fn unresolvable_actions_are_dropped_silently() {
        let (mut host, _, listener) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(Action::update("x", "nobody", "ready", json!(true)));
        host.handle(Action::event(
            "x",
            "nobody",
            GameEvent::Died {
                species: String::from("p"),
            },
        ));
        host.handle(Action::invoke_controller("x", "nobody"));
        assert!(listener.lines().is_empty());
        assert!(host.scheduler().active().is_none());
    }

    #[test]
    fn state_never_regresses() {
        let (mut host, _, listener) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(Action::game_state("x", GameState::Playing));
        host.handle(Action::game_state("x", GameState::Ready));
        assert_eq!(host.state(), GameState::Playing);
        assert_eq!(listener.lines(), vec!["state Playing"]);
    }

    #[test]
    fn pieces_land_on_their_field_and_colour_the_owner() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        let p = host.territory().piece("SpeciesChip1_1").unwrap();
        assert_eq!(p.cell(), Some("FieldChip1_1"));
        assert!(host.registry().get("alice").unwrap().color.is_some());
    }

    #[test]
    fn events_only_reach_controllers() {
        let (mut host, _, listener) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        host.handle(Action::event(
            "x",
            "FieldChip0_0",
            GameEvent::Mutate {
                mutation: String::from("Gills"),
            },
        ));
        assert!(host.territory().piece("SpeciesChip1_1").unwrap().chain.is_empty());

        host.handle(Action::event(
            "x",
            "alice",
            GameEvent::Mutate {
                mutation: String::from("Gills"),
            },
        ));
        let chain = &host.territory().piece("SpeciesChip1_1").unwrap().chain;
        assert_eq!(chain.names(), vec!["Gills"]);
        assert!(listener.lines().contains(&String::from("event alice mutate")));

        host.handle(Action::event(
            "x",
            "alice",
            GameEvent::Unevolve {
                mutation: String::from("Gills"),
            },
        ));
        assert!(host.territory().piece("SpeciesChip1_1").unwrap().chain.is_empty());
    }

    #[test]
    fn place_keeps_one_piece_per_owner_per_cell() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        host.handle(piece("SpeciesChip1_2", "alice", "FieldChip0_1"));

        let r = host.place_with_authority("SpeciesChip1_1", "FieldChip0_1");
        assert!(matches!(r, MoveResolution::Blocked(_)));
        assert_eq!(host.territory().cell("FieldChip0_1").unwrap().len(), 1);

        // A low draw passes both rolls.
        let r = host.place_with_authority("SpeciesChip1_1", "FieldChip1_0");
        assert_eq!(r, MoveResolution::Placed);
        assert_eq!(
            host.territory().piece("SpeciesChip1_1").unwrap().cell(),
            Some("FieldChip1_0")
        );
    }

    #[test]
    fn full_cells_stay_full() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        for (seat, name) in ["a", "b", "c", "d", "e", "f"].into_iter().enumerate() {
            let seat = u32::try_from(seat).unwrap();
            host.handle(controller(name, SpawnClass::Automated, seat));
        }
        board(&mut host);
        for name in ["a", "b", "c", "d", "e"] {
            host.handle(piece(&format!("{name}_1"), name, "FieldChip1_1"));
        }
        host.handle(piece("f_1", "f", "FieldChip0_1"));
        let r = host.place_with_authority("f_1", "FieldChip1_1");
        assert!(matches!(r, MoveResolution::Blocked(_)));
        assert_eq!(host.territory().cell("FieldChip1_1").unwrap().len(), 5);
    }

    #[test]
    fn moves_only_reach_neighbouring_cells() {
        let (mut host, channel, _) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        let before = channel.sent().len();

        let r = host.request_move("SpeciesChip1_1", "FieldChip2_0").unwrap();
        assert!(matches!(r, MoveResolution::Blocked(WorldError::NotAdjacent { .. })));
        assert_eq!(
            host.territory().piece("SpeciesChip1_1").unwrap().cell(),
            Some("FieldChip1_1")
        );
        assert_eq!(channel.sent().len(), before);

        // A replicated place across the board is refused the same way.
        host.handle(Action::event(
            "alice",
            "alice",
            GameEvent::Place {
                field: String::from("FieldChip2_2"),
                species: String::from("SpeciesChip1_1"),
            },
        ));
        assert_eq!(
            host.territory().piece("SpeciesChip1_1").unwrap().cell(),
            Some("FieldChip1_1")
        );
    }

    #[test]
    fn intents_are_checked_before_they_end_a_turn() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        host.handle(controller("bob", SpawnClass::Interactive, 1));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        host.handle(piece("SpeciesChip2_1", "bob", "FieldChip0_1"));

        assert!(host.check_intent("SpeciesChip1_1", "FieldChip1_0").is_ok());
        assert!(matches!(
            host.check_intent("SpeciesChip1_1", "FieldChip2_2"),
            Err(IntentError::Board(WorldError::NotAdjacent { .. }))
        ));
        assert!(matches!(
            host.check_intent("SpeciesChip2_1", "FieldChip0_0"),
            Err(IntentError::ForeignPiece { ref owner, .. }) if owner == "bob"
        ));
        assert!(matches!(
            host.check_intent("nobody", "FieldChip0_0"),
            Err(IntentError::Board(WorldError::PieceNotFound(_)))
        ));
    }

    #[test]
    fn died_for_a_foreign_piece_is_dropped() {
        let (mut host, _, listener) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        host.handle(controller("bob", SpawnClass::Interactive, 1));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));

        host.handle(Action::event(
            "bob",
            "bob",
            GameEvent::Died {
                species: String::from("SpeciesChip1_1"),
            },
        ));
        assert!(host.territory().piece("SpeciesChip1_1").unwrap().is_alive());
        assert!(!listener.lines().iter().any(|l| l.starts_with("event bob")));

        host.handle(Action::event(
            "alice",
            "alice",
            GameEvent::Died {
                species: String::from("SpeciesChip1_1"),
            },
        ));
        assert!(!host.territory().piece("SpeciesChip1_1").unwrap().is_alive());
        assert!(listener.lines().contains(&String::from("event alice died")));
    }

    #[test]
    fn stalled_move_emits_nothing() {
        let (mut host, channel, _) = handler(HandlerRole::Host, ConstRng::high());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        let before = channel.sent().len();
        let r = host.place_with_authority("SpeciesChip1_1", "FieldChip1_0");
        assert_eq!(r, MoveResolution::Stalled);
        assert_eq!(channel.sent().len(), before);
    }

    #[test]
    fn remote_move_requests_are_resolved_not_forwarded() {
        let (mut host, channel, _) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        host.handle(controller("bob", SpawnClass::Interactive, 1));
        board(&mut host);
        host.handle(piece("SpeciesChip2_1", "bob", "FieldChip1_1"));

        let request = |who: &str| {
            Action::event(
                who,
                who,
                GameEvent::Move {
                    field: String::from("FieldChip1_0"),
                    species: String::from("SpeciesChip2_1"),
                },
            )
        };
        // Alice cannot move Bob's piece.
        host.receive_remote(request("alice"));
        assert_eq!(
            host.territory().piece("SpeciesChip2_1").unwrap().cell(),
            Some("FieldChip1_1")
        );

        host.receive_remote(request("bob"));
        assert_eq!(
            host.territory().piece("SpeciesChip2_1").unwrap().cell(),
            Some("FieldChip1_0")
        );
        let last = channel.sent().pop().unwrap();
        assert!(matches!(
            last.body,
            ActionBody::Event(EventInfo {
                evt: GameEvent::Place { .. },
                ..
            })
        ));
    }

    #[test]
    fn enforced_turns_drop_moves_out_of_turn() {
        let mut cfg = config(HandlerRole::Host);
        cfg.turns.enforce = true;
        let channel = RecordingChannel::new();
        let mut host =
            GameHandler::new(&cfg, catalog(), Box::new(channel.clone()), Box::new(ConstRng::low()));
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        host.handle(controller("bob", SpawnClass::Interactive, 1));
        board(&mut host);
        host.handle(piece("SpeciesChip2_1", "bob", "FieldChip1_1"));
        let request = Action::event(
            "bob",
            "bob",
            GameEvent::Move {
                field: String::from("FieldChip1_0"),
                species: String::from("SpeciesChip2_1"),
            },
        );

        host.handle(Action::invoke_controller(SYSTEM_INVOKER, "alice"));
        host.receive_remote(request.clone());
        assert_eq!(
            host.territory().piece("SpeciesChip2_1").unwrap().cell(),
            Some("FieldChip1_1")
        );

        host.handle(Action::invoke_controller(SYSTEM_INVOKER, "bob"));
        host.receive_remote(request);
        assert_eq!(
            host.territory().piece("SpeciesChip2_1").unwrap().cell(),
            Some("FieldChip1_0")
        );
    }

    #[test]
    fn joining_controller_gets_next_seat() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.announce();
        let join = Action::spawn(
            "bob",
            SpawnInfo::new("bob", SpawnClass::Interactive, Vec3::default()),
        );
        host.receive_remote(join.clone());
        host.receive_remote(join);
        assert_eq!(host.registry().names(), vec!["alice", "bob"]);
        assert_eq!(host.registry().get("bob").unwrap().seat, 1);
    }

    #[test]
    fn host_starts_only_when_everyone_is_ready() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.announce();
        host.handle(controller("AIPlayer1", SpawnClass::Automated, 1));
        host.handle(controller("bob", SpawnClass::Interactive, 2));

        assert!(!host.poll_start());
        assert_eq!(host.state(), GameState::Ready);
        assert!(host.registry().get("alice").unwrap().ready);

        host.receive_remote(Action::update("bob", "bob", "ready", json!(true)));
        assert!(host.poll_start());
        assert_eq!(host.state(), GameState::Playing);
    }

    #[test]
    fn client_waits_for_playing() {
        let (mut client, channel, _) = handler(HandlerRole::Client, ConstRng::low());
        assert!(!client.poll_start());
        assert_eq!(client.state(), GameState::Ready);
        assert_eq!(channel.sent().len(), 1);
        client.receive_remote(Action::game_state(SYSTEM_INVOKER, GameState::Playing));
        assert!(client.poll_start());
    }

    #[test]
    fn invoking_a_driven_controller_queues_a_turn() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.announce();
        host.handle(controller("AIPlayer1", SpawnClass::Automated, 1));
        host.handle(controller("bob", SpawnClass::Interactive, 2));

        host.handle(Action::invoke_controller(SYSTEM_INVOKER, "bob"));
        assert!(host.next_effect().is_none());
        assert!(host.scheduler().is_active("bob"));

        host.handle(Action::invoke_controller(SYSTEM_INVOKER, "AIPlayer1"));
        let effect = host.next_effect().unwrap();
        assert!(matches!(effect, Effect::TurnStarted(ref t) if t.controller == "AIPlayer1"));
    }

    #[test]
    fn committing_hands_the_turn_on() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.announce();
        host.handle(controller("AIPlayer1", SpawnClass::Automated, 1));
        host.handle(Action::invoke_controller(SYSTEM_INVOKER, "AIPlayer1"));
        let ticket = match host.next_effect() {
            Some(Effect::TurnStarted(t)) => Some(t),
            _ => None,
        }
        .unwrap();
        assert!(host.commit_turn(ticket.turn, "AIPlayer1", &TurnOutcome::Deliberate));
        assert!(host.scheduler().is_active("alice"));
        // The old ticket is stale now.
        assert!(!host.commit_turn(ticket.turn, "AIPlayer1", &TurnOutcome::Pass));
    }

    #[test]
    fn chunk_finished_fires_once() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(Action::update(SYSTEM_INVOKER, sotf_types::SPAWN_FACTORY, "spawned_count", json!(0)));
        host.handle(Action::update(SYSTEM_INVOKER, sotf_types::SPAWN_FACTORY, "expected_count", json!(9)));
        board(&mut host);
        assert_eq!(host.next_effect(), Some(Effect::ChunkFinished));
        assert!(host.next_effect().is_none());
    }

    #[test]
    fn breeding_fills_a_crowded_cell() {
        let (mut host, _, _) = handler(HandlerRole::Host, ConstRng::high());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        // Fertile in forest: reproduction 2 beats any draw.
        let mut fertile = TraitDef::named("Litters").with_bonus(TerrainKind::Forest, 1.0);
        fertile.reproduction = 2.0;
        let catalog = Arc::new(Catalog::new(vec![fertile]).unwrap());
        host.catalog = catalog;
        host.handle(Action::event(
            SYSTEM_INVOKER,
            "alice",
            GameEvent::Mutate {
                mutation: String::from("Litters"),
            },
        ));

        host.breed_tick();
        assert_eq!(host.territory().pieces_of("alice").count(), 1);

        host.handle(Action::game_state(SYSTEM_INVOKER, GameState::Playing));
        host.start_breeding();
        for _ in 0..10 {
            host.breed_tick();
        }
        let cell = host.territory().cell("FieldChip1_1").unwrap();
        assert_eq!(cell.len(), 5);
        let offspring = host.territory().piece("SpeciesChip_alice_2").unwrap();
        assert_eq!(offspring.chain.names(), vec!["Litters"]);
    }

    #[test]
    fn trait_roll_sheds_from_the_chain_it_started_with() {
        let (mut host, _, listener) = handler(HandlerRole::Host, ConstRng::low());
        host.handle(controller("alice", SpawnClass::Interactive, 0));
        board(&mut host);
        host.handle(piece("SpeciesChip1_1", "alice", "FieldChip1_1"));
        host.handle(piece("SpeciesChip1_2", "alice", "FieldChip0_1"));

        // Five traits held, so a zero draw sheds one. Fresh is of no use in
        // forest, Weak is the least useful of the five already held.
        let mut defs = vec![TraitDef::named("Weak").with_bonus(TerrainKind::Forest, 0.05)];
        for i in 1..5 {
            defs.push(TraitDef::named(format!("Keen{i}")).with_bonus(TerrainKind::Forest, 0.2));
        }
        let held: Vec<String> = defs.iter().map(|d| d.name.clone()).collect();
        defs.push(TraitDef::named("Fresh").with_bonus(TerrainKind::Water, 0.9));
        host.catalog = Arc::new(Catalog::new(defs).unwrap());
        for name in held {
            host.handle(Action::event(
                SYSTEM_INVOKER,
                "alice",
                GameEvent::Mutate { mutation: name },
            ));
        }

        host.handle(Action::game_state(SYSTEM_INVOKER, GameState::Playing));
        host.start_breeding();
        let before = listener.lines().len();
        host.breed_tick();

        let events: Vec<String> = listener
            .lines()
            .into_iter()
            .skip(before)
            .filter(|l| l.starts_with("event "))
            .collect();
        assert_eq!(events, vec!["event alice mutate", "event alice unevolve"]);
        for p in host.territory().pieces_of("alice") {
            assert_eq!(p.chain.names(), vec!["Keen1", "Keen2", "Keen3", "Keen4", "Fresh"]);
        }
    }
}

//! The async session driver.
//!
//! One task per participant owns the [`GameHandler`] and everything around
//! it. A single `tokio::select!` loop feeds it, one event at a time:
//!
//! - actions arriving over the channel,
//! - intents from the local human (console or UI),
//! - turn futures of the controllers this participant drives,
//! - the breeding interval (host only),
//! - the readiness poll, until the session is playing,
//! - the shutdown signal.
//!
//! After each event the handler's queued [`Effect`]s are drained: new turns
//! are started and, on the host, a finished board triggers species
//! placement. The loop ends on shutdown, when the channel closes, or once
//! `session.max_turns` turns have started.

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use sotf_mutation::Catalog;
use sotf_types::Action;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{GameConfig, SessionConfig, TimingConfig};
use crate::controller::{ControllerKind, TurnIntent, TurnOutcome};
use crate::dispatch::{Effect, GameHandler};
use crate::error::SessionError;
use crate::scheduler::TurnTicket;
use crate::setup::GameSetup;

/// The reason a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// `session.max_turns` turns have started.
    MaxTurnsReached,
    /// The other side of the channel is gone.
    ChannelClosed,
    /// The shutdown signal fired.
    Shutdown,
}

/// What a finished session reports.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Why the session ended.
    pub end_reason: SessionEndReason,
    /// Turns started over the whole session.
    pub turns_started: u64,
    /// Registered controllers at the end.
    pub controllers: usize,
    /// Pieces still in play at the end.
    pub pieces_alive: usize,
    /// When the session loop started.
    pub started_at: DateTime<Utc>,
    /// When the session loop ended.
    pub ended_at: DateTime<Utc>,
}

/// Load the trait catalog named in the config, or the built-in one.
pub fn load_catalog(config: &SessionConfig) -> Result<Catalog, SessionError> {
    let catalog = match &config.catalog_path {
        Some(path) => {
            info!(path = %path, "Loading trait catalog");
            Catalog::from_file(Path::new(path))?
        }
        None => Catalog::builtin()?,
    };
    info!(traits = catalog.len(), "Trait catalog ready");
    Ok(catalog)
}

type TurnFuture = BoxFuture<'static, (TurnTicket, TurnOutcome)>;

/// One participant's running session.
pub struct Session {
    handler: GameHandler,
    setup: Option<GameSetup>,
    timing: TimingConfig,
    max_turns: u64,
    inbound: mpsc::UnboundedReceiver<Action>,
    intents: mpsc::UnboundedReceiver<TurnIntent>,
    intents_open: bool,
    pending: Option<(u64, oneshot::Sender<TurnIntent>)>,
    turns: FuturesUnordered<TurnFuture>,
    started: bool,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("handler", &self.handler)
            .field("started", &self.started)
            .field("running_turns", &self.turns.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap a handler with its inbound actions and local intents.
    ///
    /// The host also gets a [`GameSetup`] to build the board.
    pub fn new(
        config: &GameConfig,
        handler: GameHandler,
        inbound: mpsc::UnboundedReceiver<Action>,
        intents: mpsc::UnboundedReceiver<TurnIntent>,
    ) -> Self {
        let setup = handler
            .is_host()
            .then(|| GameSetup::new(&config.lobby, &config.rules));
        Self {
            handler,
            setup,
            timing: config.timing,
            max_turns: config.session.max_turns,
            inbound,
            intents,
            intents_open: true,
            pending: None,
            turns: FuturesUnordered::new(),
            started: false,
        }
    }

    /// The handler and its replica.
    pub const fn handler(&self) -> &GameHandler {
        &self.handler
    }

    /// The handler, for registering listeners before the run.
    pub const fn handler_mut(&mut self) -> &mut GameHandler {
        &mut self.handler
    }

    /// Run until shutdown, channel loss, or the turn limit.
    pub async fn run<F>(&mut self, shutdown: F) -> SessionSummary
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        info!(
            role = ?self.handler.role(),
            player = %self.handler.local_player(),
            max_turns = self.max_turns,
            "Session starting"
        );

        match &self.setup {
            Some(setup) => setup.open_lobby(&mut self.handler),
            None => self.handler.announce(),
        }
        self.poll_ready();
        self.process_effects();

        let mut breed = tokio::time::interval(self.timing.breed_interval());
        breed.set_missed_tick_behavior(MissedTickBehavior::Delay);
        breed.reset();
        let mut ready = tokio::time::interval(self.timing.ready_poll());
        ready.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ready.reset();
        tokio::pin!(shutdown);

        let end_reason = loop {
            if let Some(reason) = self.end_condition() {
                break reason;
            }
            tokio::select! {
                () = &mut shutdown => break SessionEndReason::Shutdown,
                maybe = self.inbound.recv() => match maybe {
                    Some(action) => self.handler.receive_remote(action),
                    None => break SessionEndReason::ChannelClosed,
                },
                maybe = self.intents.recv(), if self.intents_open => match maybe {
                    Some(intent) => self.deliver_intent(intent),
                    None => self.intents_open = false,
                },
                Some((ticket, outcome)) = self.turns.next(), if !self.turns.is_empty() => {
                    self.finish_turn(&ticket, &outcome);
                }
                _ = breed.tick() => self.handler.breed_tick(),
                _ = ready.tick(), if !self.started => self.poll_ready(),
            }
            self.process_effects();
        };

        SessionSummary {
            end_reason,
            turns_started: self.handler.scheduler().turns_started(),
            controllers: self.handler.registry().len(),
            pieces_alive: self.handler.territory().pieces().filter(|p| p.is_alive()).count(),
            started_at,
            ended_at: Utc::now(),
        }
    }

    fn end_condition(&self) -> Option<SessionEndReason> {
        if self.handler.channel_closed() {
            return Some(SessionEndReason::ChannelClosed);
        }
        if self.max_turns > 0 && self.handler.scheduler().turns_started() >= self.max_turns {
            return Some(SessionEndReason::MaxTurnsReached);
        }
        None
    }

    fn poll_ready(&mut self) {
        if self.started || !self.handler.poll_start() {
            return;
        }
        self.started = true;
        info!("Game is playing");
        if let Some(setup) = &self.setup {
            setup.build_field(&mut self.handler);
        }
    }

    fn process_effects(&mut self) {
        while let Some(effect) = self.handler.next_effect() {
            match effect {
                Effect::TurnStarted(ticket) => self.start_turn(ticket),
                Effect::ChunkFinished => {
                    if let Some(setup) = self.setup.as_mut() {
                        setup.place_species(&mut self.handler);
                    }
                }
            }
        }
    }

    fn start_turn(&mut self, ticket: TurnTicket) {
        let Some(controller) = self.handler.registry().get(&ticket.controller) else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        let turn = controller.invoke(self.timing.turn_timeout(), self.timing.think(), rx);
        if controller.kind == ControllerKind::Interactive {
            info!(controller = %ticket.controller, turn = ticket.turn, "Your turn");
            self.pending = Some((ticket.turn, tx));
        }
        self.turns.push(async move { (ticket, turn.await) }.boxed());
    }

    /// Hand an intent to the running local turn.
    ///
    /// A move the local replica already refuses is reported and the turn
    /// stays open for another try.
    fn deliver_intent(&mut self, intent: TurnIntent) {
        let refused = match (&intent, self.pending.is_some()) {
            (TurnIntent::Move { piece, target }, true) => {
                self.handler.check_intent(piece, target).err()
            }
            _ => None,
        };
        if let Some(reason) = refused {
            warn!(?intent, %reason, "Move refused, still your turn");
            return;
        }
        match self.pending.take() {
            Some((turn, tx)) => {
                if tx.send(intent).is_err() {
                    debug!(turn, "Turn already over, intent dropped");
                }
            }
            None => debug!(?intent, "No turn in progress, intent ignored"),
        }
    }

    fn finish_turn(&mut self, ticket: &TurnTicket, outcome: &TurnOutcome) {
        if self.pending.as_ref().is_some_and(|(turn, _)| *turn == ticket.turn) {
            self.pending = None;
        }
        debug!(controller = %ticket.controller, turn = ticket.turn, ?outcome, "Turn finished");
        self.handler.commit_turn(ticket.turn, &ticket.controller, outcome);
    }
}

/// Log the end of a session.
pub fn log_session_end(summary: &SessionSummary) {
    let elapsed = summary.ended_at.signed_duration_since(summary.started_at);
    info!(
        reason = ?summary.end_reason,
        turns = summary.turns_started,
        controllers = summary.controllers,
        pieces_alive = summary.pieces_alive,
        elapsed_secs = elapsed.num_seconds(),
        "Session ended"
    );
}

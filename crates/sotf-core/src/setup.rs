//! Host-side session setup.
//!
//! Setup runs in three steps, each driven by the session:
//!
//! 1. [`GameSetup::open_lobby`] registers the host's human and the automated
//!    opponents.
//! 2. Once everyone is ready, [`GameSetup::build_field`] re-announces the
//!    roster (so late joiners learn every controller and seat) and spawns the
//!    board as one spawn chunk.
//! 3. When that chunk finishes, [`GameSetup::place_species`] gives every
//!    controller a colour, a start cell, two pieces, and its starting
//!    mutations, then hands the first turn to a random controller.
//!
//! Everything goes through [`GameHandler::handle`], so clients rebuild the
//! same board from the broadcast.

use std::sync::Arc;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::json;
use sotf_mutation::select_mutation;
use sotf_types::{
    Action, Color, GameEvent, SPAWN_FACTORY, SYSTEM_INVOKER, SpawnClass, SpawnExtra, SpawnInfo,
    Strategy, TerrainKind, Vec3,
};
use sotf_world::BoardLayout;
use tracing::{debug, info};

use crate::config::{LobbyConfig, RulesConfig};
use crate::controller::ControllerKind;
use crate::dispatch::GameHandler;
use crate::placement;

/// Piece colours handed out at start, each used at most once.
pub const PALETTE: [Color; 10] = [
    Color::new(1.0, 0.0, 0.0),
    Color::new(1.0, 1.0, 0.0),
    Color::new(0.0, 1.0, 0.0),
    Color::new(1.0, 0.0, 1.0),
    Color::new(0.0, 0.0, 1.0),
    Color::new(0.0, 1.0, 1.0),
    Color::new(0.0, 0.0, 0.0),
    Color::new(1.0, 1.0, 1.0),
    Color::new(0.4, 0.0, 0.4),
    Color::new(0.8, 0.2, 0.0),
];

/// Host-side setup state.
#[derive(Debug, Clone)]
pub struct GameSetup {
    ai_players: u32,
    start_mutations: u32,
    palette: Vec<Color>,
    placed: bool,
}

impl GameSetup {
    /// Setup for the given lobby and rules.
    pub fn new(lobby: &LobbyConfig, rules: &RulesConfig) -> Self {
        Self {
            ai_players: lobby.ai_players,
            start_mutations: rules.start_mutations,
            palette: PALETTE.to_vec(),
            placed: false,
        }
    }

    /// Whether species have been placed.
    pub const fn is_placed(&self) -> bool {
        self.placed
    }

    /// Register the host's human and the automated opponents.
    pub fn open_lobby(&self, handler: &mut GameHandler) {
        handler.announce();
        let local = handler.local_player().to_owned();
        handler.handle(Action::update(
            local.as_str(),
            local.as_str(),
            "strategy",
            json!(Strategy::R),
        ));
        for i in 1..=self.ai_players {
            let name = format!("AIPlayer{i}");
            let seat = handler.registry().next_seat();
            let info = SpawnInfo::new(name.as_str(), SpawnClass::Automated, Vec3::default())
                .with_extra(SpawnExtra {
                    seat: Some(seat),
                    ..SpawnExtra::default()
                });
            handler.handle(Action::spawn(SYSTEM_INVOKER, info));
        }
        info!(
            controllers = handler.registry().len(),
            ai_players = self.ai_players,
            "Lobby open"
        );
    }

    /// Re-announce the roster and spawn the board.
    pub fn build_field(&self, handler: &mut GameHandler) {
        let roster: Vec<Action> = handler
            .registry()
            .iter()
            .map(|c| {
                let class = match c.kind {
                    ControllerKind::Interactive => SpawnClass::Interactive,
                    ControllerKind::Automated => SpawnClass::Automated,
                };
                let info = SpawnInfo::new(c.name(), class, Vec3::default()).with_extra(
                    SpawnExtra {
                        seat: Some(c.seat),
                        color: c.color,
                        ..SpawnExtra::default()
                    },
                );
                Action::spawn(c.name(), info)
            })
            .collect();
        for action in roster {
            handler.handle(action);
        }

        let layout = handler.territory().layout();
        handler.handle(Action::update(SYSTEM_INVOKER, SPAWN_FACTORY, "spawned_count", json!(0)));
        handler.handle(Action::update(
            SYSTEM_INVOKER,
            SPAWN_FACTORY,
            "expected_count",
            json!(layout.cell_count()),
        ));
        for coord in layout.coords() {
            let terrain = TerrainKind::ALL
                .choose(handler.rng())
                .copied()
                .unwrap_or(TerrainKind::Forest);
            let info = SpawnInfo::new(
                BoardLayout::cell_name(coord),
                SpawnClass::Terrain(terrain),
                layout.position(coord),
            );
            handler.handle(Action::spawn(SYSTEM_INVOKER, info));
        }
        info!(size = layout.size, cells = layout.cell_count(), "Field built");
    }

    /// Place every controller's species and start the game. Runs once.
    pub fn place_species(&mut self, handler: &mut GameHandler) {
        if self.placed {
            return;
        }
        self.placed = true;

        let names = handler.registry().names();
        let mut free: Vec<String> = handler.territory().cells().map(|c| c.name.clone()).collect();
        for (index, owner) in names.iter().enumerate() {
            if free.is_empty() {
                debug!(controller = %owner, "No start cell left");
                break;
            }
            let start = free.swap_remove(handler.rng().random_range(0..free.len()));
            let color = self.take_color(handler);
            let i = index.saturating_add(1);

            let open: Vec<String> = handler
                .territory()
                .neighbours(&start)
                .into_iter()
                .filter(|c| c.is_empty())
                .map(|c| c.name.clone())
                .collect();
            let second = open.choose(handler.rng()).cloned().unwrap_or_else(|| start.clone());
            Self::spawn_start_piece(handler, &format!("SpeciesChip{i}_1"), owner, color, &start);
            Self::spawn_start_piece(handler, &format!("SpeciesChip{i}_2"), owner, color, &second);
            free.retain(|c| *c != second);

            for _ in 0..self.start_mutations {
                let chain = placement::species_chain(handler.territory(), owner);
                let held = handler.territory().held_kinds(owner);
                let catalog = Arc::clone(handler.catalog());
                let Some(node) = select_mutation(&catalog, &chain, &held, true, handler.rng()) else {
                    break;
                };
                handler.handle(Action::event(
                    SYSTEM_INVOKER,
                    owner.as_str(),
                    GameEvent::Mutate {
                        mutation: node.name.clone(),
                    },
                ));
            }
            info!(controller = %owner, start = %start, "Species placed");
        }

        handler.start_breeding();
        if let Some(first) = names.choose(handler.rng()).cloned() {
            info!(controller = %first, "First turn");
            handler.handle(Action::invoke_controller(SYSTEM_INVOKER, first));
        }
    }

    fn take_color(&mut self, handler: &mut GameHandler) -> Option<Color> {
        if self.palette.is_empty() {
            return None;
        }
        let index = handler.rng().random_range(0..self.palette.len());
        Some(self.palette.swap_remove(index))
    }

    fn spawn_start_piece(
        handler: &mut GameHandler,
        name: &str,
        owner: &str,
        color: Option<Color>,
        cell: &str,
    ) {
        let Some(position) = handler.territory().cell(cell).map(|c| c.position) else {
            return;
        };
        let info = SpawnInfo::new(name, SpawnClass::Piece, position).with_extra(SpawnExtra {
            owner: Some(owner.to_owned()),
            color,
            field: Some(cell.to_owned()),
            seat: None,
        });
        handler.handle(Action::spawn(SYSTEM_INVOKER, info));
    }
}

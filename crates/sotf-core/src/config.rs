//! Configuration loading and typed config structures for a game session.
//!
//! The canonical configuration lives in `sotf-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file at all)
//! yields a playable single-host session against automated opponents.
//!
//! Environment variables override the participant and transport settings:
//! `SOTF_ROLE`, `SOTF_PLAYER`, `SOTF_SESSION`, and `NATS_URL`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use sotf_types::HandlerRole;
use sotf_world::BoardLayout;
use tracing::{info, warn};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level game configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameConfig {
    /// Session identity and bounds.
    #[serde(default)]
    pub session: SessionConfig,

    /// Who this process plays as.
    #[serde(default)]
    pub participant: ParticipantConfig,

    /// Board dimensions.
    #[serde(default)]
    pub board: BoardConfig,

    /// Probabilities of the placement, breeding, and agent rules.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Delays and intervals.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Turn enforcement.
    #[serde(default)]
    pub turns: TurnsConfig,

    /// Who has to join before the game starts.
    #[serde(default)]
    pub lobby: LobbyConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,
}

impl GameConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be loaded.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            return Self::from_file(path);
        }
        warn!(path = %path.display(), "Config file not found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply every environment override.
    pub fn apply_env_overrides(&mut self) {
        self.infrastructure.apply_env_overrides();
        if let Ok(val) = std::env::var("SOTF_ROLE") {
            match HandlerRole::parse(&val) {
                Some(role) => self.participant.role = role,
                None => warn!(value = %val, "Ignoring invalid SOTF_ROLE"),
            }
        }
        if let Ok(val) = std::env::var("SOTF_PLAYER") {
            self.participant.player = val;
        }
        if let Ok(val) = std::env::var("SOTF_SESSION") {
            self.session.name = val;
        }
    }
}

/// Session identity and bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Session name; scopes the message subjects.
    #[serde(default = "default_session_name")]
    pub name: String,

    /// Random seed. `0` draws one from the OS.
    #[serde(default)]
    pub seed: u64,

    /// Stop after this many turns. `0` means unlimited.
    #[serde(default)]
    pub max_turns: u64,

    /// Trait catalog file. Unset uses the built-in catalog.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            seed: 0,
            max_turns: 0,
            catalog_path: None,
        }
    }
}

/// Who this process plays as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParticipantConfig {
    /// Host or client.
    #[serde(default)]
    pub role: HandlerRole,

    /// Display name of the local human controller.
    #[serde(default = "default_player")]
    pub player: String,
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            role: HandlerRole::Host,
            player: default_player(),
        }
    }
}

/// Board dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BoardConfig {
    /// Cells per row and column.
    #[serde(default = "default_board_size")]
    pub size: u32,

    /// Pieces per cell.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            size: default_board_size(),
            capacity: default_capacity(),
        }
    }
}

impl BoardConfig {
    /// The board layout these settings describe.
    pub const fn layout(self) -> BoardLayout {
        BoardLayout::new(self.size, self.capacity)
    }
}

/// Probabilities used by placement, breeding, trait rolls, and agents.
///
/// A move succeeds when `random <= activity * move_activity_scale +
/// move_activity_floor`; the piece then survives when `random <= survival *
/// survival_scale + survival_floor`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RulesConfig {
    /// Weight of the activity rating in the move check.
    #[serde(default = "default_move_activity_scale")]
    pub move_activity_scale: f64,

    /// Baseline move success.
    #[serde(default = "default_floor")]
    pub move_activity_floor: f64,

    /// Weight of the survival rating in the survival check.
    #[serde(default = "default_survival_scale")]
    pub survival_scale: f64,

    /// Baseline survival.
    #[serde(default = "default_floor")]
    pub survival_floor: f64,

    /// Per-controller chance of a trait roll on each breeding tick.
    #[serde(default = "default_trait_roll_chance")]
    pub trait_roll_chance: f64,

    /// Chance that an automated controller attempts a move on its turn.
    #[serde(default = "default_half")]
    pub agent_move_chance: f64,

    /// Chance of breeding onto a cell the owner holds at most this many on.
    #[serde(default = "default_half")]
    pub breed_coin: f64,

    /// Owners with more than this many pieces on a cell always breed there.
    #[serde(default = "default_breed_crowd")]
    pub breed_crowd: usize,

    /// Forced mutations every species starts with.
    #[serde(default = "default_start_mutations")]
    pub start_mutations: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            move_activity_scale: default_move_activity_scale(),
            move_activity_floor: default_floor(),
            survival_scale: default_survival_scale(),
            survival_floor: default_floor(),
            trait_roll_chance: default_trait_roll_chance(),
            agent_move_chance: default_half(),
            breed_coin: default_half(),
            breed_crowd: default_breed_crowd(),
            start_mutations: default_start_mutations(),
        }
    }
}

/// Delays and intervals, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// How long an interactive controller may take before passing.
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,

    /// How long an automated controller thinks before acting.
    #[serde(default = "default_think_ms")]
    pub think_ms: u64,

    /// Interval of the breeding loop.
    #[serde(default = "default_breed_interval_ms")]
    pub breed_interval_ms: u64,

    /// Interval at which readiness is polled before the start.
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_timeout_ms: default_turn_timeout_ms(),
            think_ms: default_think_ms(),
            breed_interval_ms: default_breed_interval_ms(),
            ready_poll_ms: default_ready_poll_ms(),
        }
    }
}

impl TimingConfig {
    /// Interactive turn timeout.
    pub const fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    /// Automated thinking delay.
    pub const fn think(&self) -> Duration {
        Duration::from_millis(self.think_ms)
    }

    /// Breeding interval.
    pub const fn breed_interval(&self) -> Duration {
        Duration::from_millis(self.breed_interval_ms)
    }

    /// Readiness poll interval.
    pub const fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }
}

/// Turn enforcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TurnsConfig {
    /// Drop moves from controllers that do not hold the turn.
    #[serde(default)]
    pub enforce: bool,
}

/// Lobby requirements.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LobbyConfig {
    /// Interactive controllers that must be registered before starting.
    #[serde(default = "default_expected_players")]
    pub expected_players: usize,

    /// Automated controllers the host adds (`AIPlayer1`, `AIPlayer2`, ...).
    #[serde(default = "default_ai_players")]
    pub ai_players: u32,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            expected_players: default_expected_players(),
            ai_players: default_ai_players(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

impl InfrastructureConfig {
    /// Override the NATS URL with `NATS_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_session_name() -> String {
    String::from("sotf")
}

fn default_player() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("Player-{}", id.chars().take(8).collect::<String>())
}

const fn default_board_size() -> u32 {
    10
}

const fn default_capacity() -> usize {
    5
}

const fn default_move_activity_scale() -> f64 {
    0.6
}

const fn default_survival_scale() -> f64 {
    0.66
}

const fn default_floor() -> f64 {
    0.34
}

const fn default_trait_roll_chance() -> f64 {
    0.05
}

const fn default_half() -> f64 {
    0.5
}

const fn default_breed_crowd() -> usize {
    2
}

const fn default_start_mutations() -> u32 {
    2
}

const fn default_turn_timeout_ms() -> u64 {
    7_000
}

const fn default_think_ms() -> u64 {
    1_500
}

const fn default_breed_interval_ms() -> u64 {
    5_000
}

const fn default_ready_poll_ms() -> u64 {
    1_000
}

const fn default_expected_players() -> usize {
    1
}

const fn default_ai_players() -> u32 {
    3
}

fn default_nats_url() -> String {
    String::from("nats://localhost:4222")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_rules() {
        let config = GameConfig::default();
        assert_eq!(config.board.size, 10);
        assert_eq!(config.board.capacity, 5);
        assert_eq!(config.timing.turn_timeout_ms, 7_000);
        assert_eq!(config.timing.think_ms, 1_500);
        assert_eq!(config.timing.breed_interval_ms, 5_000);
        assert!(!config.turns.enforce);
        assert!((config.rules.trait_roll_chance - 0.05).abs() < 1e-9);
        assert!(config.participant.player.starts_with("Player-"));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
session:
  name: "friday"
  seed: 99
  max_turns: 40
participant:
  role: client
  player: "alice"
board:
  size: 6
  capacity: 4
rules:
  trait_roll_chance: 0.2
timing:
  turn_timeout_ms: 3000
turns:
  enforce: true
lobby:
  expected_players: 2
  ai_players: 1
"#;
        let config = GameConfig::parse(yaml).unwrap();
        assert_eq!(config.session.seed, 99);
        assert_eq!(config.session.max_turns, 40);
        assert_eq!(config.board.layout(), BoardLayout::new(6, 4));
        assert!((config.rules.trait_roll_chance - 0.2).abs() < 1e-9);
        assert!((config.rules.survival_scale - 0.66).abs() < 1e-9);
        assert_eq!(config.timing.turn_timeout(), Duration::from_millis(3000));
        assert_eq!(config.timing.think_ms, 1_500);
        assert!(config.turns.enforce);
        assert_eq!(config.lobby.expected_players, 2);
        assert_eq!(config.lobby.ai_players, 1);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(GameConfig::parse("").is_ok());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("sotf-config.yaml");
        if path.exists() {
            let config = GameConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}

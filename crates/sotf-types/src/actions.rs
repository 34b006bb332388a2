//! The replicated action record.
//!
//! Every state change in a session travels as an [`Action`]: a type tag, the
//! identity of whoever issued it, and a type-specific payload. On the wire an
//! action is a flat JSON object:
//!
//! ```json
//! { "invoker": "GameSetup", "type": "GameState", "info": "Playing" }
//! ```
//!
//! Actions are immutable once built; participants only ever clone and
//! forward them.

use serde::{Deserialize, Serialize};

use crate::enums::{ActionType, GameState, TerrainKind};
use crate::structs::{Color, Rotation, Vec3};

/// Reserved object name that resolves to the spawn-tracking subsystem.
pub const SPAWN_FACTORY: &str = "SpawnFactory";

/// Invoker name used for actions issued by the session itself rather than
/// by a participant (board setup, breeding, trait rolls).
pub const SYSTEM_INVOKER: &str = "GameSetup";

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A single replicated instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Identity name of the participant or subsystem that issued the action.
    #[serde(default)]
    pub invoker: String,
    /// Type tag and payload.
    #[serde(flatten)]
    pub body: ActionBody,
}

/// Type tag plus type-specific payload, serialized as `type` / `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "info")]
pub enum ActionBody {
    /// Create an entity.
    Spawn(SpawnInfo),
    /// Set one field on a resolvable target.
    Update(UpdateInfo),
    /// Free-form text.
    Message(String),
    /// Advance the session state.
    GameState(GameState),
    /// Hand the turn to a controller.
    InvokeController(InvokeControllerInfo),
    /// Deliver a gameplay event to a controller.
    Event(EventInfo),
}

impl Action {
    /// Build an action from its parts.
    pub fn new(invoker: impl Into<String>, body: ActionBody) -> Self {
        Self {
            invoker: invoker.into(),
            body,
        }
    }

    /// A `Spawn` action.
    pub fn spawn(invoker: impl Into<String>, info: SpawnInfo) -> Self {
        Self::new(invoker, ActionBody::Spawn(info))
    }

    /// An `Update` action setting `field` on `object_name` to `value`.
    pub fn update(
        invoker: impl Into<String>,
        object_name: impl Into<String>,
        field: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self::new(
            invoker,
            ActionBody::Update(UpdateInfo {
                object_name: object_name.into(),
                field: FieldUpdate {
                    name: field.into(),
                    value,
                },
            }),
        )
    }

    /// A `Message` action.
    pub fn message(invoker: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(invoker, ActionBody::Message(text.into()))
    }

    /// A `GameState` action.
    pub fn game_state(invoker: impl Into<String>, state: GameState) -> Self {
        Self::new(invoker, ActionBody::GameState(state))
    }

    /// An `InvokeController` action naming `controller`.
    pub fn invoke_controller(invoker: impl Into<String>, controller: impl Into<String>) -> Self {
        Self::new(
            invoker,
            ActionBody::InvokeController(InvokeControllerInfo {
                controller: controller.into(),
            }),
        )
    }

    /// An `Event` action delivering `evt` to `object_name`.
    pub fn event(invoker: impl Into<String>, object_name: impl Into<String>, evt: GameEvent) -> Self {
        Self::new(
            invoker,
            ActionBody::Event(EventInfo {
                object_name: object_name.into(),
                evt,
            }),
        )
    }

    /// The type tag of this action.
    pub const fn kind(&self) -> ActionType {
        match &self.body {
            ActionBody::Spawn(_) => ActionType::Spawn,
            ActionBody::Update(_) => ActionType::Update,
            ActionBody::Message(_) => ActionType::Message,
            ActionBody::GameState(_) => ActionType::GameState,
            ActionBody::InvokeController(_) => ActionType::InvokeController,
            ActionBody::Event(_) => ActionType::Event,
        }
    }

    /// Serialize to the JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse an action from its JSON wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Payload of a `Spawn` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnInfo {
    /// Name of the entity; unique per session.
    pub name: String,
    /// What kind of entity to create, see [`SpawnClass`].
    pub object_class: String,
    /// Initial position.
    #[serde(default)]
    pub position: Vec3,
    /// Initial rotation.
    #[serde(default)]
    pub rotation: Rotation,
    /// Initial scale.
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    /// Class-specific extras.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<SpawnExtra>,
}

const fn unit_scale() -> Vec3 {
    Vec3::splat(1.0)
}

impl SpawnInfo {
    /// A spawn payload with default rotation and unit scale.
    pub fn new(name: impl Into<String>, class: SpawnClass, position: Vec3) -> Self {
        Self {
            name: name.into(),
            object_class: class.as_wire().to_owned(),
            position,
            rotation: Rotation::default(),
            scale: unit_scale(),
            additional: None,
        }
    }

    /// Attach class-specific extras.
    #[must_use]
    pub fn with_extra(mut self, extra: SpawnExtra) -> Self {
        self.additional = Some(extra);
        self
    }

    /// The parsed object class, if it is one this core understands.
    pub fn class(&self) -> Option<SpawnClass> {
        SpawnClass::parse(&self.object_class)
    }
}

/// Class-specific extras of a spawn payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnExtra {
    /// Owning controller of a piece.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Display colour of a piece (and, by extension, its owner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Cell a piece is placed into on arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Turn-order seat of a controller, assigned by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<u32>,
}

/// The entity classes a `Spawn` action can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnClass {
    /// A territory cell of the given terrain.
    Terrain(TerrainKind),
    /// A game piece.
    Piece,
    /// A human-driven controller.
    Interactive,
    /// An automated controller.
    Automated,
}

impl SpawnClass {
    /// Wire name of a piece spawn.
    pub const PIECE: &'static str = "SpeciesChip";
    /// Wire name of an interactive controller spawn.
    pub const INTERACTIVE: &'static str = "SotFPlayer";
    /// Wire name of an automated controller spawn.
    pub const AUTOMATED: &'static str = "SotFAIController";

    /// The `objectClass` string for this class.
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Terrain(kind) => kind.as_str(),
            Self::Piece => Self::PIECE,
            Self::Interactive => Self::INTERACTIVE,
            Self::Automated => Self::AUTOMATED,
        }
    }

    /// Parse an `objectClass` string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            Self::PIECE => Some(Self::Piece),
            Self::INTERACTIVE => Some(Self::Interactive),
            Self::AUTOMATED => Some(Self::Automated),
            other => TerrainKind::parse(other).map(Self::Terrain),
        }
    }
}

// ---------------------------------------------------------------------------
// Update / InvokeController / Event
// ---------------------------------------------------------------------------

/// Payload of an `Update` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    /// Name of the target to resolve.
    pub object_name: String,
    /// The single field to set.
    pub field: FieldUpdate,
}

/// One named field and its new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Field name, looked up in the resolver's setter table.
    pub name: String,
    /// New value; its shape depends on the field.
    pub value: serde_json::Value,
}

/// Payload of an `InvokeController` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeControllerInfo {
    /// Identity name of the controller whose turn it is.
    pub controller: String,
}

/// Payload of an `Event` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    /// Name of the target (a controller) the event is delivered to.
    pub object_name: String,
    /// The event itself.
    pub evt: GameEvent,
}

/// Gameplay events, tagged by `name` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GameEvent {
    /// A piece moved onto a cell.
    Place {
        /// Destination cell.
        field: String,
        /// The piece that moved.
        species: String,
    },
    /// A piece was eliminated.
    Died {
        /// The eliminated piece.
        species: String,
    },
    /// A trait was gained by every piece of the controller.
    Mutate {
        /// Catalog name of the trait.
        mutation: String,
    },
    /// A trait was lost by every piece of the controller.
    Unevolve {
        /// Catalog name of the trait.
        mutation: String,
    },
    /// A client asks the host to resolve a move. Never replicated as-is.
    Move {
        /// Requested destination cell.
        field: String,
        /// The piece to move.
        species: String,
    },
}

impl GameEvent {
    /// The wire name of this event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Died { .. } => "died",
            Self::Mutate { .. } => "mutate",
            Self::Unevolve { .. } => "unevolve",
            Self::Move { .. } => "move",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_is_flat_on_the_wire() {
        let action = Action::game_state(SYSTEM_INVOKER, GameState::Playing);
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({ "invoker": "GameSetup", "type": "GameState", "info": "Playing" })
        );
    }

    #[test]
    fn event_payload_is_tagged_by_name() {
        let action = Action::event(
            "AIPlayer1",
            "AIPlayer1",
            GameEvent::Place {
                field: String::from("FieldChip0_1"),
                species: String::from("SpeciesChip1_1"),
            },
        );
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "Event");
        assert_eq!(value["info"]["objectName"], "AIPlayer1");
        assert_eq!(value["info"]["evt"]["name"], "place");
        assert_eq!(value["info"]["evt"]["field"], "FieldChip0_1");
    }

    #[test]
    fn decodes_update_from_client_json() {
        let raw = br#"{
            "type": "Update",
            "invoker": "alice",
            "info": { "objectName": "alice", "field": { "name": "ready", "value": true } }
        }"#;
        let action = Action::decode(raw).unwrap();
        assert_eq!(action.kind(), ActionType::Update);
        let info = match action.body {
            ActionBody::Update(info) => Some(info),
            _ => None,
        }
        .unwrap();
        assert_eq!(info.object_name, "alice");
        assert_eq!(info.field.name, "ready");
        assert_eq!(info.field.value, json!(true));
    }

    #[test]
    fn spawn_defaults_fill_missing_transform() {
        let raw = br#"{
            "type": "Spawn",
            "invoker": "GameSetup",
            "info": { "name": "FieldChip0_0", "objectClass": "swamp" }
        }"#;
        let action = Action::decode(raw).unwrap();
        let info = match action.body {
            ActionBody::Spawn(info) => Some(info),
            _ => None,
        }
        .unwrap();
        assert_eq!(info.class(), Some(SpawnClass::Terrain(TerrainKind::Swamp)));
        assert_eq!(info.scale, Vec3::splat(1.0));
        assert!(info.additional.is_none());
    }

    #[test]
    fn spawn_class_parses_every_wire_name() {
        assert_eq!(SpawnClass::parse("SpeciesChip"), Some(SpawnClass::Piece));
        assert_eq!(SpawnClass::parse("SotFPlayer"), Some(SpawnClass::Interactive));
        assert_eq!(SpawnClass::parse("SotFAIController"), Some(SpawnClass::Automated));
        assert_eq!(SpawnClass::parse("Camera"), None);
    }
}

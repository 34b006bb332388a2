//! Entity resolution: from a name in an action to a local object.
//!
//! Remote actions address their targets by name only. [`EntityResolver`]
//! maps a name onto the participant's [`Replica`] in a fixed order:
//!
//! 1. the reserved name [`SPAWN_FACTORY`] resolves to the spawn tracker;
//! 2. pieces, then cells, by exact name;
//! 3. controllers by identity (bare name or account display name).
//!
//! Field updates go through a setter table built once at startup. Each
//! entry maps `(target kind, field name)` to a typed setter; an unknown field
//! or a value of the wrong shape is rejected and the update is dropped.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sotf_types::{Color, FieldUpdate, SPAWN_FACTORY, Strategy, TerrainKind, Vec3};
use sotf_world::{Cell, Piece, Territory};

use crate::controller::{Controller, ControllerRegistry};

// ---------------------------------------------------------------------------
// Replicated state
// ---------------------------------------------------------------------------

/// Counts spawned entities against an expected total for one setup chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnTracker {
    /// Entities spawned since the counter was last set.
    pub spawned_count: u64,
    /// Entities the current chunk consists of. `0` disables the signal.
    pub expected_count: u64,
    finished: bool,
}

impl SpawnTracker {
    /// Count one spawn. Returns `true` exactly once per chunk, when the
    /// count reaches a non-zero expected total.
    pub fn record_spawn(&mut self) -> bool {
        self.spawned_count = self.spawned_count.saturating_add(1);
        if self.finished || self.expected_count == 0 || self.spawned_count != self.expected_count {
            return false;
        }
        self.finished = true;
        true
    }

    /// Whether the current chunk has finished.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Everything a participant replicates from the action stream.
#[derive(Debug, Clone, Default)]
pub struct Replica {
    /// Spawn counter for the chunk-finished signal.
    pub tracker: SpawnTracker,
    /// Cells and pieces.
    pub territory: Territory,
    /// Controllers in seat order.
    pub registry: ControllerRegistry,
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// What kind of object a name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKind {
    /// The spawn tracker.
    SpawnFactory,
    /// A piece.
    Piece,
    /// A cell.
    Cell,
    /// A controller.
    Controller,
}

/// A resolved target: its kind and the name it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    /// Kind of the target.
    pub kind: TargetKind,
    /// Name the target is registered under.
    pub name: String,
}

/// Why a field update was rejected.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// The target kind has no field of this name.
    #[error("{kind:?} has no updatable field {field}")]
    UnknownField {
        /// Kind of the target.
        kind: TargetKind,
        /// Requested field.
        field: String,
    },

    /// The value does not have the field's type.
    #[error("invalid value for {field}: {source}")]
    InvalidValue {
        /// Field being set.
        field: &'static str,
        /// The deserialization error.
        source: serde_json::Error,
    },

    /// The target disappeared between resolution and update.
    #[error("target {0} no longer exists")]
    Vanished(String),
}

// ---------------------------------------------------------------------------
// Setter table
// ---------------------------------------------------------------------------

type Setter<T> = fn(&mut T, &Value) -> Result<(), FieldError>;

fn typed<T: DeserializeOwned>(field: &'static str, value: &Value) -> Result<T, FieldError> {
    serde_json::from_value(value.clone()).map_err(|source| FieldError::InvalidValue { field, source })
}

fn set_spawned(t: &mut SpawnTracker, v: &Value) -> Result<(), FieldError> {
    t.spawned_count = typed("spawned_count", v)?;
    t.finished = false;
    Ok(())
}

fn set_expected(t: &mut SpawnTracker, v: &Value) -> Result<(), FieldError> {
    t.expected_count = typed("expected_count", v)?;
    t.finished = false;
    Ok(())
}

fn set_ready(c: &mut Controller, v: &Value) -> Result<(), FieldError> {
    c.ready = typed("ready", v)?;
    Ok(())
}

fn set_strategy(c: &mut Controller, v: &Value) -> Result<(), FieldError> {
    c.strategy = typed::<Strategy>("strategy", v)?;
    Ok(())
}

fn set_color(c: &mut Controller, v: &Value) -> Result<(), FieldError> {
    c.color = Some(typed::<Color>("color", v)?);
    Ok(())
}

fn set_terrain(c: &mut Cell, v: &Value) -> Result<(), FieldError> {
    c.terrain = typed::<TerrainKind>("terrain", v)?;
    Ok(())
}

fn set_capacity(c: &mut Cell, v: &Value) -> Result<(), FieldError> {
    c.capacity = typed("capacity", v)?;
    Ok(())
}

fn set_position(p: &mut Piece, v: &Value) -> Result<(), FieldError> {
    p.position = typed::<Vec3>("position", v)?;
    Ok(())
}

/// The closed set of updatable fields, per target kind.
#[derive(Debug, Clone)]
pub struct SetterTable {
    factory: BTreeMap<&'static str, Setter<SpawnTracker>>,
    controller: BTreeMap<&'static str, Setter<Controller>>,
    cell: BTreeMap<&'static str, Setter<Cell>>,
    piece: BTreeMap<&'static str, Setter<Piece>>,
}

impl Default for SetterTable {
    fn default() -> Self {
        let mut factory: BTreeMap<&'static str, Setter<SpawnTracker>> = BTreeMap::new();
        factory.insert("spawned_count", set_spawned);
        factory.insert("spawnedMeshes", set_spawned);
        factory.insert("expected_count", set_expected);
        factory.insert("meshesToSpawn", set_expected);

        let mut controller: BTreeMap<&'static str, Setter<Controller>> = BTreeMap::new();
        controller.insert("ready", set_ready);
        controller.insert("strategy", set_strategy);
        controller.insert("color", set_color);

        let mut cell: BTreeMap<&'static str, Setter<Cell>> = BTreeMap::new();
        cell.insert("terrain", set_terrain);
        cell.insert("capacity", set_capacity);

        let mut piece: BTreeMap<&'static str, Setter<Piece>> = BTreeMap::new();
        piece.insert("position", set_position);

        Self {
            factory,
            controller,
            cell,
            piece,
        }
    }
}

impl SetterTable {
    /// Whether `kind` has an updatable field called `field`.
    pub fn has_field(&self, kind: TargetKind, field: &str) -> bool {
        match kind {
            TargetKind::SpawnFactory => self.factory.contains_key(field),
            TargetKind::Controller => self.controller.contains_key(field),
            TargetKind::Cell => self.cell.contains_key(field),
            TargetKind::Piece => self.piece.contains_key(field),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves names and applies field updates against a [`Replica`].
#[derive(Debug, Clone, Default)]
pub struct EntityResolver {
    setters: SetterTable,
}

impl EntityResolver {
    /// A resolver with the standard setter table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name`. The first match in resolution order wins.
    pub fn resolve(&self, replica: &Replica, name: &str) -> Option<TargetRef> {
        let found = |kind| {
            Some(TargetRef {
                kind,
                name: name.to_owned(),
            })
        };
        if name == SPAWN_FACTORY {
            return found(TargetKind::SpawnFactory);
        }
        if replica.territory.piece(name).is_some() {
            return found(TargetKind::Piece);
        }
        if replica.territory.cell(name).is_some() {
            return found(TargetKind::Cell);
        }
        replica
            .registry
            .get(name)
            .map(|c| TargetRef {
                kind: TargetKind::Controller,
                name: c.name().to_owned(),
            })
    }

    /// Set exactly one field on a resolved target.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] if the field is unknown for the target kind,
    /// the value has the wrong shape, or the target vanished.
    pub fn apply_field_update(
        &self,
        replica: &mut Replica,
        target: &TargetRef,
        update: &FieldUpdate,
    ) -> Result<(), FieldError> {
        let unknown = || FieldError::UnknownField {
            kind: target.kind,
            field: update.name.clone(),
        };
        let vanished = || FieldError::Vanished(target.name.clone());
        let field = update.name.as_str();
        match target.kind {
            TargetKind::SpawnFactory => {
                let setter = self.setters.factory.get(field).ok_or_else(unknown)?;
                setter(&mut replica.tracker, &update.value)
            }
            TargetKind::Controller => {
                let setter = self.setters.controller.get(field).ok_or_else(unknown)?;
                let controller = replica.registry.get_mut(&target.name).ok_or_else(vanished)?;
                setter(controller, &update.value)
            }
            TargetKind::Cell => {
                let setter = self.setters.cell.get(field).ok_or_else(unknown)?;
                let cell = replica.territory.cell_mut(&target.name).ok_or_else(vanished)?;
                setter(cell, &update.value)
            }
            TargetKind::Piece => {
                let setter = self.setters.piece.get(field).ok_or_else(unknown)?;
                let piece = replica.territory.piece_mut(&target.name).ok_or_else(vanished)?;
                setter(piece, &update.value)
            }
        }
    }

    /// The setter table in use.
    pub const fn setters(&self) -> &SetterTable {
        &self.setters
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use sotf_mutation::TraitChain;
    use sotf_world::BoardLayout;

    use super::*;
    use crate::controller::ControllerKind;

    fn replica() -> Replica {
        let mut replica = Replica {
            territory: Territory::new(BoardLayout::new(2, 5)),
            ..Replica::default()
        };
        replica
            .territory
            .add_cell("FieldChip0_0", TerrainKind::Water, Vec3::new(-1.0, 0.0, -1.0))
            .unwrap();
        replica
            .territory
            .add_piece(Piece::new("SpeciesChip0_1", "alice", TraitChain::new(), Vec3::default()))
            .unwrap();
        replica
            .registry
            .register(Controller::new("alice", ControllerKind::Interactive, 0));
        replica
    }

    fn update(name: &str, value: Value) -> FieldUpdate {
        FieldUpdate {
            name: name.to_owned(),
            value,
        }
    }

    #[test]
    fn resolution_order() {
        let resolver = EntityResolver::new();
        let mut r = replica();
        let kind = |r: &Replica, n: &str| resolver.resolve(r, n).map(|t| t.kind);
        assert_eq!(kind(&r, SPAWN_FACTORY), Some(TargetKind::SpawnFactory));
        assert_eq!(kind(&r, "SpeciesChip0_1"), Some(TargetKind::Piece));
        assert_eq!(kind(&r, "FieldChip0_0"), Some(TargetKind::Cell));
        assert_eq!(kind(&r, "alice"), Some(TargetKind::Controller));
        assert_eq!(kind(&r, "nobody"), None);

        // A piece shadows a controller of the same name.
        r.territory
            .add_piece(Piece::new("alice", "alice", TraitChain::new(), Vec3::default()))
            .unwrap();
        assert_eq!(kind(&r, "alice"), Some(TargetKind::Piece));
    }

    #[test]
    fn typed_setters_apply() {
        let resolver = EntityResolver::new();
        let mut r = replica();
        let alice = resolver.resolve(&r, "alice").unwrap();
        resolver.apply_field_update(&mut r, &alice, &update("ready", json!(true))).unwrap();
        resolver.apply_field_update(&mut r, &alice, &update("strategy", json!("K"))).unwrap();
        let controller = r.registry.get("alice").unwrap();
        assert!(controller.ready);
        assert_eq!(controller.strategy, Strategy::K);

        let cell = resolver.resolve(&r, "FieldChip0_0").unwrap();
        resolver
            .apply_field_update(&mut r, &cell, &update("terrain", json!("desert")))
            .unwrap();
        assert_eq!(r.territory.cell("FieldChip0_0").unwrap().terrain, TerrainKind::Desert);

        let factory = resolver.resolve(&r, SPAWN_FACTORY).unwrap();
        resolver
            .apply_field_update(&mut r, &factory, &update("meshesToSpawn", json!(3)))
            .unwrap();
        assert_eq!(r.tracker.expected_count, 3);
    }

    #[test]
    fn unknown_or_ill_typed_fields_are_rejected() {
        let resolver = EntityResolver::new();
        let mut r = replica();
        let alice = resolver.resolve(&r, "alice").unwrap();
        let err = resolver
            .apply_field_update(&mut r, &alice, &update("wallet", json!(5)))
            .unwrap_err();
        assert!(matches!(err, FieldError::UnknownField { .. }));

        let err = resolver
            .apply_field_update(&mut r, &alice, &update("ready", json!("yes")))
            .unwrap_err();
        assert!(matches!(err, FieldError::InvalidValue { field: "ready", .. }));
        assert!(!r.registry.get("alice").unwrap().ready);
        assert!(!resolver.setters().has_field(TargetKind::Piece, "owner"));
    }

    #[test]
    fn chunk_finishes_once() {
        let mut tracker = SpawnTracker {
            expected_count: 2,
            ..SpawnTracker::default()
        };
        assert!(!tracker.record_spawn());
        assert!(tracker.record_spawn());
        assert!(tracker.is_finished());
        assert!(!tracker.record_spawn());

        let mut disabled = SpawnTracker::default();
        assert!(!disabled.record_spawn());
    }
}

//! Trait definitions and the catalog they are loaded from.
//!
//! The catalog is a JSON array of entries shaped like:
//!
//! ```json
//! {
//!   "name": "Gills",
//!   "activity": 0.8, "defense": 0.4, "agression": 0.2, "reproduction": 0.9,
//!   "boni": { "water": 0.9, "swamp": 0.5, "desert": -0.6 },
//!   "requires": ["Fins"]
//! }
//! ```
//!
//! Unknown terrain keys in `boni` are ignored with a warning so that older
//! asset files keep loading. The catalog is constructed once per session and
//! shared behind an [`Arc`]; chains hold `Arc<TraitDef>` nodes taken from it,
//! which is why host and clients end up applying identical nodes by name.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use sotf_types::TerrainKind;
use tracing::{debug, warn};

use crate::chain::Axis;
use crate::error::MutationError;

/// The catalog shipped with the game, used when no file is configured.
const BUILTIN_CATALOG: &str = include_str!("../assets/mutations.json");

/// One trait definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitDef {
    /// Unique name.
    pub name: String,
    /// Weight applied to terrain bonuses for the activity rating.
    pub activity: f64,
    /// Weight applied to terrain bonuses for the defense rating.
    pub defense: f64,
    /// Weight applied to terrain bonuses for the reproduction rating.
    pub reproduction: f64,
    /// Weight applied to terrain bonuses for the aggression rating.
    pub aggression: f64,
    /// Terrain bonuses; kinds without an entry do not influence ratings.
    pub boni: BTreeMap<TerrainKind, f64>,
    /// Prerequisite trait names; empty means always eligible.
    pub requires: Vec<String>,
}

impl TraitDef {
    /// A trait with unit weights and no bonuses.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activity: 1.0,
            defense: 1.0,
            reproduction: 1.0,
            aggression: 1.0,
            boni: BTreeMap::new(),
            requires: Vec::new(),
        }
    }

    /// Set the bonus for a terrain kind.
    #[must_use]
    pub fn with_bonus(mut self, kind: TerrainKind, bonus: f64) -> Self {
        self.boni.insert(kind, bonus);
        self
    }

    /// Add a prerequisite trait name.
    #[must_use]
    pub fn requiring(mut self, name: impl Into<String>) -> Self {
        self.requires.push(name.into());
        self
    }

    /// The raw bonus this trait alone defines for `kind`, if any.
    pub fn bonus(&self, kind: TerrainKind) -> Option<f64> {
        self.boni.get(&kind).copied()
    }

    /// The weight this trait applies on the given axis.
    pub const fn weight(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Survival => 1.0,
            Axis::Activity => self.activity,
            Axis::Defense => self.defense,
            Axis::Reproduction => self.reproduction,
            Axis::Aggression => self.aggression,
        }
    }

    /// The trait's own survival rating for `kind`: its bonus, floored at zero.
    ///
    /// Used to score candidates during a mutation draw.
    pub fn own_survival(&self, kind: TerrainKind) -> f64 {
        self.bonus(kind).map_or(0.0, |b| b.max(0.0))
    }

    /// Whether the prerequisites are met by a chain holding `present`.
    ///
    /// An empty prerequisite list is always met; otherwise at least one
    /// prerequisite has to be present.
    pub fn prerequisites_met(&self, present: &BTreeSet<&str>) -> bool {
        self.requires.is_empty() || self.requires.iter().any(|r| present.contains(r.as_str()))
    }
}

/// Catalog entry as it appears in the JSON asset.
#[derive(Debug, Deserialize)]
struct RawTraitDef {
    name: String,
    #[serde(default)]
    activity: f64,
    #[serde(default)]
    defense: f64,
    #[serde(default)]
    reproduction: f64,
    #[serde(default, alias = "agression")]
    aggression: f64,
    #[serde(default)]
    boni: BTreeMap<String, f64>,
    #[serde(default)]
    requires: Vec<String>,
}

impl From<RawTraitDef> for TraitDef {
    fn from(raw: RawTraitDef) -> Self {
        let mut boni = BTreeMap::new();
        for (key, bonus) in raw.boni {
            match TerrainKind::parse(&key) {
                Some(kind) => {
                    boni.insert(kind, bonus);
                }
                None => warn!(trait_name = %raw.name, terrain = %key, "ignoring unknown terrain in trait bonuses"),
            }
        }
        Self {
            name: raw.name,
            activity: raw.activity,
            defense: raw.defense,
            reproduction: raw.reproduction,
            aggression: raw.aggression,
            boni,
            requires: raw.requires,
        }
    }
}

/// The set of trait definitions available in a session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    traits: Vec<Arc<TraitDef>>,
}

impl Catalog {
    /// Build a catalog from definitions.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::DuplicateTrait`] if two definitions share a
    /// name, or [`MutationError::UnnamedTrait`] for an empty name.
    pub fn new(defs: Vec<TraitDef>) -> Result<Self, MutationError> {
        let mut seen = BTreeSet::new();
        let mut traits = Vec::with_capacity(defs.len());
        for (index, def) in defs.into_iter().enumerate() {
            if def.name.is_empty() {
                return Err(MutationError::UnnamedTrait { index });
            }
            if !seen.insert(def.name.clone()) {
                return Err(MutationError::DuplicateTrait(def.name));
            }
            traits.push(Arc::new(def));
        }
        Ok(Self { traits })
    }

    /// Parse a catalog from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, MutationError> {
        let raw: Vec<RawTraitDef> = serde_json::from_str(json)?;
        let catalog = Self::new(raw.into_iter().map(TraitDef::from).collect())?;
        debug!(traits = catalog.len(), "Trait catalog parsed");
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, MutationError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// The catalog bundled with the game.
    pub fn builtin() -> Result<Self, MutationError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Look a trait up by name.
    pub fn get(&self, name: &str) -> Option<&Arc<TraitDef>> {
        self.traits.iter().find(|t| t.name == name)
    }

    /// Iterate over all definitions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TraitDef>> {
        self.traits.iter()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    /// Whether the catalog has no definitions.
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.len() >= 10);
        assert!(catalog.get("Gills").is_some());
        // Every prerequisite must name a trait that exists.
        for t in catalog.iter() {
            for r in &t.requires {
                assert!(catalog.get(r).is_some(), "{} requires unknown {r}", t.name);
            }
        }
    }

    #[test]
    fn legacy_agression_spelling_and_unknown_terrain() {
        let json = r#"[{
            "name": "Claws",
            "activity": 0.5,
            "agression": 1.2,
            "boni": { "forest": 0.4, "moon": 3.0 }
        }]"#;
        let catalog = Catalog::from_json(json).unwrap();
        let claws = catalog.get("Claws").unwrap();
        assert!((claws.aggression - 1.2).abs() < 1e-9);
        assert_eq!(claws.boni.len(), 1);
        assert_eq!(claws.bonus(TerrainKind::Forest), Some(0.4));
        assert!(claws.requires.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Catalog::new(vec![TraitDef::named("Fur"), TraitDef::named("Fur")]);
        assert!(matches!(result, Err(MutationError::DuplicateTrait(name)) if name == "Fur"));
    }

    #[test]
    fn prerequisites_need_any_one_present() {
        let wings = TraitDef::named("Wings").requiring("Feathers").requiring("Membranes");
        let mut present = BTreeSet::new();
        assert!(!wings.prerequisites_met(&present));
        present.insert("Membranes");
        assert!(wings.prerequisites_met(&present));
        assert!(TraitDef::named("Fur").prerequisites_met(&BTreeSet::new()));
    }
}

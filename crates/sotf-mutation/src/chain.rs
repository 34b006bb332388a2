//! The trait stack carried by every piece.
//!
//! A chain is an ordered vector of catalog nodes, oldest first. Applying and
//! unapplying return new chains and leave the original untouched, so a parent
//! can hand its chain to offspring by cloning the `Arc`s.

use std::collections::BTreeSet;
use std::sync::Arc;

use sotf_types::TerrainKind;

use crate::catalog::TraitDef;

/// Rating axis a chain can be aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Plain terrain bonus (weight 1).
    Survival,
    /// Movement success.
    Activity,
    /// Resistance to being displaced.
    Defense,
    /// Offspring probability.
    Reproduction,
    /// Tendency to displace others.
    Aggression,
}

/// Ordered trait stack, oldest node first.
#[derive(Debug, Clone, Default)]
pub struct TraitChain {
    nodes: Vec<Arc<TraitDef>>,
}

impl TraitChain {
    /// An empty chain.
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// A chain holding `nodes` in the given order, skipping duplicate names.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Arc<TraitDef>>) -> Self {
        nodes.into_iter().fold(Self::new(), |chain, node| chain.apply(node))
    }

    /// Return a chain with `node` on top.
    ///
    /// A node whose name is already present leaves the chain unchanged.
    #[must_use]
    pub fn apply(&self, node: Arc<TraitDef>) -> Self {
        if self.contains(&node.name) {
            return self.clone();
        }
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Self { nodes }
    }

    /// Return a chain without the node called `name`.
    #[must_use]
    pub fn unapply(&self, name: &str) -> Self {
        Self {
            nodes: self.nodes.iter().filter(|n| n.name != name).cloned().collect(),
        }
    }

    /// Whether a node called `name` is in the chain.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name)
    }

    /// Node names, oldest first.
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Node names as a set, for prerequisite checks.
    pub fn name_set(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Nodes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TraitDef>> {
        self.nodes.iter()
    }

    /// The most recently applied node.
    pub fn newest(&self) -> Option<&Arc<TraitDef>> {
        self.nodes.last()
    }

    /// The first applied node.
    pub fn oldest(&self) -> Option<&Arc<TraitDef>> {
        self.nodes.first()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Mean of `bonus * weight(axis)` over the nodes that define a bonus for
    /// `kind`, floored at zero. Zero when no node defines one.
    pub fn aggregate(&self, axis: Axis, kind: TerrainKind) -> f64 {
        let (sum, count) = self
            .nodes
            .iter()
            .filter_map(|n| n.bonus(kind).map(|b| b * n.weight(axis)))
            .fold((0.0_f64, 0_u32), |(sum, count), v| (sum + v, count.saturating_add(1)));
        if count == 0 {
            return 0.0;
        }
        (sum / f64::from(count)).max(0.0)
    }

    /// Shorthand for the survival aggregate.
    pub fn survival(&self, kind: TerrainKind) -> f64 {
        self.aggregate(Axis::Survival, kind)
    }
}

impl PartialEq for TraitChain {
    fn eq(&self, other: &Self) -> bool {
        self.names() == other.names()
    }
}

impl Eq for TraitChain {}

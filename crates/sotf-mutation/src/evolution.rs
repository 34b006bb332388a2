//! Choosing which trait a species gains or loses next.
//!
//! Selection is pure: every function takes the chain and catalog by
//! reference plus a random source, and returns the chosen node. Turning the
//! choice into a `mutate` / `unevolve` event is the caller's job.
//!
//! Unforced mutation draws favour traits that suit the terrain a species
//! already lives on. Each candidate is scored by summing its own survival
//! rating over the held terrain kinds; the lowest score gets one ticket and
//! every other candidate gets `floor(score / lowest)` tickets.

use std::sync::Arc;

use rand::Rng;
use sotf_types::TerrainKind;
use tracing::debug;

use crate::catalog::{Catalog, TraitDef};
use crate::chain::TraitChain;

/// Upper bound on the tickets a single candidate can hold.
pub const MAX_TICKETS: u64 = 1_000;

/// Which node an unevolve step removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnevolvePolicy {
    /// The most recently applied node.
    Newest,
    /// The first applied node.
    Oldest,
    /// The node contributing least on the terrain the species holds.
    Unused,
}

/// Catalog nodes that may be applied to `chain`.
///
/// A node is eligible when the chain does not hold it yet and its
/// prerequisites are met. Catalog order is preserved.
pub fn eligible_traits(catalog: &Catalog, chain: &TraitChain) -> Vec<Arc<TraitDef>> {
    let present = chain.name_set();
    catalog
        .iter()
        .filter(|t| !present.contains(t.name.as_str()) && t.prerequisites_met(&present))
        .cloned()
        .collect()
}

/// Score of a candidate: its own survival rating summed over `held`.
fn fitness(candidate: &TraitDef, held: &[TerrainKind]) -> f64 {
    held.iter().map(|k| candidate.own_survival(*k)).sum()
}

/// Candidates sorted by ascending score together with their ticket counts.
pub fn mutation_tickets(
    candidates: &[Arc<TraitDef>],
    held: &[TerrainKind],
) -> Vec<(Arc<TraitDef>, u64)> {
    let mut scored: Vec<(Arc<TraitDef>, f64)> = candidates
        .iter()
        .map(|c| (Arc::clone(c), fitness(c, held)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));

    let Some(lowest) = scored.first().map(|(_, s)| *s) else {
        return Vec::new();
    };

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (node, score))| {
            let tickets = if i == 0 || lowest <= 0.0 {
                1
            } else {
                let ratio = (score / lowest).floor().clamp(1.0, 1_000.0);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let whole = ratio as u64;
                whole.min(MAX_TICKETS)
            };
            (node, tickets)
        })
        .collect()
}

/// Pick the next trait to gain, or `None` when nothing is eligible.
///
/// Forced draws are uniform over the candidates; unforced draws use the
/// ticket weighting described in the module docs.
pub fn select_mutation<R: Rng + ?Sized>(
    catalog: &Catalog,
    chain: &TraitChain,
    held: &[TerrainKind],
    forced: bool,
    rng: &mut R,
) -> Option<Arc<TraitDef>> {
    let candidates = eligible_traits(catalog, chain);
    if candidates.is_empty() {
        debug!("No eligible traits to mutate into");
        return None;
    }

    if forced {
        let index = rng.random_range(0..candidates.len());
        return candidates.get(index).cloned();
    }

    let tickets = mutation_tickets(&candidates, held);
    let total = tickets.iter().fold(0_u64, |acc, (_, t)| acc.saturating_add(*t));
    let mut draw = rng.random_range(0..total);
    for (node, count) in tickets {
        if draw < count {
            return Some(node);
        }
        draw = draw.saturating_sub(count);
    }
    None
}

/// Pick the node an unevolve step would remove. `None` for an empty chain.
pub fn select_unevolve(
    chain: &TraitChain,
    policy: UnevolvePolicy,
    held: &[TerrainKind],
) -> Option<Arc<TraitDef>> {
    match policy {
        UnevolvePolicy::Newest => chain.newest().cloned(),
        UnevolvePolicy::Oldest => chain.oldest().cloned(),
        UnevolvePolicy::Unused => {
            let mut best: Option<(&Arc<TraitDef>, f64)> = None;
            for node in chain.iter() {
                let used: f64 = held.iter().filter_map(|k| node.bonus(*k)).sum();
                match best {
                    Some((_, lowest)) if used >= lowest => {}
                    _ => best = Some((node, used)),
                }
            }
            best.map(|(node, _)| Arc::clone(node))
        }
    }
}

/// Probability that a trait roll also sheds a trait, given the chain length.
///
/// Zero up to four traits, rising linearly to one at twelve.
pub fn unevolve_probability(trait_count: usize) -> f64 {
    let n = f64::from(u32::try_from(trait_count).unwrap_or(u32::MAX));
    1.0 - (1.5 - n / 8.0).clamp(0.0, 1.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            TraitDef::named("Fins").with_bonus(TerrainKind::Water, 0.5),
            TraitDef::named("Gills")
                .with_bonus(TerrainKind::Water, 1.0)
                .requiring("Fins"),
            TraitDef::named("Fur")
                .with_bonus(TerrainKind::Alpine, 0.9)
                .with_bonus(TerrainKind::Water, 0.25),
            TraitDef::named("Lungs").with_bonus(TerrainKind::Forest, 0.4),
        ])
        .unwrap()
    }

    #[test]
    fn eligibility_respects_prerequisites_and_presence() {
        let catalog = catalog();
        let empty = TraitChain::new();
        let names: Vec<String> = eligible_traits(&catalog, &empty)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["Fins", "Fur", "Lungs"]);

        let with_fins = empty.apply(Arc::clone(catalog.get("Fins").unwrap()));
        let names: Vec<String> = eligible_traits(&catalog, &with_fins)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["Gills", "Fur", "Lungs"]);
    }

    #[test]
    fn tickets_scale_with_score_over_lowest() {
        let catalog = catalog();
        let candidates: Vec<_> = ["Fur", "Fins", "Gills"]
            .iter()
            .map(|n| Arc::clone(catalog.get(n).unwrap()))
            .collect();
        // Scores on water: Fur 0.25, Fins 0.5, Gills 1.0.
        let tickets = mutation_tickets(&candidates, &[TerrainKind::Water]);
        let summary: Vec<(&str, u64)> = tickets.iter().map(|(t, n)| (t.name.as_str(), *n)).collect();
        assert_eq!(summary, vec![("Fur", 1), ("Fins", 2), ("Gills", 4)]);
    }

    #[test]
    fn zero_lowest_score_gives_one_ticket_each() {
        let catalog = catalog();
        let candidates: Vec<_> = catalog.iter().cloned().collect();
        let tickets = mutation_tickets(&candidates, &[TerrainKind::Desert]);
        assert!(tickets.iter().all(|(_, n)| *n == 1));
    }

    #[test]
    fn exhausted_catalog_yields_nothing() {
        let catalog = catalog();
        let full = TraitChain::from_nodes(catalog.iter().cloned());
        let mut rng = SmallRng::seed_from_u64(7);
        assert!(select_mutation(&catalog, &full, &[TerrainKind::Water], false, &mut rng).is_none());
        assert!(select_mutation(&catalog, &full, &[], true, &mut rng).is_none());
    }

    #[test]
    fn draws_only_return_eligible_traits() {
        let catalog = catalog();
        let chain = TraitChain::new();
        let mut rng = SmallRng::seed_from_u64(42);
        for forced in [true, false] {
            for _ in 0..50 {
                let pick = select_mutation(&catalog, &chain, &[TerrainKind::Water], forced, &mut rng)
                    .unwrap();
                assert_ne!(pick.name, "Gills");
            }
        }
    }

    #[test]
    fn unevolve_policies() {
        let catalog = catalog();
        let chain = TraitChain::from_nodes(
            ["Fins", "Fur", "Lungs"]
                .iter()
                .map(|n| Arc::clone(catalog.get(n).unwrap())),
        );
        let held = [TerrainKind::Water];
        let newest = select_unevolve(&chain, UnevolvePolicy::Newest, &held).unwrap();
        let oldest = select_unevolve(&chain, UnevolvePolicy::Oldest, &held).unwrap();
        let unused = select_unevolve(&chain, UnevolvePolicy::Unused, &held).unwrap();
        assert_eq!(newest.name, "Lungs");
        assert_eq!(oldest.name, "Fins");
        // Lungs defines nothing on water.
        assert_eq!(unused.name, "Lungs");
        assert!(select_unevolve(&TraitChain::new(), UnevolvePolicy::Newest, &held).is_none());
    }

    #[test]
    fn unused_ties_go_to_the_oldest() {
        let chain = TraitChain::from_nodes(["A", "B", "C"].map(|n| Arc::new(TraitDef::named(n))));
        let unused = select_unevolve(&chain, UnevolvePolicy::Unused, &[TerrainKind::Swamp]).unwrap();
        assert_eq!(unused.name, "A");
    }

    #[test]
    fn unevolve_probability_curve() {
        assert!(unevolve_probability(0).abs() < 1e-9);
        assert!(unevolve_probability(4).abs() < 1e-9);
        assert!((unevolve_probability(8) - 0.5).abs() < 1e-9);
        assert!((unevolve_probability(12) - 1.0).abs() < 1e-9);
        assert!((unevolve_probability(40) - 1.0).abs() < 1e-9);
    }
}

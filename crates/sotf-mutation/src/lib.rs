//! Trait stacks ("mutation chains") for the Survival of the Fittest session core.
//!
//! A piece's evolutionary history is a chain of named trait nodes, newest on
//! top. This crate owns the chain itself, the catalog of trait definitions the
//! chain draws from, and the probabilistic rules that pick which trait is
//! gained or lost next. It performs no I/O beyond loading the catalog and
//! never mutates session state: selection returns a trait, and the caller
//! routes the outcome through action replication.
//!
//! # Modules
//!
//! - [`catalog`] -- [`TraitDef`] and the session-owned [`Catalog`]
//! - [`chain`] -- [`TraitChain`] with apply / unapply and aggregate ratings
//! - [`evolution`] -- Mutation draws, unevolve policies, saturation curve
//! - [`error`] -- Error types ([`MutationError`])

pub mod catalog;
pub mod chain;
pub mod error;
pub mod evolution;

pub use catalog::{Catalog, TraitDef};
pub use chain::{Axis, TraitChain};
pub use error::MutationError;
pub use evolution::{
    MAX_TICKETS, UnevolvePolicy, eligible_traits, mutation_tickets, select_mutation,
    select_unevolve, unevolve_probability,
};

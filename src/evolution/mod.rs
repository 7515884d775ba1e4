// src/evolution/mod.rs — Generational team evolution

pub mod builder;
pub mod controller;
pub mod selection;

pub use builder::{BuilderTeam, OneShotBuilder, TeamBuilder};
pub use controller::{EvolutionController, EvolutionSummary};
pub use selection::Candidate;

// src/lib.rs — Library root for agentevo

pub mod cli;
pub mod core;
pub mod evaluator;
pub mod evolution;
pub mod infra;
pub mod loader;
pub mod merger;
pub mod provider;
pub mod store;
pub mod tools;
pub mod util;

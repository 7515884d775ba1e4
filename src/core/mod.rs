// src/core/mod.rs — Team execution engine

pub mod agent_runner;
pub mod graph;
pub mod markers;
pub mod orchestrator;
pub mod system_prompt;
pub mod team_runner;
pub mod truncation;
pub mod types;
pub mod workspace;

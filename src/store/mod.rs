// src/store/mod.rs — Persistence for projects, team bundles, runs and evolutions

pub mod memory;
pub mod schema;
pub mod sqlite;

use crate::core::types::{Evolution, Project, Run, Team, TeamBundle};
use crate::infra::errors::EvoError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Create/read/update access to engine records.
///
/// Each call is atomic for its entity; `insert_bundle` writes a team with all
/// of its agents and tools as one unit. Listings return insertion order.
/// A run that has left `running` can no longer be updated.
pub trait Store: Send + Sync {
    // -- Projects --
    fn insert_project(&self, project: &Project) -> Result<(), EvoError>;
    fn get_project(&self, id: &str) -> Result<Option<Project>, EvoError>;
    fn list_projects(&self) -> Result<Vec<Project>, EvoError>;

    // -- Teams --
    fn insert_bundle(&self, bundle: &TeamBundle) -> Result<(), EvoError>;
    fn get_bundle(&self, team_id: &str) -> Result<Option<TeamBundle>, EvoError>;
    fn list_teams(&self) -> Result<Vec<Team>, EvoError>;

    // -- Runs --
    fn insert_run(&self, run: &Run) -> Result<(), EvoError>;
    fn update_run(&self, run: &Run) -> Result<(), EvoError>;
    fn get_run(&self, id: &str) -> Result<Option<Run>, EvoError>;
    fn list_runs(&self) -> Result<Vec<Run>, EvoError>;

    // -- Evolutions --
    fn insert_evolution(&self, evolution: &Evolution) -> Result<(), EvoError>;
    fn update_evolution(&self, evolution: &Evolution) -> Result<(), EvoError>;
    fn get_evolution(&self, id: &str) -> Result<Option<Evolution>, EvoError>;
    fn list_evolutions(&self) -> Result<Vec<Evolution>, EvoError>;

    /// Runs for one team, in insertion order.
    fn runs_for_team(&self, team_id: &str) -> Result<Vec<Run>, EvoError> {
        Ok(self
            .list_runs()?
            .into_iter()
            .filter(|r| r.team_id == team_id)
            .collect())
    }

    /// Fetch a bundle or fail with `NotFound`.
    fn require_bundle(&self, team_id: &str) -> Result<TeamBundle, EvoError> {
        self.get_bundle(team_id)?
            .ok_or_else(|| EvoError::not_found("Team", team_id))
    }
}

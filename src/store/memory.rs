// src/store/memory.rs — In-process store for tests and one-off runs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::Store;
use crate::core::types::{Evolution, Project, Run, Team, TeamBundle};
use crate::infra::errors::EvoError;

/// Map keyed by id plus insertion order.
struct Table<T> {
    rows: HashMap<String, T>,
    order: Vec<String>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, kind: &'static str, id: &str, row: T) -> Result<(), EvoError> {
        if self.rows.contains_key(id) {
            return Err(EvoError::AlreadyExists {
                kind,
                id: id.to_string(),
            });
        }
        self.rows.insert(id.to_string(), row);
        self.order.push(id.to_string());
        Ok(())
    }

    fn get(&self, id: &str) -> Option<T> {
        self.rows.get(id).cloned()
    }

    fn get_mut(&mut self, kind: &'static str, id: &str) -> Result<&mut T, EvoError> {
        self.rows
            .get_mut(id)
            .ok_or_else(|| EvoError::not_found(kind, id))
    }

    fn list(&self) -> Vec<T> {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(id).cloned())
            .collect()
    }
}

struct Inner {
    projects: Table<Project>,
    bundles: Table<TeamBundle>,
    runs: Table<Run>,
    evolutions: Table<Evolution>,
}

/// Mutex-guarded maps. Cheap to create; nothing survives the process.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                projects: Table::new(),
                bundles: Table::new(),
                runs: Table::new(),
                evolutions: Table::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, EvoError> {
        self.inner.lock().map_err(|_| EvoError::LockPoisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn insert_project(&self, project: &Project) -> Result<(), EvoError> {
        self.lock()?
            .projects
            .insert("Project", &project.id, project.clone())
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, EvoError> {
        Ok(self.lock()?.projects.get(id))
    }

    fn list_projects(&self) -> Result<Vec<Project>, EvoError> {
        Ok(self.lock()?.projects.list())
    }

    fn insert_bundle(&self, bundle: &TeamBundle) -> Result<(), EvoError> {
        self.lock()?
            .bundles
            .insert("Team", &bundle.team.id, bundle.clone())
    }

    fn get_bundle(&self, team_id: &str) -> Result<Option<TeamBundle>, EvoError> {
        Ok(self.lock()?.bundles.get(team_id))
    }

    fn list_teams(&self) -> Result<Vec<Team>, EvoError> {
        Ok(self
            .lock()?
            .bundles
            .list()
            .into_iter()
            .map(|b| b.team)
            .collect())
    }

    fn insert_run(&self, run: &Run) -> Result<(), EvoError> {
        self.lock()?.runs.insert("Run", &run.id, run.clone())
    }

    fn update_run(&self, run: &Run) -> Result<(), EvoError> {
        let mut inner = self.lock()?;
        let stored = inner.runs.get_mut("Run", &run.id)?;
        if stored.is_terminal() {
            return Err(EvoError::RunTerminal(run.id.clone()));
        }
        *stored = run.clone();
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<Option<Run>, EvoError> {
        Ok(self.lock()?.runs.get(id))
    }

    fn list_runs(&self) -> Result<Vec<Run>, EvoError> {
        Ok(self.lock()?.runs.list())
    }

    fn insert_evolution(&self, evolution: &Evolution) -> Result<(), EvoError> {
        self.lock()?
            .evolutions
            .insert("Evolution", &evolution.id, evolution.clone())
    }

    fn update_evolution(&self, evolution: &Evolution) -> Result<(), EvoError> {
        let mut inner = self.lock()?;
        *inner.evolutions.get_mut("Evolution", &evolution.id)? = evolution.clone();
        Ok(())
    }

    fn get_evolution(&self, id: &str) -> Result<Option<Evolution>, EvoError> {
        Ok(self.lock()?.evolutions.get(id))
    }

    fn list_evolutions(&self) -> Result<Vec<Evolution>, EvoError> {
        Ok(self.lock()?.evolutions.list())
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;

    #[test]
    fn test_projects() {
        contract::projects_round_trip(&MemoryStore::new());
    }

    #[test]
    fn test_bundles() {
        contract::bundles_keep_agents_scoped_by_team(&MemoryStore::new());
    }

    #[test]
    fn test_runs() {
        contract::runs_become_immutable_when_terminal(&MemoryStore::new());
    }

    #[test]
    fn test_evolutions() {
        contract::evolutions_update_in_place(&MemoryStore::new());
    }
}

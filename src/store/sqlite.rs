// src/store/sqlite.rs — SQLite-backed store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use super::schema;
use super::Store;
use crate::core::types::{Agent, Evolution, EvolutionStatus, Project, Run, Team, TeamBundle, Tool};
use crate::infra::errors::EvoError;

/// Single connection behind a mutex. Records with nested structure are
/// stored as JSON text columns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, EvoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        tracing::debug!(path = %path.display(), "Opened store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, EvoError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, EvoError> {
        self.conn.lock().map_err(|_| EvoError::LockPoisoned)
    }

    fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool, EvoError> {
        let found: Option<i64> = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", table),
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn bodies<T: DeserializeOwned>(conn: &Connection, sql: &str) -> Result<Vec<T>, EvoError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(serde_json::from_str(&row?)?);
        }
        Ok(result)
    }

    fn body<T: DeserializeOwned>(conn: &Connection, sql: &str, id: &str) -> Result<Option<T>, EvoError> {
        let body: Option<String> = conn
            .query_row(sql, params![id], |r| r.get(0))
            .optional()?;
        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(EvoError::from)
    }

    fn team_bodies<T: DeserializeOwned>(
        conn: &Connection,
        table: &str,
        team_id: &str,
    ) -> Result<Vec<T>, EvoError> {
        let mut stmt = conn.prepare(&format!(
            "SELECT body FROM {} WHERE team_id = ?1 ORDER BY position",
            table
        ))?;
        let rows = stmt.query_map(params![team_id], |r| r.get::<_, String>(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(serde_json::from_str(&row?)?);
        }
        Ok(result)
    }
}

struct TeamRow {
    id: String,
    name: String,
    description: String,
    agent_ids: String,
    edges: String,
    entry_point: String,
}

impl TeamRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            agent_ids: row.get(3)?,
            edges: row.get(4)?,
            entry_point: row.get(5)?,
        })
    }

    fn into_team(self) -> Result<Team, EvoError> {
        Ok(Team {
            id: self.id,
            name: self.name,
            description: self.description,
            agent_ids: serde_json::from_str(&self.agent_ids)?,
            edges: serde_json::from_str(&self.edges)?,
            entry_point: self.entry_point,
        })
    }
}

const TEAM_COLUMNS: &str = "id, name, description, agent_ids, edges, entry_point";

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn evolution_status(evolution: &Evolution) -> &'static str {
    match evolution.status {
        EvolutionStatus::Generating => "generating",
        EvolutionStatus::Completed => "completed",
        EvolutionStatus::Failed => "failed",
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, EvoError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| EvoError::Other(anyhow::anyhow!("bad timestamp '{}': {}", s, e)))
}

impl Store for SqliteStore {
    // -- Projects --

    fn insert_project(&self, project: &Project) -> Result<(), EvoError> {
        let conn = self.conn()?;
        if Self::exists(&conn, "projects", &project.id)? {
            return Err(EvoError::AlreadyExists {
                kind: "Project",
                id: project.id.clone(),
            });
        }
        conn.execute(
            "INSERT INTO projects (id, name, task, files, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.id,
                project.name,
                project.task,
                serde_json::to_string(&project.files)?,
                timestamp(&project.created_at)
            ],
        )?;
        Ok(())
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, EvoError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, task, files, created_at FROM projects WHERE id = ?1",
                params![id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, name, task, files, created_at)| {
            Ok(Project {
                id,
                name,
                task,
                files: serde_json::from_str(&files)?,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    fn list_projects(&self) -> Result<Vec<Project>, EvoError> {
        let ids: Vec<String> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare("SELECT id FROM projects ORDER BY seq")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            ids
        };
        let mut projects = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = self.get_project(&id)? {
                projects.push(p);
            }
        }
        Ok(projects)
    }

    // -- Teams --

    fn insert_bundle(&self, bundle: &TeamBundle) -> Result<(), EvoError> {
        let conn = self.conn()?;
        let team = &bundle.team;
        if Self::exists(&conn, "teams", &team.id)? {
            return Err(EvoError::AlreadyExists {
                kind: "Team",
                id: team.id.clone(),
            });
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO teams (id, name, description, agent_ids, edges, entry_point)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                team.id,
                team.name,
                team.description,
                serde_json::to_string(&team.agent_ids)?,
                serde_json::to_string(&team.edges)?,
                team.entry_point
            ],
        )?;
        for (position, agent) in bundle.agents.iter().enumerate() {
            tx.execute(
                "INSERT INTO agents (team_id, position, id, body) VALUES (?1, ?2, ?3, ?4)",
                params![team.id, position as i64, agent.id, serde_json::to_string(agent)?],
            )?;
        }
        for (position, tool) in bundle.tools.iter().enumerate() {
            tx.execute(
                "INSERT INTO tools (team_id, position, id, fingerprint, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    team.id,
                    position as i64,
                    tool.id,
                    tool.fingerprint(),
                    serde_json::to_string(tool)?
                ],
            )?;
        }
        tx.commit()?;

        tracing::debug!(
            team = %team.id,
            agents = bundle.agents.len(),
            tools = bundle.tools.len(),
            "Stored team bundle"
        );
        Ok(())
    }

    fn get_bundle(&self, team_id: &str) -> Result<Option<TeamBundle>, EvoError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM teams WHERE id = ?1", TEAM_COLUMNS),
                params![team_id],
                TeamRow::from_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let team = row.into_team()?;

        let agents: Vec<Agent> = Self::team_bodies(&conn, "agents", team_id)?;
        let tools: Vec<Tool> = Self::team_bodies(&conn, "tools", team_id)?;

        Ok(Some(TeamBundle {
            team,
            agents,
            tools,
        }))
    }

    fn list_teams(&self) -> Result<Vec<Team>, EvoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM teams ORDER BY seq", TEAM_COLUMNS))?;
        let rows = stmt.query_map([], TeamRow::from_row)?;

        let mut teams = Vec::new();
        for row in rows {
            teams.push(row?.into_team()?);
        }
        Ok(teams)
    }

    // -- Runs --

    fn insert_run(&self, run: &Run) -> Result<(), EvoError> {
        let conn = self.conn()?;
        if Self::exists(&conn, "runs", &run.id)? {
            return Err(EvoError::AlreadyExists {
                kind: "Run",
                id: run.id.clone(),
            });
        }
        conn.execute(
            "INSERT INTO runs (id, team_id, project_id, evolution_id, status, score, body, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.id,
                run.team_id,
                run.project_id,
                run.evolution_id,
                run.status.as_str(),
                run.score,
                serde_json::to_string(run)?,
                timestamp(&run.updated_at)
            ],
        )?;
        Ok(())
    }

    fn update_run(&self, run: &Run) -> Result<(), EvoError> {
        let conn = self.conn()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![run.id],
                |r| r.get(0),
            )
            .optional()?;
        match status.as_deref() {
            None => return Err(EvoError::not_found("Run", &run.id)),
            Some("running") => {}
            Some(_) => return Err(EvoError::RunTerminal(run.id.clone())),
        }
        conn.execute(
            "UPDATE runs SET status = ?1, score = ?2, body = ?3, updated_at = ?4 WHERE id = ?5",
            params![
                run.status.as_str(),
                run.score,
                serde_json::to_string(run)?,
                timestamp(&run.updated_at),
                run.id
            ],
        )?;
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<Option<Run>, EvoError> {
        let conn = self.conn()?;
        Self::body(&conn, "SELECT body FROM runs WHERE id = ?1", id)
    }

    fn list_runs(&self) -> Result<Vec<Run>, EvoError> {
        let conn = self.conn()?;
        Self::bodies(&conn, "SELECT body FROM runs ORDER BY seq")
    }

    fn runs_for_team(&self, team_id: &str) -> Result<Vec<Run>, EvoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT body FROM runs WHERE team_id = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![team_id], |r| r.get::<_, String>(0))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(serde_json::from_str(&row?)?);
        }
        Ok(runs)
    }

    // -- Evolutions --

    fn insert_evolution(&self, evolution: &Evolution) -> Result<(), EvoError> {
        let conn = self.conn()?;
        if Self::exists(&conn, "evolutions", &evolution.id)? {
            return Err(EvoError::AlreadyExists {
                kind: "Evolution",
                id: evolution.id.clone(),
            });
        }
        conn.execute(
            "INSERT INTO evolutions (id, project_id, status, body, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                evolution.id,
                evolution.project_id,
                evolution_status(evolution),
                serde_json::to_string(evolution)?,
                timestamp(&evolution.updated_at)
            ],
        )?;
        Ok(())
    }

    fn update_evolution(&self, evolution: &Evolution) -> Result<(), EvoError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE evolutions SET status = ?1, body = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                evolution_status(evolution),
                serde_json::to_string(evolution)?,
                timestamp(&evolution.updated_at),
                evolution.id
            ],
        )?;
        if changed == 0 {
            return Err(EvoError::not_found("Evolution", &evolution.id));
        }
        Ok(())
    }

    fn get_evolution(&self, id: &str) -> Result<Option<Evolution>, EvoError> {
        let conn = self.conn()?;
        Self::body(&conn, "SELECT body FROM evolutions WHERE id = ?1", id)
    }

    fn list_evolutions(&self) -> Result<Vec<Evolution>, EvoError> {
        let conn = self.conn()?;
        Self::bodies(&conn, "SELECT body FROM evolutions ORDER BY seq")
    }
}

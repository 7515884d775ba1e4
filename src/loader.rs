// src/loader.rs — Team directories: tools.json, agents.json, team.json

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::types::{Agent, Team, TeamBundle, Tool};
use crate::infra::errors::EvoError;
use crate::tools::defaults;

pub const TOOLS_FILE: &str = "tools.json";
pub const AGENTS_FILE: &str = "agents.json";
pub const TEAM_FILE: &str = "team.json";

/// `{"tools": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ToolsDoc {
    Wrapped { tools: Vec<Tool> },
    Bare(Vec<Tool>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AgentsDoc {
    Wrapped { agents: Vec<Agent> },
    Bare(Vec<Agent>),
}

/// `{"team": {...}}` or the team object itself.
#[derive(Deserialize)]
#[serde(untagged)]
enum TeamDoc {
    Wrapped { team: Team },
    Bare(Team),
}

#[derive(Serialize)]
struct ToolsOut<'a> {
    tools: &'a [Tool],
}

#[derive(Serialize)]
struct AgentsOut<'a> {
    agents: &'a [Agent],
}

fn parse<T: DeserializeOwned>(what: &str, text: &str) -> Result<T, EvoError> {
    serde_json::from_str(text).map_err(|e| EvoError::Config(format!("{}: {}", what, e)))
}

/// Parse tools. Definitions of the built-in file tools are dropped; those
/// are always provided natively.
pub fn parse_tools(text: &str) -> Result<Vec<Tool>, EvoError> {
    let tools = match parse(TOOLS_FILE, text)? {
        ToolsDoc::Wrapped { tools } | ToolsDoc::Bare(tools) => tools,
    };
    Ok(tools
        .into_iter()
        .filter(|t| {
            let builtin = defaults::is_default_tool(&t.id);
            if builtin {
                tracing::debug!(tool = %t.id, "Skipping built-in tool definition");
            }
            !builtin
        })
        .collect())
}

pub fn parse_agents(text: &str) -> Result<Vec<Agent>, EvoError> {
    Ok(match parse(AGENTS_FILE, text)? {
        AgentsDoc::Wrapped { agents } | AgentsDoc::Bare(agents) => agents,
    })
}

pub fn parse_team(text: &str) -> Result<Team, EvoError> {
    Ok(match parse(TEAM_FILE, text)? {
        TeamDoc::Wrapped { team } | TeamDoc::Bare(team) => team,
    })
}

/// Assemble a bundle from the three documents. `tools` may be absent.
pub fn bundle_from_json(
    tools: Option<&str>,
    agents: &str,
    team: &str,
) -> Result<TeamBundle, EvoError> {
    Ok(TeamBundle {
        team: parse_team(team)?,
        agents: parse_agents(agents)?,
        tools: match tools {
            Some(text) if !text.trim().is_empty() => parse_tools(text)?,
            _ => Vec::new(),
        },
    })
}

/// Load a team directory. `tools.json` is optional.
pub fn load_team_dir(dir: &Path) -> Result<TeamBundle, EvoError> {
    let read = |name: &str| -> Result<String, EvoError> {
        let path = dir.join(name);
        std::fs::read_to_string(&path)
            .map_err(|e| EvoError::Config(format!("{}: {}", path.display(), e)))
    };

    let tools_path = dir.join(TOOLS_FILE);
    let tools = if tools_path.exists() {
        Some(read(TOOLS_FILE)?)
    } else {
        None
    };
    let bundle = bundle_from_json(tools.as_deref(), &read(AGENTS_FILE)?, &read(TEAM_FILE)?)?;

    tracing::debug!(
        dir = %dir.display(),
        team = %bundle.team.id,
        agents = bundle.agents.len(),
        tools = bundle.tools.len(),
        "Loaded team directory"
    );
    Ok(bundle)
}

/// Write a bundle as a team directory, creating it if needed.
pub fn save_team_dir(bundle: &TeamBundle, dir: &Path) -> Result<(), EvoError> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join(TOOLS_FILE),
        serde_json::to_string_pretty(&ToolsOut {
            tools: &bundle.tools,
        })?,
    )?;
    std::fs::write(
        dir.join(AGENTS_FILE),
        serde_json::to_string_pretty(&AgentsOut {
            agents: &bundle.agents,
        })?,
    )?;
    std::fs::write(dir.join(TEAM_FILE), serde_json::to_string_pretty(&bundle.team)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TOOLS: &str = r#"{"tools": [
        {"id": "file_writer", "name": "write_file", "description": "legacy", "parameters": [], "code": "def write_file(): pass"},
        {"id": "wc", "name": "word_count", "description": "Counts words",
         "parameters": [{"name": "text", "type": "string", "description": "input"}],
         "returns": {"type": "integer", "description": "count"},
         "code": "fn word_count(text) { text.split(' ').len() }"}
    ]}"#;

    const AGENTS: &str = r#"{"agents": [
        {"id": "writer", "name": "Writer", "system_prompt": "Write.", "tool_names": ["wc", "file_writer"]},
        {"id": "editor", "name": "Editor", "system_prompt": "Edit.", "temperature": 0.2}
    ]}"#;

    const TEAM: &str = r#"{"id": "docs", "name": "Docs", "description": "Writes docs",
        "agent_ids": ["writer", "editor"],
        "edges": [{"from": "writer", "to": "editor", "description": "review"}],
        "entry_point": "writer"}"#;

    // ─── Parsing ────────────────────────────────────────────────

    #[test]
    fn test_bundle_from_json_skips_builtin_tools() {
        let bundle = bundle_from_json(Some(TOOLS), AGENTS, TEAM).unwrap();
        assert_eq!(bundle.tools.len(), 1);
        assert_eq!(bundle.tools[0].id, "wc");
        assert_eq!(bundle.agents[0].tool_ids, vec!["wc", "file_writer"]);
        assert!(crate::core::graph::validate_bundle(&bundle).is_ok());
    }

    #[test]
    fn test_bare_arrays_accepted() {
        let agents = parse_agents(r#"[{"id": "a", "name": "A", "system_prompt": "p"}]"#).unwrap();
        assert_eq!(agents.len(), 1);
        assert!(parse_tools("[]").unwrap().is_empty());
    }

    #[test]
    fn test_nested_team_accepted() {
        let team = parse_team(&format!("{{\"team\": {}}}", TEAM)).unwrap();
        assert_eq!(team.entry_point, "writer");
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_team("{").unwrap_err();
        assert!(err.to_string().contains("team.json"));
    }

    // ─── Directories ────────────────────────────────────────────

    #[test]
    fn test_save_and_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_from_json(Some(TOOLS), AGENTS, TEAM).unwrap();
        save_team_dir(&bundle, dir.path()).unwrap();
        let loaded = load_team_dir(dir.path()).unwrap();
        assert_eq!(loaded, bundle);
    }

    #[test]
    fn test_tools_file_optional() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(AGENTS_FILE), AGENTS).unwrap();
        std::fs::write(dir.path().join(TEAM_FILE), TEAM).unwrap();
        let loaded = load_team_dir(dir.path()).unwrap();
        assert!(loaded.tools.is_empty());
    }

    #[test]
    fn test_missing_agents_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_team_dir(dir.path()), Err(EvoError::Config(_))));
    }
}

// src/merger/architecture.rs — Architecture request prompt and response parsing

use std::collections::HashMap;

use serde::Deserialize;

use super::union::{Parent, ToolConflict};
use crate::core::truncation;
use crate::core::types::{TeamBundle, TeamEdge};
use crate::infra::errors::EvoError;
use crate::util;

const AGENT_PROMPT_CHARS: usize = 300;

pub const MERGE_SYSTEM_PROMPT: &str = "\
You are an expert AI team architect. You combine two agent teams into one \
stronger team. You do not write new agents or tools: every agent of both \
teams is kept, and you decide how they are wired together.";

/// The model's proposed shape for the merged team.
#[derive(Debug, Clone, Deserialize)]
pub struct Architecture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub entry_point: EntryPoint,
    #[serde(default)]
    pub edges: Vec<TeamEdge>,
    /// Tool id to the parent whose definition should be kept.
    #[serde(default)]
    pub tool_preferences: HashMap<String, ParentRef>,
}

/// Models sometimes answer with a list here; only a single id is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntryPoint {
    One(String),
    Many(Vec<String>),
}

impl EntryPoint {
    pub fn single(&self) -> Result<&str, String> {
        match self {
            EntryPoint::One(id) if !id.trim().is_empty() => Ok(id.trim()),
            EntryPoint::One(_) => Err("entry point is empty".to_string()),
            EntryPoint::Many(ids) if ids.len() == 1 => Ok(ids[0].trim()),
            EntryPoint::Many(ids) => Err(format!(
                "exactly one entry point required, got {}",
                ids.len()
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParentRef {
    Index(u8),
    Name(String),
}

impl ParentRef {
    pub fn parent(&self) -> Option<Parent> {
        match self {
            ParentRef::Index(1) => Some(Parent::First),
            ParentRef::Index(2) => Some(Parent::Second),
            ParentRef::Index(_) => None,
            ParentRef::Name(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "first" | "team1" | "team 1" => Some(Parent::First),
                "2" | "second" | "team2" | "team 2" => Some(Parent::Second),
                _ => None,
            },
        }
    }
}

/// Build the architecture request from both (already renamed) parents.
pub fn build_merge_prompt(
    first: &TeamBundle,
    second: &TeamBundle,
    conflicts: &[ToolConflict],
) -> String {
    let mut prompt = String::with_capacity(8192);
    append_team(&mut prompt, 1, first);
    append_team(&mut prompt, 2, second);

    if !conflicts.is_empty() {
        prompt.push_str("=== CONFLICTING TOOLS ===\n");
        prompt.push_str("Both teams define these tools differently. Pick one version each.\n");
        for c in conflicts {
            prompt.push_str(&format!(
                "- {}: team 1 `{}` ({} chars of code), team 2 `{}` ({} chars of code)\n",
                c.id,
                c.first.signature(),
                c.first.code.len(),
                c.second.signature(),
                c.second.code.len()
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "=== YOUR TASK ===\n\
         Design one team containing every agent listed above. Choose a single \
         entry point, which must be one of the two original entry points, and the \
         delegation edges. Every agent must be reachable from the entry point \
         by following edges. Use agent ids exactly as written.\n\n\
         Respond with one fenced block:\n\
         ```json architecture.json\n\
         {\n  \"name\": \"...\",\n  \"description\": \"...\",\n  \"entry_point\": \"agent_id\",\n  \
         \"edges\": [{\"from\": \"agent_id\", \"to\": \"agent_id\", \"description\": \"...\"}],\n  \
         \"tool_preferences\": {\"tool_id\": 1}\n}\n\
         ```",
    );
    prompt
}

fn append_team(prompt: &mut String, n: u8, bundle: &TeamBundle) {
    let team = &bundle.team;
    prompt.push_str(&format!("=== TEAM {}: {} ===\n", n, team.name));
    if !team.description.is_empty() {
        prompt.push_str(&format!("{}\n", team.description.trim()));
    }
    prompt.push_str(&format!("Entry point: {}\n\nAgents:\n", team.entry_point));
    for id in &team.agent_ids {
        let Some(agent) = bundle.agent(id) else {
            continue;
        };
        let tools = if agent.tool_ids.is_empty() {
            "default file tools only".to_string()
        } else {
            agent.tool_ids.join(", ")
        };
        prompt.push_str(&format!(
            "- {} ({}): {}\n  tools: {}\n",
            agent.id,
            agent.name,
            truncation::head(agent.system_prompt.trim(), AGENT_PROMPT_CHARS).replace('\n', " "),
            tools
        ));
    }
    prompt.push_str("\nEdges:\n");
    if team.edges.is_empty() {
        prompt.push_str("(none)\n");
    }
    for edge in &team.edges {
        match &edge.description {
            Some(d) if !d.is_empty() => {
                prompt.push_str(&format!("- {} -> {}: {}\n", edge.from, edge.to, d))
            }
            _ => prompt.push_str(&format!("- {} -> {}\n", edge.from, edge.to)),
        }
    }
    prompt.push('\n');
}

/// Parse the architecture from the model's reply: the `architecture.json`
/// block, else the first JSON block, else the whole reply.
pub fn parse_architecture(response: &str) -> Result<Architecture, EvoError> {
    let blocks = util::fenced_blocks(response);
    let body = util::labelled_json_block(&blocks, "architecture.json")
        .or_else(|| util::first_json_block(&blocks))
        .unwrap_or(response)
        .trim();

    serde_json::from_str(body).map_err(|e| {
        EvoError::MergeValidation(vec![format!("architecture response is not valid JSON: {}", e)])
    })
}

// src/merger/union.rs — Deterministic tool and agent union of two team bundles

use std::collections::{HashMap, HashSet};

use crate::core::types::{Agent, TeamBundle, Tool};
use crate::infra::config::TieBreak;
use crate::tools::defaults;

/// Which parent a merged element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    First,
    Second,
}

/// Two different definitions sharing one tool id.
#[derive(Debug, Clone)]
pub struct ToolConflict {
    pub id: String,
    pub first: Tool,
    pub second: Tool,
}

#[derive(Debug, Clone, Default)]
pub struct ToolUnion {
    /// Unconflicted tools: the first parent's in order, then the second's new ones.
    pub tools: Vec<Tool>,
    /// Second-parent tool id to the id of an identical definition already kept.
    pub aliases: HashMap<String, String>,
    pub conflicts: Vec<ToolConflict>,
}

/// Union two tool sets. Identical definitions (same fingerprint) collapse onto
/// the first parent's id; same id with different content becomes a conflict.
pub fn union_tools(first: &[Tool], second: &[Tool]) -> ToolUnion {
    let mut union = ToolUnion::default();
    let mut by_fingerprint: HashMap<String, String> = HashMap::new();

    for tool in first.iter().filter(|t| !defaults::is_default_tool(&t.id)) {
        if union.tools.iter().any(|t| t.id == tool.id) {
            continue;
        }
        by_fingerprint
            .entry(tool.fingerprint())
            .or_insert_with(|| tool.id.clone());
        union.tools.push(tool.clone());
    }

    for tool in second.iter().filter(|t| !defaults::is_default_tool(&t.id)) {
        let fingerprint = tool.fingerprint();
        if let Some(kept) = by_fingerprint.get(&fingerprint) {
            if kept != &tool.id {
                union.aliases.insert(tool.id.clone(), kept.clone());
            }
            continue;
        }
        match union.tools.iter().find(|t| t.id == tool.id) {
            Some(existing) => union.conflicts.push(ToolConflict {
                id: tool.id.clone(),
                first: existing.clone(),
                second: tool.clone(),
            }),
            None => {
                by_fingerprint.insert(fingerprint, tool.id.clone());
                union.tools.push(tool.clone());
            }
        }
    }
    union
}

/// Resolve one conflict. `preference` is the architecture's pick, consulted
/// only under [`TieBreak::Model`].
pub fn resolve_conflict(
    conflict: &ToolConflict,
    tie_break: TieBreak,
    preference: Option<Parent>,
) -> Parent {
    match (tie_break, preference) {
        (TieBreak::First, _) => Parent::First,
        (TieBreak::Model, Some(p)) => p,
        (TieBreak::Model, None) | (TieBreak::Richer, _) => richer(&conflict.first, &conflict.second),
    }
}

/// More parameters wins, then longer code, then the first parent.
fn richer(first: &Tool, second: &Tool) -> Parent {
    let key = |t: &Tool| (t.parameters.len(), t.code.len());
    if key(second) > key(first) {
        Parent::Second
    } else {
        Parent::First
    }
}

/// Rename the second bundle's agents that collide with the first's ids to
/// `<id>_2`, `<id>_3`, ... and rewrite its edges and entry point to match.
/// Tool references are rewritten through `tool_aliases`.
pub fn rename_second(
    first: &TeamBundle,
    mut second: TeamBundle,
    tool_aliases: &HashMap<String, String>,
) -> TeamBundle {
    let mut taken: HashSet<String> = first
        .agents
        .iter()
        .map(|a| a.id.clone())
        .chain(first.team.agent_ids.iter().cloned())
        .collect();
    let own: HashSet<String> = second
        .agents
        .iter()
        .map(|a| a.id.clone())
        .chain(second.team.agent_ids.iter().cloned())
        .collect();
    taken.extend(own.iter().cloned());

    let mut renames: HashMap<String, String> = HashMap::new();
    let mut ids: Vec<&String> = own.iter().collect();
    ids.sort();
    for id in ids {
        let collides = first.agents.iter().any(|a| &a.id == id) || first.team.has_agent(id);
        if !collides {
            continue;
        }
        let mut n = 2;
        let fresh = loop {
            let candidate = format!("{}_{}", id, n);
            if !taken.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        taken.insert(fresh.clone());
        renames.insert(id.clone(), fresh);
    }

    let rename = |id: &mut String| {
        if let Some(new) = renames.get(id.as_str()) {
            *id = new.clone();
        }
    };

    for agent in &mut second.agents {
        rename(&mut agent.id);
        for tool_id in &mut agent.tool_ids {
            if let Some(kept) = tool_aliases.get(tool_id.as_str()) {
                *tool_id = kept.clone();
            }
        }
    }
    for id in &mut second.team.agent_ids {
        rename(id);
    }
    for edge in &mut second.team.edges {
        rename(&mut edge.from);
        rename(&mut edge.to);
    }
    rename(&mut second.team.entry_point);

    if !renames.is_empty() {
        tracing::debug!(renamed = renames.len(), "Renamed colliding agents in second parent");
    }
    second
}

/// Agents of both parents, first parent's first. Agents a team does not list
/// are dropped.
pub fn union_agents(first: &TeamBundle, second: &TeamBundle) -> Vec<Agent> {
    let members = |b: &TeamBundle| -> Vec<Agent> {
        b.team
            .agent_ids
            .iter()
            .filter_map(|id| b.agent(id).cloned())
            .collect()
    };
    let mut agents = members(first);
    agents.extend(members(second));
    agents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ParamType, ReturnSpec, Team, TeamEdge, ToolParameter};

    fn tool(id: &str, code: &str, params: usize) -> Tool {
        Tool {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            parameters: (0..params)
                .map(|i| ToolParameter {
                    name: format!("p{}", i),
                    param_type: ParamType::String,
                    description: String::new(),
                    required: true,
                    default: None,
                })
                .collect(),
            returns: ReturnSpec::default(),
            code: code.into(),
        }
    }

    fn bundle(ids: &[&str], edges: &[(&str, &str)]) -> TeamBundle {
        TeamBundle {
            team: Team {
                id: "t".into(),
                name: "T".into(),
                description: String::new(),
                agent_ids: ids.iter().map(|s| s.to_string()).collect(),
                edges: edges.iter().map(|(f, t)| TeamEdge::new(*f, *t)).collect(),
                entry_point: ids[0].into(),
            },
            agents: ids.iter().map(|id| Agent::new(*id, *id, "p")).collect(),
            tools: vec![],
        }
    }

    // ─── Tools ──────────────────────────────────────────────────

    #[test]
    fn test_identical_tools_collapse() {
        let a = tool("fmt", "fn fmt(p0) { p0 }", 1);
        let mut b = a.clone();
        b.id = "format".into();
        let union = union_tools(&[a], &[b]);
        assert_eq!(union.tools.len(), 1);
        assert_eq!(union.aliases["format"], "fmt");
        assert!(union.conflicts.is_empty());
    }

    #[test]
    fn test_same_id_different_code_conflicts() {
        let union = union_tools(&[tool("x", "fn x(p0) { 1 }", 1)], &[tool("x", "fn x(p0, p1) { 2 }", 2)]);
        assert_eq!(union.tools.len(), 1);
        assert_eq!(union.conflicts.len(), 1);
    }

    #[test]
    fn test_default_tools_never_unioned() {
        let union = union_tools(&[tool("read_file", "", 0)], &[tool("write_file", "", 0)]);
        assert!(union.tools.is_empty());
    }

    #[test]
    fn test_tie_breaks() {
        let conflict = ToolConflict {
            id: "x".into(),
            first: tool("x", "fn x(p0) { 1 }", 1),
            second: tool("x", "fn x(p0, p1) { 2 }", 2),
        };
        assert_eq!(resolve_conflict(&conflict, TieBreak::Richer, None), Parent::Second);
        assert_eq!(resolve_conflict(&conflict, TieBreak::First, Some(Parent::Second)), Parent::First);
        assert_eq!(resolve_conflict(&conflict, TieBreak::Model, Some(Parent::First)), Parent::First);
        assert_eq!(resolve_conflict(&conflict, TieBreak::Model, None), Parent::Second);

        let even = ToolConflict {
            id: "x".into(),
            first: tool("x", "fn x() { 1 }", 0),
            second: tool("x", "fn x() { 2 }", 0),
        };
        assert_eq!(resolve_conflict(&even, TieBreak::Richer, None), Parent::First);
    }

    // ─── Agents ─────────────────────────────────────────────────

    #[test]
    fn test_colliding_agents_renamed() {
        let first = bundle(&["lead", "coder"], &[("lead", "coder")]);
        let second = bundle(&["lead", "coder_2", "coder"], &[("lead", "coder"), ("coder", "coder_2")]);
        let renamed = rename_second(&first, second, &HashMap::new());

        assert_eq!(renamed.team.entry_point, "lead_2");
        // coder_2 is already taken by the second team itself
        assert_eq!(renamed.team.agent_ids, vec!["lead_2", "coder_2", "coder_3"]);
        assert!(renamed.team.has_edge("lead_2", "coder_3"));
        assert!(renamed.team.has_edge("coder_3", "coder_2"));
        assert!(renamed.agent("coder_3").is_some());
    }

    #[test]
    fn test_disjoint_agents_untouched() {
        let first = bundle(&["a"], &[]);
        let second = bundle(&["b"], &[]);
        let renamed = rename_second(&first, second.clone(), &HashMap::new());
        assert_eq!(renamed.team, second.team);
        assert_eq!(union_agents(&first, &renamed).len(), 2);
    }

    #[test]
    fn test_tool_aliases_rewritten() {
        let first = bundle(&["a"], &[]);
        let mut second = bundle(&["b"], &[]);
        second.agents[0].tool_ids = vec!["format".into()];
        let mut aliases = HashMap::new();
        aliases.insert("format".to_string(), "fmt".to_string());
        let renamed = rename_second(&first, second, &aliases);
        assert_eq!(renamed.agents[0].tool_ids, vec!["fmt".to_string()]);
    }
}

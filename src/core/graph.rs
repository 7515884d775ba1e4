// src/core/graph.rs — Team graph validation and reachability

use std::collections::{HashSet, VecDeque};

use super::types::{Team, TeamBundle};
use crate::infra::errors::EvoError;
use crate::tools::defaults;

/// Structural problems with a team graph: entry point and edge endpoints
/// must be members, member ids must be unique.
pub fn structural_problems(team: &Team) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    if team.agent_ids.is_empty() {
        problems.push("team has no agents".to_string());
    }
    for id in &team.agent_ids {
        if !seen.insert(id.as_str()) {
            problems.push(format!("agent '{}' listed more than once", id));
        }
    }
    if !team.has_agent(&team.entry_point) {
        problems.push(format!(
            "entry point '{}' not in agent list",
            team.entry_point
        ));
    }
    for edge in &team.edges {
        if !team.has_agent(&edge.from) {
            problems.push(format!("edge source '{}' not in agent list", edge.from));
        }
        if !team.has_agent(&edge.to) {
            problems.push(format!("edge target '{}' not in agent list", edge.to));
        }
    }
    problems
}

/// Agents reachable from `start` by following edges (including `start`).
pub fn reachable_from<'a>(team: &'a Team, start: &'a str) -> HashSet<&'a str> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        for edge in team.neighbors(current) {
            if !visited.contains(edge.to.as_str()) {
                queue.push_back(edge.to.as_str());
            }
        }
    }
    visited
}

/// Members that cannot be reached from the entry point.
pub fn unreachable_agents(team: &Team) -> Vec<String> {
    let reachable = reachable_from(team, &team.entry_point);
    team.agent_ids
        .iter()
        .filter(|id| !reachable.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Every member resolves to an agent and every agent's tools resolve.
pub fn resolution_problems(bundle: &TeamBundle) -> Vec<String> {
    let mut problems = Vec::new();
    for id in &bundle.team.agent_ids {
        let Some(agent) = bundle.agent(id) else {
            problems.push(format!("agent '{}' has no definition", id));
            continue;
        };
        for tool_id in &agent.tool_ids {
            if !defaults::is_default_tool(tool_id) && bundle.tool(tool_id).is_none() {
                problems.push(format!(
                    "agent '{}' references unknown tool '{}'",
                    id, tool_id
                ));
            }
        }
    }
    problems
}

/// Validate a team before it runs.
pub fn validate_team(team: &Team) -> Result<(), EvoError> {
    let problems = structural_problems(team);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(EvoError::TeamValidation(problems))
    }
}

/// Validate a bundle before it runs: structure plus agent and tool resolution.
pub fn validate_bundle(bundle: &TeamBundle) -> Result<(), EvoError> {
    let mut problems = structural_problems(&bundle.team);
    problems.extend(resolution_problems(bundle));
    if problems.is_empty() {
        Ok(())
    } else {
        Err(EvoError::TeamValidation(problems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Agent, TeamEdge};

    fn team(agents: &[&str], edges: &[(&str, &str)], entry: &str) -> Team {
        Team {
            id: "t".into(),
            name: "T".into(),
            description: String::new(),
            agent_ids: agents.iter().map(|s| s.to_string()).collect(),
            edges: edges.iter().map(|(f, t)| TeamEdge::new(*f, *t)).collect(),
            entry_point: entry.into(),
        }
    }

    #[test]
    fn test_entry_point_must_be_member() {
        let t = team(&["a", "b"], &[("a", "b")], "z");
        let err = validate_team(&t).unwrap_err();
        assert!(matches!(err, EvoError::TeamValidation(_)));
        assert!(err.to_string().contains("entry point 'z'"));
    }

    #[test]
    fn test_edge_endpoints_must_be_members() {
        let t = team(&["a"], &[("a", "ghost")], "a");
        let problems = structural_problems(&t);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("ghost"));
    }

    #[test]
    fn test_duplicate_agent_ids() {
        let t = team(&["a", "a"], &[], "a");
        assert!(structural_problems(&t)[0].contains("more than once"));
    }

    #[test]
    fn test_valid_team_with_cycle() {
        let t = team(&["a", "b"], &[("a", "b"), ("b", "a")], "a");
        assert!(validate_team(&t).is_ok());
        assert!(unreachable_agents(&t).is_empty());
    }

    #[test]
    fn test_reachability() {
        let t = team(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("d", "a")], "a");
        let r = reachable_from(&t, "a");
        assert!(r.contains("a") && r.contains("b") && r.contains("c"));
        assert_eq!(unreachable_agents(&t), vec!["d".to_string()]);
    }

    #[test]
    fn test_bundle_resolution() {
        let bundle = TeamBundle {
            team: team(&["a", "b"], &[("a", "b")], "a"),
            agents: vec![
                Agent::new("a", "A", "p").with_tools(&["read_file", "missing_tool"]),
            ],
            tools: vec![],
        };
        let problems = resolution_problems(&bundle);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("missing_tool")));
        assert!(problems.iter().any(|p| p.contains("'b' has no definition")));
        assert!(validate_bundle(&bundle).is_err());
    }
}

// src/cli/validate.rs — `agentevo validate`: check a team directory offline

use std::path::Path;

use crate::core::graph;
use crate::core::types::TeamBundle;
use crate::loader;
use crate::tools::ToolRegistry;

/// Every problem with the bundle, empty when it is runnable.
pub fn problems(bundle: &TeamBundle) -> Vec<String> {
    let mut problems = graph::structural_problems(&bundle.team);
    problems.extend(graph::resolution_problems(bundle));
    if bundle.team.has_agent(&bundle.team.entry_point) {
        for id in graph::unreachable_agents(&bundle.team) {
            problems.push(format!("warning: agent '{}' is unreachable from the entry point", id));
        }
    }
    if let Err(e) = ToolRegistry::build(&bundle.tools) {
        problems.push(e.to_string());
    }
    problems
}

pub fn run_validate(dir: &Path) -> anyhow::Result<()> {
    let bundle = loader::load_team_dir(dir)?;
    let problems = problems(&bundle);
    let errors = problems.iter().filter(|p| !p.starts_with("warning:")).count();

    for p in &problems {
        eprintln!("  {}", p);
    }
    if errors > 0 {
        anyhow::bail!("{} problem(s) in {}", errors, dir.display());
    }
    println!(
        "{}: team '{}' OK ({} agents, {} tools, {} edges)",
        dir.display(),
        bundle.team.name,
        bundle.agents.len(),
        bundle.tools.len(),
        bundle.team.edges.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Agent, Team, TeamEdge};

    fn bundle() -> TeamBundle {
        TeamBundle {
            team: Team {
                id: "t".into(),
                name: "T".into(),
                description: String::new(),
                agent_ids: vec!["a".into(), "b".into(), "c".into()],
                edges: vec![TeamEdge::new("a", "b")],
                entry_point: "a".into(),
            },
            agents: vec![
                Agent::new("a", "A", "p"),
                Agent::new("b", "B", "p"),
                Agent::new("c", "C", "p"),
            ],
            tools: vec![],
        }
    }

    #[test]
    fn test_unreachable_agent_is_only_a_warning() {
        let problems = problems(&bundle());
        assert_eq!(problems, vec!["warning: agent 'c' is unreachable from the entry point"]);
    }

    #[test]
    fn test_unknown_tool_reported() {
        let mut b = bundle();
        b.team.edges.push(TeamEdge::new("a", "c"));
        b.agents[1] = Agent::new("b", "B", "p").with_tools(&["ghost"]);
        let problems = problems(&b);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("ghost"));
    }
}

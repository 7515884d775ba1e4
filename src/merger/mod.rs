// src/merger/mod.rs — Combine two team bundles into one validated successor
//
// Steps: union tools (collapse identical fingerprints), rename the second
// parent's colliding agents, ask the model for a target architecture, resolve
// tool conflicts, validate. Nothing is returned unless validation passes, so
// a rejected merge leaves no trace in the store.

pub mod architecture;
pub mod union;

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::graph;
use crate::core::types::{new_id, EngineConfig, Team, TeamBundle, TeamEdge};
use crate::infra::config::MergeConfig;
use crate::infra::errors::EvoError;
use crate::provider::retry::{chat_with_retry, RetryConfig};
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::tools::ToolRegistry;
use architecture::Architecture;
use union::Parent;

pub struct Merger {
    provider: Arc<dyn ModelProvider>,
    model_id: String,
    config: MergeConfig,
    retry: RetryConfig,
}

impl Merger {
    pub fn new(provider: Arc<dyn ModelProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            model_id: config.models.merger_model().to_string(),
            config: config.merge.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Merge `first` and `second` into a new bundle with a fresh team id.
    ///
    /// Errors: `MergeValidation` when the proposed architecture does not
    /// produce a valid team; provider errors when the architecture request
    /// fails after retries.
    #[tracing::instrument(skip_all, fields(first = %first.team.id, second = %second.team.id))]
    pub async fn merge(&self, first: &TeamBundle, second: &TeamBundle) -> Result<TeamBundle, EvoError> {
        let tool_union = union::union_tools(&first.tools, &second.tools);
        let second = union::rename_second(first, second.clone(), &tool_union.aliases);

        let prompt = architecture::build_merge_prompt(first, &second, &tool_union.conflicts);
        let request = ChatRequest::new(&self.model_id, vec![Message::user(prompt)])
            .with_system(architecture::MERGE_SYSTEM_PROMPT)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let response = chat_with_retry(self.provider.as_ref(), request, &self.retry)
            .await
            .map_err(|f| f.error)?;
        let arch = architecture::parse_architecture(&response.content)?;

        let bundle = assemble(first, &second, tool_union, &arch, &self.config)?;
        validate_merged(&bundle)?;

        tracing::info!(
            team = %bundle.team.id,
            name = %bundle.team.name,
            agents = bundle.agents.len(),
            tools = bundle.tools.len(),
            edges = bundle.team.edges.len(),
            "Merge accepted"
        );
        Ok(bundle)
    }
}

/// Build the merged bundle from the unions and the architecture. `second` is
/// the renamed parent; the entry point must be one of the two parents' entry
/// points.
pub fn assemble(
    first: &TeamBundle,
    second: &TeamBundle,
    tool_union: union::ToolUnion,
    arch: &Architecture,
    config: &MergeConfig,
) -> Result<TeamBundle, EvoError> {
    let entry_point = arch
        .entry_point
        .single()
        .map_err(|e| EvoError::MergeValidation(vec![e]))?
        .to_string();
    if entry_point != first.team.entry_point && entry_point != second.team.entry_point {
        return Err(EvoError::MergeValidation(vec![format!(
            "entry point '{}' is not an original entry point (expected '{}' or '{}')",
            entry_point, first.team.entry_point, second.team.entry_point
        )]));
    }

    let mut tools = tool_union.tools;
    for conflict in &tool_union.conflicts {
        let preference = arch
            .tool_preferences
            .get(&conflict.id)
            .and_then(|p| p.parent());
        if union::resolve_conflict(conflict, config.tool_tie_break, preference) == Parent::Second {
            if let Some(slot) = tools.iter_mut().find(|t| t.id == conflict.id) {
                *slot = conflict.second.clone();
            }
        }
    }

    let agents = union::union_agents(first, second);
    let agent_ids = agents.iter().map(|a| a.id.clone()).collect();

    let mut seen = HashSet::new();
    let edges: Vec<TeamEdge> = arch
        .edges
        .iter()
        .filter(|e| seen.insert((e.from.clone(), e.to.clone())))
        .cloned()
        .collect();

    let name = if arch.name.trim().is_empty() {
        format!("{} + {}", first.team.name, second.team.name)
    } else {
        arch.name.trim().to_string()
    };

    Ok(TeamBundle {
        team: Team {
            id: new_id(),
            name,
            description: arch.description.clone(),
            agent_ids,
            edges,
            entry_point,
        },
        agents,
        tools,
    })
}

/// Structure, single member entry point, reachability, tool resolution and
/// tool loading. All problems are reported together.
pub fn validate_merged(bundle: &TeamBundle) -> Result<(), EvoError> {
    let mut problems = graph::structural_problems(&bundle.team);
    problems.extend(graph::resolution_problems(bundle));
    if bundle.team.has_agent(&bundle.team.entry_point) {
        problems.extend(
            graph::unreachable_agents(&bundle.team)
                .into_iter()
                .map(|id| format!("agent '{}' is unreachable from the entry point", id)),
        );
    }
    if let Err(e) = ToolRegistry::build(&bundle.tools) {
        problems.push(e.to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        tracing::warn!(problems = problems.len(), "Merge rejected: {}", problems.join("; "));
        Err(EvoError::MergeValidation(problems))
    }
}

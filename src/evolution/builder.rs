// src/evolution/builder.rs — Produce candidate teams for a task

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::graph;
use crate::core::team_runner::TeamRunner;
use crate::core::types::{EngineConfig, TeamBundle, TeamResult};
use crate::infra::errors::EvoError;
use crate::loader::{self, AGENTS_FILE, TEAM_FILE, TOOLS_FILE};
use crate::provider::retry::{chat_with_retry, RetryConfig};
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::tools::{defaults, ToolRegistry};
use crate::util;

const BUILDER_MAX_TOKENS: u32 = 8000;

/// Builds one candidate team for a task.
#[async_trait]
pub trait TeamBuilder: Send + Sync {
    async fn build(&self, task: &str) -> Result<TeamBundle, EvoError>;
}

/// The instructions shared by both builders.
pub fn build_instructions(task: &str) -> String {
    let mut defaults_list = String::new();
    for tool in defaults::definitions() {
        defaults_list.push_str(&format!("- {}: {}\n", tool.signature(), tool.description));
    }

    format!(
        "You are an AI team builder. Design a team of AI agents that can solve \
         the task below.\n\n\
         === ORIGINAL TASK ===\n{task}\n\n\
         === WHAT TO PRODUCE ===\n\
         1. tools.json: {{\"tools\": [...]}} with any custom tools. Each tool has \
         id, name, description, parameters (name, type, description, required, \
         default), returns (type, description) and code. Parameter types: string, \
         integer, float, boolean, list[string]. The code is a Rhai script defining \
         exactly one function named after the tool with one argument per parameter. \
         Scripts have no file or network access.\n\
         2. agents.json: {{\"agents\": [...]}}, each with id, name, system_prompt, \
         tool_names, temperature and max_retries. Give every agent a detailed \
         system prompt describing its expertise and when it should delegate.\n\
         3. team.json: name, description, agent_ids, edges ({{\"from\", \"to\", \
         \"description\"}}) and entry_point. Every agent must be reachable from \
         the entry point.\n\n\
         Every agent can always use these built-in tools, do not define them:\n\
         {defaults_list}\n\
         Output each file as a fenced block labelled with its file name, for \
         example:\n\
         ```json team.json\n{{ ... }}\n```",
        task = task.trim(),
        defaults_list = defaults_list
    )
}

/// Assemble and check a bundle from the three documents. Tools are compiled
/// so a broken script is caught before any run.
pub fn assemble_candidate(
    tools: Option<&str>,
    agents: Option<&str>,
    team: Option<&str>,
) -> Result<TeamBundle, EvoError> {
    let (Some(agents), Some(team)) = (agents, team) else {
        let missing: Vec<&str> = [(AGENTS_FILE, agents), (TEAM_FILE, team)]
            .iter()
            .filter(|(_, doc)| doc.is_none())
            .map(|(name, _)| *name)
            .collect();
        return Err(EvoError::Build(format!("missing {}", missing.join(", "))));
    };

    let bundle = loader::bundle_from_json(tools, agents, team)
        .map_err(|e| EvoError::Build(e.to_string()))?;
    graph::validate_bundle(&bundle).map_err(|e| EvoError::Build(e.to_string()))?;
    ToolRegistry::build(&bundle.tools).map_err(|e| EvoError::Build(e.to_string()))?;
    Ok(bundle)
}

/// Pull the three documents out of fenced ```` ```json <file> ```` blocks.
pub fn candidate_from_text(text: &str) -> Result<TeamBundle, EvoError> {
    let blocks = util::fenced_blocks(text);
    assemble_candidate(
        util::labelled_json_block(&blocks, TOOLS_FILE),
        util::labelled_json_block(&blocks, AGENTS_FILE),
        util::labelled_json_block(&blocks, TEAM_FILE),
    )
}

// ─── One-shot builder ───────────────────────────────────────────

/// A single model call that answers with the three fenced files.
pub struct OneShotBuilder {
    provider: Arc<dyn ModelProvider>,
    model_id: String,
    temperature: f32,
    retry: RetryConfig,
}

impl OneShotBuilder {
    pub fn new(provider: Arc<dyn ModelProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            model_id: config.models.builder_model().to_string(),
            temperature: config.evolution.builder_temperature,
            retry: config.retry.clone(),
        }
    }
}

#[async_trait]
impl TeamBuilder for OneShotBuilder {
    async fn build(&self, task: &str) -> Result<TeamBundle, EvoError> {
        let request = ChatRequest::new(
            &self.model_id,
            vec![Message::user(build_instructions(task))],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(BUILDER_MAX_TOKENS);

        let response = chat_with_retry(self.provider.as_ref(), request, &self.retry)
            .await
            .map_err(|f| f.error)?;
        candidate_from_text(&response.content)
    }
}

// ─── Builder team ───────────────────────────────────────────────

/// A team whose job is writing another team's configuration files.
pub struct BuilderTeam {
    provider: Arc<dyn ModelProvider>,
    bundle: TeamBundle,
    config: EngineConfig,
}

impl BuilderTeam {
    pub fn new(provider: Arc<dyn ModelProvider>, bundle: TeamBundle, config: &EngineConfig) -> Self {
        Self {
            provider,
            bundle,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl TeamBuilder for BuilderTeam {
    async fn build(&self, task: &str) -> Result<TeamBundle, EvoError> {
        let runner = TeamRunner::new(self.provider.as_ref(), &self.config);
        let result = runner
            .run(&self.bundle, &build_instructions(task), &BTreeMap::new())
            .await?;
        candidate_from_result(&result)
    }
}

/// Prefer files the builder wrote; fall back to fenced blocks in its outputs.
pub fn candidate_from_result(result: &TeamResult) -> Result<TeamBundle, EvoError> {
    let file = |name: &str| -> Option<&str> {
        result
            .files
            .iter()
            .find(|(path, _)| path.rsplit('/').next() == Some(name))
            .map(|(_, content)| content.as_str())
    };

    if file(AGENTS_FILE).is_some() && file(TEAM_FILE).is_some() {
        return assemble_candidate(file(TOOLS_FILE), file(AGENTS_FILE), file(TEAM_FILE));
    }

    let outputs: Vec<&str> = result
        .execution_history
        .iter()
        .map(|e| e.result.final_response.as_str())
        .collect();
    tracing::debug!("Builder wrote no team files, reading fenced blocks from outputs");
    candidate_from_text(&outputs.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentResult, ExecutionEntry, Termination};
    use crate::provider::{ChatResponse, MockModelProvider};

    const REPLY: &str = "Here is the team.\n\
        ```json tools.json\n{\"tools\": [{\"id\": \"shout\", \"name\": \"shout\", \"description\": \"Uppercase\",\
         \"parameters\": [{\"name\": \"text\", \"type\": \"string\"}], \"code\": \"fn shout(text) { text.to_upper() }\"}]}\n```\n\
        ```json agents.json\n{\"agents\": [{\"id\": \"lead\", \"name\": \"Lead\", \"system_prompt\": \"Plan.\"},\
         {\"id\": \"dev\", \"name\": \"Dev\", \"system_prompt\": \"Build.\", \"tool_names\": [\"shout\"]}]}\n```\n\
        ```json team.json\n{\"name\": \"Crew\", \"agent_ids\": [\"lead\", \"dev\"],\
         \"edges\": [{\"from\": \"lead\", \"to\": \"dev\"}], \"entry_point\": \"lead\"}\n```";

    #[test]
    fn test_candidate_from_text() {
        let bundle = candidate_from_text(REPLY).unwrap();
        assert_eq!(bundle.team.name, "Crew");
        assert_eq!(bundle.agents.len(), 2);
        assert_eq!(bundle.tools[0].id, "shout");
    }

    #[test]
    fn test_missing_team_block() {
        let err = candidate_from_text("```json agents.json\n{\"agents\": []}\n```").unwrap_err();
        assert_eq!(err.to_string(), "Builder produced no usable team: missing team.json");
    }

    #[test]
    fn test_invalid_team_is_build_error() {
        let text = "```json agents.json\n[]\n```\n```json team.json\n{\"name\": \"X\", \"agent_ids\": [\"a\"], \"entry_point\": \"b\"}\n```";
        assert!(matches!(candidate_from_text(text), Err(EvoError::Build(_))));
    }

    #[test]
    fn test_instructions_list_builtin_tools() {
        let text = build_instructions("Write a haiku");
        assert!(text.contains("=== ORIGINAL TASK ===\nWrite a haiku"));
        assert!(text.contains("read_file("));
        assert!(text.contains("write_file("));
    }

    #[test]
    fn test_candidate_prefers_workspace_files() {
        let blocks = util::fenced_blocks(REPLY);
        let mut files = BTreeMap::new();
        files.insert(
            "out/agents.json".to_string(),
            util::labelled_json_block(&blocks, AGENTS_FILE).unwrap().to_string(),
        );
        files.insert(
            "team.json".to_string(),
            util::labelled_json_block(&blocks, TEAM_FILE).unwrap().to_string(),
        );
        files.insert(
            "tools.json".to_string(),
            util::labelled_json_block(&blocks, TOOLS_FILE).unwrap().to_string(),
        );
        let result = TeamResult {
            team_id: "b".into(),
            team_name: "Builder".into(),
            rounds: 1,
            termination: Termination::Finished,
            execution_history: vec![ExecutionEntry {
                round: 0,
                agent_id: "arch".into(),
                agent_name: "Architect".into(),
                task: "t".into(),
                result: AgentResult {
                    agent_id: "arch".into(),
                    final_response: "Files written. <FINISHED>".into(),
                    iterations: 1,
                    finished: true,
                    exhausted: false,
                    delegation: None,
                    tool_calls: vec![],
                },
            }],
            transcript: vec![],
            agent_outputs: BTreeMap::new(),
            files,
        };
        assert_eq!(candidate_from_result(&result).unwrap().team.name, "Crew");
    }

    #[tokio::test]
    async fn test_one_shot_builder_uses_builder_temperature() {
        let mut mock = MockModelProvider::new();
        mock.expect_id().return_const("mock".to_string());
        mock.expect_chat().times(1).returning(|req| {
            assert_eq!(req.temperature, Some(0.8));
            Ok(ChatResponse::text(REPLY))
        });
        let builder = OneShotBuilder::new(Arc::new(mock), &EngineConfig::default());
        let bundle = builder.build("task").await.unwrap();
        assert_eq!(bundle.team.entry_point, "lead");
    }
}

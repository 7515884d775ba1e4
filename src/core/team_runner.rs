// src/core/team_runner.rs — Delegation state machine over a team graph
//
// Round = one agent activation. The machine starts at the entry point and
// follows delegations along edges until an agent finishes or answers without
// delegating. `max_rounds` is the only termination guarantee for cyclic
// graphs; hitting it ends the run as a partial success.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::agent_runner::{AgentRunner, AgentTurn};
use super::graph;
use super::truncation;
use super::types::*;
use super::workspace::Workspace;
use crate::infra::errors::EvoError;
use crate::provider::ModelProvider;
use crate::tools::{ScriptCache, ToolRegistry};

/// Earlier agents' outputs are cut to this many characters in later prompts.
const PREVIOUS_OUTPUT_CHARS: usize = 4000;

#[derive(Debug)]
enum TeamState {
    AwaitingAgent { agent_id: String, task: String },
    Finished(Termination),
    Failed(EvoError),
}

/// A failed team run. `partial` holds the rounds played before the failure,
/// if any were.
#[derive(Debug)]
pub struct TeamFailure {
    pub error: EvoError,
    pub partial: Option<TeamResult>,
}

impl From<EvoError> for TeamFailure {
    fn from(error: EvoError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

pub struct TeamRunner<'a> {
    provider: &'a dyn ModelProvider,
    config: &'a EngineConfig,
    max_rounds: u32,
    scripts: Arc<ScriptCache>,
}

impl<'a> TeamRunner<'a> {
    pub fn new(provider: &'a dyn ModelProvider, config: &'a EngineConfig) -> Self {
        Self {
            provider,
            config,
            max_rounds: config.run.max_rounds,
            scripts: Arc::new(ScriptCache::new()),
        }
    }

    /// Reuse tool scripts compiled by earlier runs.
    pub fn with_scripts(mut self, scripts: Arc<ScriptCache>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Validate the bundle and load every referenced tool. Runs before any
    /// model call so structural problems never cost tokens.
    pub fn prepare(bundle: &TeamBundle, scripts: Arc<ScriptCache>) -> Result<ToolRegistry, EvoError> {
        graph::validate_bundle(bundle)?;

        let referenced: HashSet<&str> = bundle
            .agents
            .iter()
            .filter(|a| bundle.team.has_agent(&a.id))
            .flat_map(|a| a.tool_ids.iter().map(String::as_str))
            .collect();

        let mut registry = ToolRegistry::with_cache(scripts);
        for tool in bundle.tools.iter().filter(|t| referenced.contains(t.id.as_str())) {
            registry.register(tool.clone())?;
        }
        Ok(registry)
    }

    /// Run `task` through the team.
    pub async fn run(
        &self,
        bundle: &TeamBundle,
        task: &str,
        seed_files: &BTreeMap<String, String>,
    ) -> Result<TeamResult, EvoError> {
        self.run_recorded(bundle, task, seed_files)
            .await
            .map_err(|f| f.error)
    }

    /// Like `run`, but a failure after the first round keeps the rounds
    /// played so far.
    #[tracing::instrument(skip_all, fields(team = %bundle.team.id))]
    pub async fn run_recorded(
        &self,
        bundle: &TeamBundle,
        task: &str,
        seed_files: &BTreeMap<String, String>,
    ) -> Result<TeamResult, TeamFailure> {
        let tools = Self::prepare(bundle, self.scripts.clone())?;
        let team = &bundle.team;
        let agents = AgentRunner::new(self.provider, &tools, self.config);
        let mut workspace = Workspace::from_files(seed_files);

        let mut history: Vec<ExecutionEntry> = Vec::new();
        let mut transcript: Vec<ChatMessage> = Vec::new();
        let mut outputs: BTreeMap<String, String> = BTreeMap::new();
        let mut previous: Vec<(String, String)> = Vec::new();

        let mut round: u32 = 0;
        let mut state = TeamState::AwaitingAgent {
            agent_id: team.entry_point.clone(),
            task: task.to_string(),
        };

        tracing::info!(
            team_name = %team.name,
            entry_point = %team.entry_point,
            max_rounds = self.max_rounds,
            "Team run started"
        );

        let outcome = loop {
            state = match state {
                TeamState::Finished(t) => break Ok(t),
                TeamState::Failed(e) => break Err(e),
                TeamState::AwaitingAgent { .. } if round >= self.max_rounds => {
                    tracing::info!(round, "Round limit reached, ending with partial result");
                    TeamState::Finished(Termination::RoundLimit)
                }
                TeamState::AwaitingAgent { agent_id, task } => {
                    let agent = bundle
                        .agent(&agent_id)
                        .ok_or_else(|| EvoError::not_found("Agent", &agent_id))?;

                    match agents
                        .run(agent, team, &task, &previous, &mut workspace)
                        .await
                    {
                        Err(e) => TeamState::Failed(e),
                        Ok(turn) => {
                            tracing::info!(
                                round,
                                agent = %agent.id,
                                iterations = turn.result.iterations,
                                delegate_to = turn.result.delegation.as_ref().map(|d| d.target.as_str()),
                                "Round complete"
                            );
                            let next = transition(team, &agent_id, &task, &turn);
                            record_turn(agent, &turn, &mut transcript);
                            outputs.insert(agent.id.clone(), turn.result.final_response.clone());
                            previous.retain(|(name, _)| name != &agent.name);
                            previous.push((
                                agent.name.clone(),
                                truncation::head_tail(&turn.result.final_response, PREVIOUS_OUTPUT_CHARS),
                            ));
                            history.push(ExecutionEntry {
                                round,
                                agent_id: agent.id.clone(),
                                agent_name: agent.name.clone(),
                                task,
                                result: turn.result,
                            });
                            round += 1;
                            next
                        }
                    }
                }
            };
        };

        let result = TeamResult {
            team_id: team.id.clone(),
            team_name: team.name.clone(),
            rounds: round,
            termination: outcome.as_ref().copied().unwrap_or(Termination::Failed),
            execution_history: history,
            transcript,
            agent_outputs: outputs,
            files: workspace.snapshot(),
        };

        match outcome {
            Ok(termination) => {
                tracing::info!(rounds = round, termination = ?termination, "Team run finished");
                Ok(result)
            }
            Err(error) => {
                tracing::warn!(round, "Team run failed: {}", error);
                Err(TeamFailure {
                    error,
                    partial: (round > 0).then_some(result),
                })
            }
        }
    }
}

/// Next state after `current` handled `task`.
fn transition(team: &Team, current: &str, task: &str, turn: &AgentTurn) -> TeamState {
    if let Some(d) = &turn.result.delegation {
        if !team.has_edge(current, &d.target) {
            return TeamState::Failed(EvoError::InvalidDelegation {
                from: current.to_string(),
                to: d.target.clone(),
            });
        }
        let sub_task = if d.task.is_empty() {
            task.to_string()
        } else {
            d.task.clone()
        };
        return TeamState::AwaitingAgent {
            agent_id: d.target.clone(),
            task: sub_task,
        };
    }
    if turn.result.finished {
        TeamState::Finished(Termination::Finished)
    } else {
        TeamState::Finished(Termination::Answered)
    }
}

fn record_turn(agent: &Agent, turn: &AgentTurn, transcript: &mut Vec<ChatMessage>) {
    transcript.extend(turn.messages.iter().map(|m| ChatMessage {
        agent_id: agent.id.clone(),
        agent_name: agent.name.clone(),
        role: m.role,
        content: m.content.clone(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, MockModelProvider};

    fn bundle(edges: &[(&str, &str)]) -> TeamBundle {
        TeamBundle {
            team: Team {
                id: "t".into(),
                name: "Pair".into(),
                description: String::new(),
                agent_ids: vec!["a".into(), "b".into()],
                edges: edges.iter().map(|(f, t)| TeamEdge::new(*f, *t)).collect(),
                entry_point: "a".into(),
            },
            agents: vec![Agent::new("a", "Alpha", "A"), Agent::new("b", "Beta", "B")],
            tools: vec![],
        }
    }

    fn always(text: &'static str) -> MockModelProvider {
        let mut mock = MockModelProvider::new();
        mock.expect_id().return_const("mock".to_string());
        mock.expect_chat()
            .returning(move |_| Ok(ChatResponse::text(text)));
        mock
    }

    #[test]
    fn test_transition_requires_edge() {
        let b = bundle(&[("a", "b")]);
        let turn = |target: &str| AgentTurn {
            result: AgentResult {
                agent_id: "x".into(),
                final_response: String::new(),
                iterations: 1,
                finished: false,
                exhausted: false,
                delegation: Some(Delegation {
                    target: target.into(),
                    task: String::new(),
                }),
                tool_calls: vec![],
            },
            messages: vec![],
        };

        match transition(&b.team, "a", "orig", &turn("b")) {
            TeamState::AwaitingAgent { agent_id, task } => {
                assert_eq!(agent_id, "b");
                // empty delegated task falls back to the current task
                assert_eq!(task, "orig");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            transition(&b.team, "b", "orig", &turn("a")),
            TeamState::Failed(EvoError::InvalidDelegation { .. })
        ));
    }

    #[tokio::test]
    async fn test_answer_without_markers_finishes_in_one_round() {
        let mock = always("All done, here is the answer.");
        let cfg = EngineConfig::default();
        let runner = TeamRunner::new(&mock, &cfg);
        let result = runner
            .run(&bundle(&[("a", "b")]), "task", &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(result.rounds, 1);
        assert_eq!(result.termination, Termination::Answered);
        assert_eq!(result.agent_outputs["a"], "All done, here is the answer.");
        assert_eq!(result.transcript.len(), 2);
        assert_eq!(result.transcript[0].agent_name, "Alpha");
    }

    #[tokio::test]
    async fn test_invalid_team_fails_before_model_call() {
        let mut mock = MockModelProvider::new();
        mock.expect_chat().never();
        let cfg = EngineConfig::default();
        let mut b = bundle(&[]);
        b.team.entry_point = "ghost".into();
        let err = TeamRunner::new(&mock, &cfg)
            .run(&b, "task", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EvoError::TeamValidation(_)));
    }

    #[tokio::test]
    async fn test_seed_files_visible_to_agents() {
        let mock = always("BEGIN_TOOL_CALL read_file\nBEGIN_ARG file_path\nspec.txt\nEND_ARG\nEND_TOOL_CALL\n<FINISHED>");
        let cfg = EngineConfig::default();
        let mut seed = BTreeMap::new();
        seed.insert("spec.txt".to_string(), "build a cli".to_string());
        let result = TeamRunner::new(&mock, &cfg)
            .run(&bundle(&[]), "read it", &seed)
            .await
            .unwrap();
        assert_eq!(result.termination, Termination::Finished);
        let call = &result.execution_history[0].result.tool_calls[0];
        assert!(call.success);
        assert!(call.output.ends_with("build a cli"));
        assert_eq!(result.files["spec.txt"], "build a cli");
    }
}

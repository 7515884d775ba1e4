// src/core/agent_runner.rs — Single-agent reasoning loop: model call, tool dispatch, markers

use super::markers::{self, ParsedResponse};
use super::system_prompt;
use super::truncation;
use super::types::*;
use super::workspace::Workspace;
use crate::infra::errors::EvoError;
use crate::provider::retry::chat_with_retry;
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::tools::ToolRegistry;

/// One agent activation's result plus its raw conversation.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub result: AgentResult,
    pub messages: Vec<Message>,
}

/// Drives one agent through up to `max_iterations` model calls.
pub struct AgentRunner<'a> {
    provider: &'a dyn ModelProvider,
    tools: &'a ToolRegistry,
    config: &'a EngineConfig,
}

impl<'a> AgentRunner<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        tools: &'a ToolRegistry,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run `agent` on `task`.
    ///
    /// Per iteration: tool calls execute in order, then a delegation stops the
    /// loop, then a finish marker stops it, then a response with no markers
    /// is the final answer. Tool failures are fed back and cost an iteration.
    /// Only an exhausted model-call retry budget is fatal.
    #[tracing::instrument(skip_all, fields(agent = %agent.id))]
    pub async fn run(
        &self,
        agent: &Agent,
        team: &Team,
        task: &str,
        previous_outputs: &[(String, String)],
        workspace: &mut Workspace,
    ) -> Result<AgentTurn, EvoError> {
        let system = system_prompt::build_agent_prompt(agent, team, self.tools);
        let first = system_prompt::build_task_message(task, previous_outputs, &workspace.tree());
        let mut messages = vec![Message::user(first)];

        let model = agent.model_or(&self.config.models.default);
        let retry = self.config.retry.with_max_retries(agent.max_retries);
        let max_iterations = agent
            .max_iterations
            .unwrap_or(self.config.run.max_iterations)
            .max(1);

        let mut tool_calls = Vec::new();
        let mut last_response = String::new();

        for iteration in 1..=max_iterations {
            let request = ChatRequest::new(model, messages.clone())
                .with_system(system.clone())
                .with_temperature(agent.temperature);

            let response = chat_with_retry(self.provider, request, &retry)
                .await
                .map_err(|f| EvoError::AgentCall {
                    agent_id: agent.id.clone(),
                    attempts: f.attempts,
                    message: f.error.to_string(),
                })?;

            let content = response.content;
            messages.push(Message::assistant(content.clone()));
            let parsed = markers::parse_response(&content);

            tracing::debug!(
                iteration,
                tool_calls = parsed.tool_calls.len(),
                delegation = parsed.delegation.is_some(),
                finished = parsed.finished,
                "Agent iteration"
            );

            if !parsed.tool_calls.is_empty() {
                let results = self.dispatch_tools(agent, &parsed, iteration, workspace);
                messages.push(Message::user(format_tool_results(&results)));
                tool_calls.extend(results);
            }

            let stop = parsed.delegation.is_some() || parsed.finished || !parsed.has_markers();
            last_response = content;

            if stop {
                return Ok(AgentTurn {
                    result: AgentResult {
                        agent_id: agent.id.clone(),
                        final_response: last_response,
                        iterations: iteration,
                        finished: parsed.finished && parsed.delegation.is_none(),
                        exhausted: false,
                        delegation: parsed.delegation,
                        tool_calls,
                    },
                    messages,
                });
            }
        }

        tracing::info!(max_iterations, "Agent iteration budget exhausted");
        Ok(AgentTurn {
            result: AgentResult {
                agent_id: agent.id.clone(),
                final_response: last_response,
                iterations: max_iterations,
                finished: false,
                exhausted: true,
                delegation: None,
                tool_calls,
            },
            messages,
        })
    }

    fn dispatch_tools(
        &self,
        agent: &Agent,
        parsed: &ParsedResponse,
        iteration: u32,
        workspace: &mut Workspace,
    ) -> Vec<ToolCallRecord> {
        let limit = self.config.run.tool_output_limit;
        parsed
            .tool_calls
            .iter()
            .map(|call| {
                let (success, output) = match self.tools.execute(agent, call, workspace) {
                    Ok(out) => (true, out),
                    Err(e) => {
                        tracing::warn!(tool = %call.tool, "Tool call failed: {}", e);
                        (false, e.to_string())
                    }
                };
                let truncated = truncation::truncate_tool_output(&output, limit);
                if truncated.was_truncated {
                    tracing::info!(
                        tool = %call.tool,
                        original_bytes = truncated.original_bytes,
                        "Truncated tool output",
                    );
                }
                ToolCallRecord {
                    iteration,
                    tool: call.tool.clone(),
                    arguments: call.arguments.clone(),
                    success,
                    output: truncated.content,
                }
            })
            .collect()
    }
}

/// `[TOOL RESULT: name]` blocks, one per call, separated by blank lines.
pub fn format_tool_results(results: &[ToolCallRecord]) -> String {
    results
        .iter()
        .map(|r| {
            let label = if r.success { "Success" } else { "Error" };
            format!("[TOOL RESULT: {}]\n{}: {}", r.tool, label, r.output)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

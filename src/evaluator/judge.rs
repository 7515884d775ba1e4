// src/evaluator/judge.rs — Judge prompt construction and single judge calls

use super::parser::{self, ParsedJudgement};
use super::Evaluator;
use crate::core::truncation;
use crate::core::types::{ExecutionEntry, TeamResult, ToolCallRecord};
use crate::infra::errors::EvoError;
use crate::provider::retry::chat_with_retry;
use crate::provider::{ChatRequest, Message, TokenUsage};

const TASK_EXCERPT_CHARS: usize = 200;
const AGENT_OUTPUT_CHARS: usize = 500;
const FILE_CHARS: usize = 1000;
const ARG_EXCERPT_CHARS: usize = 60;

pub const JUDGE_SYSTEM_PROMPT: &str = "\
You are an expert evaluator of multi-agent team outputs. Score how well the \
team accomplished the task on a scale from 0 to 10.

Scoring guide:
- 10: Perfect. Every requirement met, excellent quality.
- 8-9: Excellent. All major requirements met, minor issues at most.
- 6-7: Good. Most requirements met, some gaps.
- 4-5: Partial. Significant parts missing or incorrect.
- 2-3: Poor. Little of the task accomplished.
- 0-1: Failed. Nothing useful produced.

Consider:
1. Coverage: does the output address every requirement of the task?
2. Correctness: is the produced code or content right?
3. Approach: was the work split and executed efficiently?
4. Tool use: were tools used where they were needed, and did they succeed?
5. Delegation: did hand-offs between agents make sense?
6. Usability: could someone use the result as delivered?

Be strict but fair. Judge the files the team actually wrote, not what agents \
claimed to write.";

/// One judge call's parsed result.
pub(crate) struct JudgeSample {
    pub parsed: ParsedJudgement,
    pub usage: TokenUsage,
}

impl Evaluator {
    /// One judge call. Provider failures after retries are returned as errors;
    /// an unparseable reply is a sample with no score.
    pub(crate) async fn judge_once(
        &self,
        task: &str,
        result: &TeamResult,
    ) -> Result<JudgeSample, EvoError> {
        let request = ChatRequest::new(
            &self.model_id,
            vec![Message::user(build_judge_prompt(task, result))],
        )
        .with_system(JUDGE_SYSTEM_PROMPT)
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = chat_with_retry(self.provider.as_ref(), request, &self.retry)
            .await
            .map_err(|f| f.error)?;

        Ok(JudgeSample {
            parsed: parser::parse_judge_response(&response.content),
            usage: response.usage,
        })
    }
}

/// Build the judge's user prompt: task, execution history, agent outputs
/// and the files the team wrote.
pub fn build_judge_prompt(task: &str, result: &TeamResult) -> String {
    let mut prompt = String::with_capacity(8192);

    prompt.push_str("=== TASK ===\n");
    prompt.push_str(task.trim());
    prompt.push_str("\n\n=== EXECUTION HISTORY ===\n");
    if result.execution_history.is_empty() {
        prompt.push_str("No rounds executed\n");
    }
    for entry in &result.execution_history {
        append_round(&mut prompt, entry);
    }

    prompt.push_str("\n=== AGENT OUTPUTS ===\n");
    if result.agent_outputs.is_empty() {
        prompt.push_str("No agent outputs\n");
    }
    for (agent_id, output) in &result.agent_outputs {
        prompt.push_str(&format!(
            "**{}**:\n{}\n\n",
            agent_id,
            truncation::head_tail(output.trim(), AGENT_OUTPUT_CHARS)
        ));
    }

    prompt.push_str("\n=== OUTPUT FILES ===\n");
    if result.files.is_empty() {
        prompt.push_str("No files created\n");
    }
    for (path, content) in &result.files {
        prompt.push_str(&format!(
            "**{}**\n```\n{}\n```\n\n",
            path,
            truncation::head_tail(content, FILE_CHARS)
        ));
    }

    prompt.push_str(
        "\nEvaluate the team's work. Optionally score each of completeness, \
         correctness, quality, documentation and efficiency on its own line \
         as `name: N`. Respond in this format:\n\
         Score: X/10\n\
         Reasoning: ...",
    );
    prompt
}

fn append_round(prompt: &mut String, entry: &ExecutionEntry) {
    prompt.push_str(&format!("Round {}: {}\n", entry.round + 1, entry.agent_name));
    prompt.push_str(&format!(
        "Task: {}\n",
        truncation::head(entry.task.trim(), TASK_EXCERPT_CHARS)
    ));
    if !entry.result.tool_calls.is_empty() {
        prompt.push_str("Tools used:\n");
        for call in &entry.result.tool_calls {
            prompt.push_str(&format!("  - {}\n", describe_call(call)));
        }
    }
    if let Some(d) = &entry.result.delegation {
        prompt.push_str(&format!("Delegated to: {}\n", d.target));
    }
    prompt.push_str(&format!(
        "Iterations: {}\nFinished: {}\n\n",
        entry.result.iterations, entry.result.finished
    ));
}

fn describe_call(call: &ToolCallRecord) -> String {
    let args: Vec<String> = call
        .arguments
        .iter()
        .map(|(k, v)| format!("{}={}", k, truncation::head(v, ARG_EXCERPT_CHARS)))
        .collect();
    let status = if call.success { "" } else { " [failed]" };
    format!("{}({}){}", call.tool, args.join(", "), status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentResult, Delegation, Termination};
    use std::collections::BTreeMap;

    fn result() -> TeamResult {
        let mut args = BTreeMap::new();
        args.insert("file_path".to_string(), "main.py".to_string());
        let entry = ExecutionEntry {
            round: 0,
            agent_id: "lead".into(),
            agent_name: "Lead".into(),
            task: "x".repeat(300),
            result: AgentResult {
                agent_id: "lead".into(),
                final_response: "delegating".into(),
                iterations: 2,
                finished: false,
                exhausted: false,
                delegation: Some(Delegation {
                    target: "coder".into(),
                    task: "code it".into(),
                }),
                tool_calls: vec![ToolCallRecord {
                    iteration: 1,
                    tool: "write_file".into(),
                    arguments: args,
                    success: true,
                    output: "ok".into(),
                }],
            },
        };
        let mut outputs = BTreeMap::new();
        outputs.insert("lead".to_string(), "y".repeat(800));
        let mut files = BTreeMap::new();
        files.insert("main.py".to_string(), "print('hi')".to_string());
        TeamResult {
            team_id: "t".into(),
            team_name: "T".into(),
            rounds: 1,
            termination: Termination::Answered,
            execution_history: vec![entry],
            transcript: vec![],
            agent_outputs: outputs,
            files,
        }
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let prompt = build_judge_prompt("Build a CLI", &result());
        let task = prompt.find("=== TASK ===").unwrap();
        let history = prompt.find("=== EXECUTION HISTORY ===").unwrap();
        let outputs = prompt.find("=== AGENT OUTPUTS ===").unwrap();
        let files = prompt.find("=== OUTPUT FILES ===").unwrap();
        assert!(task < history && history < outputs && outputs < files);
        assert!(prompt.ends_with("Score: X/10\nReasoning: ..."));
    }

    #[test]
    fn test_history_details() {
        let prompt = build_judge_prompt("t", &result());
        assert!(prompt.contains("Round 1: Lead"));
        assert!(prompt.contains("  - write_file(file_path=main.py)"));
        assert!(prompt.contains("Delegated to: coder"));
        assert!(prompt.contains("Iterations: 2\nFinished: false"));
        // round task cut to 200 chars
        assert!(prompt.contains(&format!("Task: {}...", "x".repeat(200))));
    }

    #[test]
    fn test_long_output_cut_to_head_and_tail() {
        let prompt = build_judge_prompt("t", &result());
        assert!(prompt.contains(&format!("**lead**:\n{}...{}", "y".repeat(250), "y".repeat(250))));
        assert!(!prompt.contains(&"y".repeat(501)));
        assert!(prompt.contains("**main.py**\n```\nprint('hi')\n```"));
    }

    #[test]
    fn test_empty_sections() {
        let mut r = result();
        r.files.clear();
        assert!(build_judge_prompt("t", &r).contains("No files created"));
    }
}

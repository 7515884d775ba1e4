// src/core/types.rs — Core data types: tools, agents, teams, runs, evolutions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::infra::config::{
    Config, EvaluatorConfig, EvolutionConfig, MergeConfig, ModelsConfig, RunConfig,
};
use crate::provider::retry::RetryConfig;
use crate::provider::Role;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─── Tools ──────────────────────────────────────────────────────

/// Declared type of a tool parameter. Raw argument text is coerced to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    #[serde(rename = "string", alias = "str")]
    String,
    #[serde(rename = "integer", alias = "int")]
    Integer,
    #[serde(rename = "float", alias = "number")]
    Float,
    #[serde(rename = "boolean", alias = "bool")]
    Boolean,
    #[serde(rename = "list[string]", alias = "list", alias = "array")]
    StringList,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::StringList => "list[string]",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    List,
    Object,
    #[serde(other)]
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSpec {
    #[serde(rename = "type", default)]
    pub return_type: ReturnType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    #[serde(default)]
    pub returns: ReturnSpec,
    /// Rhai source defining one function named `name`.
    pub code: String,
}

impl Tool {
    /// Content hash over everything but the id. Equal fingerprints mean the
    /// same tool regardless of which team it came from.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.description.as_bytes());
        hasher.update([0]);
        for p in &self.parameters {
            hasher.update(p.name.as_bytes());
            hasher.update(p.param_type.to_string().as_bytes());
            hasher.update([p.required as u8]);
        }
        hasher.update([0]);
        hasher.update(self.code.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn param(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// One-line signature for prompts: `name(a: string, b: integer (optional))`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let opt = if p.required { "" } else { " (optional)" };
                format!("{}: {}{}", p.name, p.param_type, opt)
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

// ─── Agents ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    /// Tools beyond the always-available defaults.
    #[serde(default, alias = "tool_names")]
    pub tool_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: prompt.into(),
            tool_ids: Vec::new(),
            model: None,
            temperature: default_temperature(),
            max_iterations: None,
            max_retries: default_max_retries(),
        }
    }

    pub fn with_tools(mut self, tool_ids: &[&str]) -> Self {
        self.tool_ids = tool_ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn model_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(fallback)
    }
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_retries() -> u32 {
    3
}

// ─── Teams ──────────────────────────────────────────────────────

/// `from` may delegate to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TeamEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Builders may omit it; bundles are re-keyed on registration anyway.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub edges: Vec<TeamEdge>,
    pub entry_point: String,
}

impl Team {
    /// Outgoing edges of `agent_id`, in declaration order.
    pub fn neighbors<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a TeamEdge> {
        self.edges.iter().filter(move |e| e.from == agent_id)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.agent_ids.iter().any(|a| a == agent_id)
    }
}

/// A team with the agents and tools it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamBundle {
    pub team: Team,
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl TeamBundle {
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    /// Same bundle under a new team id. Agent ids are scoped by team in the
    /// store, so only the team needs re-keying.
    pub fn with_fresh_id(mut self) -> Self {
        self.team.id = new_id();
        self
    }
}

// ─── Run results ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub target: String,
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub iteration: u32,
    pub tool: String,
    pub arguments: BTreeMap<String, String>,
    pub success: bool,
    pub output: String,
}

/// What one agent activation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub final_response: String,
    pub iterations: u32,
    /// Explicit finish marker seen.
    pub finished: bool,
    /// Iteration budget ran out while the agent was still calling tools.
    pub exhausted: bool,
    pub delegation: Option<Delegation>,
    pub tool_calls: Vec<ToolCallRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub round: u32,
    pub agent_id: String,
    pub agent_name: String,
    pub task: String,
    pub result: AgentResult,
}

/// One line of the flattened transcript across all agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub agent_id: String,
    pub agent_name: String,
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// An agent emitted the finish marker.
    Finished,
    /// An agent answered without delegating.
    Answered,
    /// `max_rounds` reached; the result is partial.
    RoundLimit,
    /// The run failed; the result holds the rounds played before the failure.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamResult {
    pub team_id: String,
    pub team_name: String,
    pub rounds: u32,
    pub termination: Termination,
    pub execution_history: Vec<ExecutionEntry>,
    pub transcript: Vec<ChatMessage>,
    pub agent_outputs: BTreeMap<String, String>,
    /// Workspace snapshot after the last round.
    pub files: BTreeMap<String, String>,
}

impl TeamResult {
    pub fn final_output(&self) -> Option<&str> {
        self.execution_history
            .last()
            .map(|e| e.result.final_response.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.execution_history.is_empty() && self.agent_outputs.is_empty() && self.files.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub project_id: Option<String>,
    pub team_id: String,
    pub evolution_id: Option<String>,
    pub generation: Option<u32>,
    pub task: String,
    pub status: RunStatus,
    pub result: Option<TeamResult>,
    pub score: Option<f64>,
    pub score_rationale: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn start(team_id: impl Into<String>, task: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: None,
            team_id: team_id.into(),
            evolution_id: None,
            generation: None,
            task: task.into(),
            status: RunStatus::Running,
            result: None,
            score: None,
            score_rationale: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn complete(&mut self, result: TeamResult) {
        self.status = RunStatus::Completed;
        self.result = Some(result);
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: impl std::fmt::Display) {
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status != RunStatus::Running
    }
}

// ─── Projects & evolutions ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub task: String,
    /// Seed files (path → text) copied into every run's workspace.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            task: task.into(),
            files: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvolutionStatus {
    Generating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionStop {
    MaxGenerations,
    Plateau,
    InsufficientCandidates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evolution {
    pub id: String,
    pub project_id: String,
    pub population_size: usize,
    pub max_rounds: u32,
    pub generation: u32,
    pub team_ids: Vec<String>,
    pub run_ids: Vec<String>,
    /// Best score per completed generation.
    pub best_scores: Vec<f64>,
    pub merge_failures: Vec<String>,
    pub status: EvolutionStatus,
    pub stop_reason: Option<EvolutionStop>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evolution {
    pub fn new(project_id: impl Into<String>, population_size: usize, max_rounds: u32) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.into(),
            population_size,
            max_rounds,
            generation: 0,
            team_ids: Vec::new(),
            run_ids: Vec::new(),
            best_scores: Vec::new(),
            merge_failures: Vec::new(),
            status: EvolutionStatus::Generating,
            stop_reason: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_scores.iter().copied().reduce(f64::max)
    }
}

// ─── Engine configuration ───────────────────────────────────────

/// Runtime configuration threaded explicitly through controller, runners,
/// evaluator and merger.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub models: ModelsConfig,
    pub run: RunConfig,
    pub retry: RetryConfig,
    pub evaluator: EvaluatorConfig,
    pub merge: MergeConfig,
    pub evolution: EvolutionConfig,
}

impl From<&Config> for EngineConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            models: cfg.models.clone(),
            run: cfg.run.clone(),
            retry: RetryConfig::from(&cfg.retry),
            evaluator: cfg.evaluator.clone(),
            merge: cfg.merge.clone(),
            evolution: cfg.evolution.clone(),
        }
    }
}

// tests/common/mod.rs — Scripted model provider and team fixtures shared by integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use agentevo::core::types::{Agent, EngineConfig, Team, TeamBundle, TeamEdge};
use agentevo::infra::errors::EvoError;
use agentevo::provider::{ChatRequest, ChatResponse, ModelProvider};

type Respond = dyn Fn(&ChatRequest, usize) -> Result<ChatResponse, EvoError> + Send + Sync;

/// A provider that answers from a closure and never touches the network.
/// The closure also receives the zero-based index of the call.
pub struct ScriptedProvider {
    respond: Box<Respond>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        respond: impl Fn(&ChatRequest, usize) -> Result<ChatResponse, EvoError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            delay: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Hold every call open for `delay` so overlapping calls can be observed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reply by text only.
    pub fn text(respond: impl Fn(&ChatRequest) -> String + Send + Sync + 'static) -> Self {
        Self::new(move |req, _| Ok(ChatResponse::text(respond(req))))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were ever open at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, EvoError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = (self.respond)(&request, n);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

pub fn system_contains(req: &ChatRequest, needle: &str) -> bool {
    req.system
        .as_deref()
        .map(|s| s.contains(needle))
        .unwrap_or(false)
}

pub fn is_judge(req: &ChatRequest) -> bool {
    system_contains(req, "expert evaluator")
}

pub fn is_architect(req: &ChatRequest) -> bool {
    system_contains(req, "team architect")
}

pub fn is_builder(req: &ChatRequest) -> bool {
    req.messages
        .iter()
        .any(|m| m.content.contains("You are an AI team builder"))
}

/// Count of tool results already fed back in this conversation.
pub fn tool_results_seen(req: &ChatRequest) -> usize {
    req.messages
        .iter()
        .filter(|m| m.content.contains("[TOOL RESULT:"))
        .count()
}

/// Fast retries so failing-provider tests finish quickly.
pub fn config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.retry.initial_delay = Duration::from_millis(1);
    cfg.retry.max_delay = Duration::from_millis(2);
    cfg
}

/// Each agent's prompt is `ROLE:<id>` so the provider can tell them apart.
pub fn team(id: &str, agents: &[&str], edges: &[(&str, &str)], entry: &str) -> TeamBundle {
    TeamBundle {
        team: Team {
            id: id.into(),
            name: id.to_uppercase(),
            description: format!("{} test team", id),
            agent_ids: agents.iter().map(|a| a.to_string()).collect(),
            edges: edges.iter().map(|(f, t)| TeamEdge::new(*f, *t)).collect(),
            entry_point: entry.into(),
        },
        agents: agents
            .iter()
            .map(|a| Agent::new(*a, a.to_uppercase(), format!("ROLE:{}", a)))
            .collect(),
        tools: vec![],
    }
}

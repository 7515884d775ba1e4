// src/infra/errors.rs — Error types for agentevo

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvoError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Run-fatal errors
    #[error("Agent '{agent_id}' model call failed after {attempts} attempts: {message}")]
    AgentCall {
        agent_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Invalid delegation: no edge from '{from}' to '{to}'")]
    InvalidDelegation { from: String, to: String },

    #[error("Team validation failed: {}", .0.join("; "))]
    TeamValidation(Vec<String>),

    #[error("Merge rejected: {}", .0.join("; "))]
    MergeValidation(Vec<String>),

    // Tool errors (recoverable, surfaced to the agent)
    #[error("Tool '{tool}' argument error: {message}")]
    Argument { tool: String, message: String },

    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool '{tool}' could not be loaded: {message}")]
    ToolLoad { tool: String, message: String },

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    // Builder
    #[error("Builder produced no usable team: {0}")]
    Build(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    // Store
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("Run '{0}' is terminal and can no longer change")]
    RunTerminal(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EvoError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            EvoError::Provider {
                retriable: true,
                ..
            } | EvoError::RateLimited { .. }
        )
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EvoError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T, E = EvoError> = std::result::Result<T, E>;

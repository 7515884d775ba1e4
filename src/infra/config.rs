// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub evolution: EvolutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model used by agents that do not name one.
    pub default: String,
    pub judge: Option<String>,
    pub merger: Option<String>,
    pub builder: Option<String>,
    pub base_url: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: "gpt-4o".into(),
            judge: None,
            merger: None,
            builder: None,
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

impl ModelsConfig {
    pub fn judge_model(&self) -> &str {
        self.judge.as_deref().unwrap_or(&self.default)
    }

    pub fn merger_model(&self) -> &str {
        self.merger.as_deref().unwrap_or(&self.default)
    }

    pub fn builder_model(&self) -> &str {
        self.builder.as_deref().unwrap_or(&self.default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_rounds: u32,
    pub max_iterations: u32,
    pub max_retries: u32,
    /// Tool output longer than this (bytes) is truncated before the model sees it.
    pub tool_output_limit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            max_iterations: 10,
            max_retries: 3,
            tool_output_limit: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
            jitter_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub temperature: f32,
    /// Judge calls averaged per evaluation.
    pub samples: u32,
    pub max_tokens: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            samples: 1,
            max_tokens: 2000,
        }
    }
}

/// How two different tool definitions sharing an id are resolved during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Use the architect's `tool_preferences`, falling back to `Richer`.
    Model,
    /// More parameters, then longer code, then the first parent.
    Richer,
    /// Always the first parent.
    First,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub tool_tie_break: TieBreak,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4000,
            tool_tie_break: TieBreak::Model,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Keep the best N scored runs (N is raised to 2 if smaller).
    TopN(usize),
    /// Keep every run scoring at least this much.
    Threshold(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// K: candidates per generation.
    pub population_size: usize,
    pub max_generations: u32,
    pub selection: SelectionPolicy,
    pub plateau_patience: u32,
    pub min_improvement: f64,
    pub max_concurrent_runs: usize,
    pub builder_temperature: f32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 5,
            max_generations: 5,
            selection: SelectionPolicy::TopN(3),
            plateau_patience: 2,
            min_improvement: 0.25,
            max_concurrent_runs: 4,
            builder_temperature: 0.8,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.models.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.models.default, "gpt-4o");
        assert_eq!(c.run.max_rounds, 10);
        assert_eq!(c.run.max_retries, 3);
        assert!((c.evaluator.temperature - 0.3).abs() < 0.001);
        assert_eq!(c.evaluator.samples, 1);
        assert_eq!(c.merge.tool_tie_break, TieBreak::Model);
        assert_eq!(c.evolution.population_size, 5);
        assert_eq!(c.evolution.selection, SelectionPolicy::TopN(3));
    }

    #[test]
    fn test_role_models_fall_back_to_default() {
        let mut m = ModelsConfig::default();
        assert_eq!(m.judge_model(), "gpt-4o");
        m.judge = Some("gpt-4o-mini".into());
        assert_eq!(m.judge_model(), "gpt-4o-mini");
        assert_eq!(m.merger_model(), "gpt-4o");
    }

    #[test]
    fn test_parse_empty_toml() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c.run.max_iterations, 10);
    }

    #[test]
    fn test_parse_partial_sections() {
        let toml_str = r#"
[run]
max_rounds = 4

[evolution]
population_size = 3
selection = { threshold = 6.5 }

[merge]
tool_tie_break = "first"
"#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.run.max_rounds, 4);
        // unspecified fields keep their defaults
        assert_eq!(c.run.max_iterations, 10);
        assert_eq!(c.evolution.population_size, 3);
        assert_eq!(c.evolution.selection, SelectionPolicy::Threshold(6.5));
        assert_eq!(c.evolution.max_generations, 5);
        assert_eq!(c.merge.tool_tie_break, TieBreak::First);
    }

    #[test]
    fn test_parse_top_n_selection() {
        let c: Config = toml::from_str("[evolution]\nselection = { top_n = 2 }\n").unwrap();
        assert_eq!(c.evolution.selection, SelectionPolicy::TopN(2));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[models]\ndefault = \"local-model\"\n").unwrap();
        let c = Config::load_from(&path).unwrap();
        assert_eq!(c.models.default, "local-model");
        assert_eq!(c.models.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_invalid_tie_break_rejected() {
        let r: Result<Config, _> = toml::from_str("[merge]\ntool_tie_break = \"coin\"\n");
        assert!(r.is_err());
    }
}

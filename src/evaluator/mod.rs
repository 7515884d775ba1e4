// src/evaluator/mod.rs — Model-as-judge scoring of team results

pub mod judge;
pub mod parser;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::{EngineConfig, TeamResult};
use crate::infra::config::EvaluatorConfig;
use crate::infra::errors::EvoError;
use crate::provider::retry::RetryConfig;
use crate::provider::{ModelProvider, TokenUsage};

/// Score for one rubric dimension, 0-10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: String,
    pub score: f64,
}

/// Final judgement of one team result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Always within [0, 10].
    pub score: f64,
    pub rationale: String,
    /// Per-dimension scores averaged over the samples that reported them.
    #[serde(default)]
    pub dimensions: Vec<DimensionScore>,
    pub samples: u32,
}

impl Evaluation {
    fn zero(rationale: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            rationale: rationale.into(),
            dimensions: Vec::new(),
            samples: 0,
        }
    }
}

/// Stateless judge. Every call is independent.
pub struct Evaluator {
    provider: Arc<dyn ModelProvider>,
    model_id: String,
    config: EvaluatorConfig,
    retry: RetryConfig,
}

impl Evaluator {
    pub fn new(provider: Arc<dyn ModelProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            model_id: config.models.judge_model().to_string(),
            config: config.evaluator.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Score `result` against `task`.
    ///
    /// An empty result scores 0 without a model call. With `samples > 1` the
    /// judge is asked repeatedly and the scores are averaged; a reply with no
    /// parseable score counts as 0.
    #[tracing::instrument(skip_all, fields(team = %result.team_id))]
    pub async fn evaluate(&self, task: &str, result: &TeamResult) -> Result<Evaluation, EvoError> {
        if result.is_empty() {
            tracing::info!("Empty team result, scoring 0");
            return Ok(Evaluation::zero("The team produced no output."));
        }

        let samples = self.config.samples.max(1);
        let mut scores = Vec::with_capacity(samples as usize);
        let mut rationales = Vec::new();
        let mut dimensions: Vec<(String, f64, u32)> = Vec::new();
        let mut usage = TokenUsage::default();

        for i in 0..samples {
            let sample = self.judge_once(task, result).await?;
            usage.input_tokens += sample.usage.input_tokens;
            usage.output_tokens += sample.usage.output_tokens;

            let parsed = sample.parsed;
            match parsed.score {
                Some(score) => {
                    scores.push(score);
                    rationales.push(parsed.reasoning);
                }
                None => {
                    tracing::warn!(sample = i, "Judge reply had no score, counting as 0");
                    scores.push(0.0);
                    rationales.push(format!(
                        "Could not parse a score from the judge response: {}",
                        crate::core::truncation::head(&parsed.reasoning, 200)
                    ));
                }
            }

            for d in parsed.dimensions {
                match dimensions.iter_mut().find(|(name, _, _)| *name == d.dimension) {
                    Some(entry) => {
                        entry.1 += d.score;
                        entry.2 += 1;
                    }
                    None => dimensions.push((d.dimension, d.score, 1)),
                }
            }
        }

        let score = (scores.iter().sum::<f64>() / scores.len() as f64).clamp(0.0, 10.0);
        tracing::info!(
            score,
            samples,
            tokens = usage.total(),
            "Evaluation complete"
        );

        Ok(Evaluation {
            score,
            rationale: rationales.join("\n\n---\n\n"),
            dimensions: dimensions
                .into_iter()
                .map(|(dimension, sum, n)| DimensionScore {
                    dimension,
                    score: sum / n as f64,
                })
                .collect(),
            samples,
        })
    }
}

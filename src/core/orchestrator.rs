// src/core/orchestrator.rs — Run lifecycle: execute a team, score it, record it

use std::collections::BTreeMap;
use std::sync::Arc;

use super::team_runner::TeamRunner;
use super::types::*;
use crate::evaluator::Evaluator;
use crate::infra::errors::EvoError;
use crate::provider::ModelProvider;
use crate::store::Store;
use crate::tools::ScriptCache;

/// Where a run comes from and how it is scored.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub project_id: Option<String>,
    pub seed_files: BTreeMap<String, String>,
    pub evolution_id: Option<String>,
    pub generation: Option<u32>,
    /// Overrides `run.max_rounds` from the config.
    pub max_rounds: Option<u32>,
    /// Skip the judge; the run completes without a score.
    pub skip_evaluation: bool,
}

impl RunContext {
    pub fn for_project(project: &Project) -> Self {
        Self {
            project_id: Some(project.id.clone()),
            seed_files: project.files.clone(),
            ..Default::default()
        }
    }
}

/// Drives one Run from creation to its terminal state.
///
/// The Run is inserted as `running` before the team starts and written once
/// more when it reaches `completed` or `failed`. Team failures end up on the
/// Run record; only store errors are returned as `Err`.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn Store>,
    evaluator: Evaluator,
    config: EngineConfig,
    /// Shared by every run, so a tool definition compiles once.
    scripts: Arc<ScriptCache>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ModelProvider>, store: Arc<dyn Store>, config: EngineConfig) -> Self {
        let evaluator = Evaluator::new(provider.clone(), &config);
        Self {
            provider,
            store,
            evaluator,
            config,
            scripts: Arc::new(ScriptCache::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Execute `bundle` on `task`, evaluate the result and persist the Run.
    #[tracing::instrument(skip_all, fields(team = %bundle.team.id))]
    pub async fn execute(
        &self,
        bundle: &TeamBundle,
        task: &str,
        ctx: RunContext,
    ) -> Result<Run, EvoError> {
        let mut run = Run::start(&bundle.team.id, task);
        run.project_id = ctx.project_id.clone();
        run.evolution_id = ctx.evolution_id.clone();
        run.generation = ctx.generation;
        self.store.insert_run(&run)?;

        tracing::info!(run = %run.id, team_name = %bundle.team.name, "Run started");

        let mut runner =
            TeamRunner::new(self.provider.as_ref(), &self.config).with_scripts(self.scripts.clone());
        if let Some(max_rounds) = ctx.max_rounds {
            runner = runner.with_max_rounds(max_rounds);
        }

        match runner.run_recorded(bundle, task, &ctx.seed_files).await {
            Err(failure) => {
                tracing::warn!(run = %run.id, "Run failed: {}", failure.error);
                run.result = failure.partial;
                run.fail(&failure.error);
            }
            Ok(result) if ctx.skip_evaluation => run.complete(result),
            Ok(result) => match self.evaluator.evaluate(task, &result).await {
                Ok(evaluation) => {
                    run.score = Some(evaluation.score);
                    run.score_rationale = Some(evaluation.rationale);
                    run.complete(result);
                }
                Err(e) => {
                    // The team finished; keep its output but record a zero score.
                    tracing::warn!(run = %run.id, "Evaluation failed: {}", e);
                    run.score = Some(0.0);
                    run.score_rationale = Some(format!("Evaluation failed: {}", e));
                    run.result = Some(result);
                    run.fail(format!("Evaluation failed: {}", e));
                }
            },
        }

        self.store.update_run(&run)?;
        tracing::info!(
            run = %run.id,
            status = run.status.as_str(),
            score = run.score,
            "Run finished"
        );
        Ok(run)
    }
}

// src/evolution/controller.rs — Generational loop: build, run, score, select, merge

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;

use super::builder::TeamBuilder;
use super::selection::{self, Candidate};
use crate::core::orchestrator::{Orchestrator, RunContext};
use crate::core::types::{
    Evolution, EvolutionStatus, EvolutionStop, Project, Run, RunStatus, TeamBundle,
};
use crate::infra::config::EvolutionConfig;
use crate::infra::errors::EvoError;
use crate::merger::Merger;

/// Final state of an evolution plus every scored candidate, best first.
#[derive(Debug, Clone, Serialize)]
pub struct EvolutionSummary {
    pub evolution: Evolution,
    pub ranking: Vec<Candidate>,
}

impl EvolutionSummary {
    pub fn best(&self) -> Option<&Candidate> {
        self.ranking.first()
    }

    /// Human-readable report: best score per generation, then the top of the
    /// ranking.
    pub fn render(&self, top: usize) -> String {
        let mut out = format!(
            "Evolution {} ({})\n",
            self.evolution.id,
            match self.evolution.stop_reason {
                Some(EvolutionStop::MaxGenerations) => "max generations reached",
                Some(EvolutionStop::Plateau) => "scores plateaued",
                Some(EvolutionStop::InsufficientCandidates) => "too few scored candidates",
                None => "no stop reason",
            }
        );
        for (gen, score) in self.evolution.best_scores.iter().enumerate() {
            out.push_str(&format!("  Gen {}: best {:.2}\n", gen, score));
        }
        out.push_str("Final ranking:\n");
        for (i, c) in self.ranking.iter().take(top).enumerate() {
            out.push_str(&format!(
                "  {}. {} ({:.2}) team={}\n",
                i + 1,
                c.team_name,
                c.score,
                c.team_id
            ));
        }
        out
    }
}

/// Ties builder, orchestrator and merger together across generations.
///
/// Each generation is a hard barrier: every run finishes and is scored
/// before selection starts. Runs inside a generation share nothing but the
/// store and are bounded by `max_concurrent_runs`.
pub struct EvolutionController {
    orchestrator: Arc<Orchestrator>,
    merger: Merger,
    builder: Arc<dyn TeamBuilder>,
    config: EvolutionConfig,
}

impl EvolutionController {
    pub fn new(orchestrator: Arc<Orchestrator>, merger: Merger, builder: Arc<dyn TeamBuilder>) -> Self {
        let config = orchestrator.config().evolution.clone();
        Self {
            orchestrator,
            merger,
            builder,
            config,
        }
    }

    /// Run a full evolution for `project`. The Evolution record is stored up
    /// front and updated after every generation; a fatal error marks it
    /// failed before being returned.
    #[tracing::instrument(skip_all, fields(project = %project.id))]
    pub async fn evolve(&self, project: &Project) -> Result<EvolutionSummary, EvoError> {
        let store = self.orchestrator.store();
        if store.get_project(&project.id)?.is_none() {
            store.insert_project(project)?;
        }

        let mut evolution = Evolution::new(
            &project.id,
            self.config.population_size,
            self.orchestrator.config().run.max_rounds,
        );
        store.insert_evolution(&evolution)?;
        tracing::info!(
            evolution = %evolution.id,
            population = self.config.population_size,
            max_generations = self.config.max_generations,
            "Evolution started"
        );

        let mut scored = Vec::new();
        match self.generations(project, &mut evolution, &mut scored).await {
            Ok(stop) => {
                evolution.status = EvolutionStatus::Completed;
                evolution.stop_reason = Some(stop);
                evolution.updated_at = Utc::now();
                store.update_evolution(&evolution)?;
                tracing::info!(
                    evolution = %evolution.id,
                    generations = evolution.best_scores.len(),
                    best = evolution.best_score(),
                    reason = ?stop,
                    "Evolution completed"
                );
            }
            Err(e) => {
                tracing::error!(evolution = %evolution.id, "Evolution failed: {}", e);
                evolution.status = EvolutionStatus::Failed;
                evolution.error = Some(e.to_string());
                evolution.updated_at = Utc::now();
                // Keep the original error; a failed status write is only logged.
                if let Err(store_err) = store.update_evolution(&evolution) {
                    tracing::warn!("Could not record evolution failure: {}", store_err);
                }
                return Err(e);
            }
        }

        Ok(EvolutionSummary {
            evolution,
            ranking: selection::rank(scored),
        })
    }

    async fn generations(
        &self,
        project: &Project,
        evolution: &mut Evolution,
        scored: &mut Vec<Candidate>,
    ) -> Result<EvolutionStop, EvoError> {
        let k = self.config.population_size.max(1);
        let max_generations = self.config.max_generations.max(1);
        let mut population = self.build_candidates(&project.task, k, 0).await;

        loop {
            let gen = evolution.generation;
            let population_now = self.register(std::mem::take(&mut population), gen)?;
            tracing::info!(generation = gen, teams = population_now.len(), "Generation started");

            let runs = self.run_generation(project, evolution, &population_now).await?;
            let mut gen_scored = Vec::new();
            for (bundle, run) in population_now.iter().zip(&runs) {
                evolution.team_ids.push(bundle.team.id.clone());
                evolution.run_ids.push(run.id.clone());
                if let Some(candidate) = candidate(bundle, run, gen) {
                    gen_scored.push(candidate);
                }
            }

            let ranked = selection::rank(gen_scored);
            if let Some(best) = ranked.first() {
                evolution.best_scores.push(best.score);
            }
            evolution.updated_at = Utc::now();
            self.orchestrator.store().update_evolution(evolution)?;
            scored.extend(ranked.iter().cloned());

            tracing::info!(
                generation = gen,
                scored = ranked.len(),
                best = ranked.first().map(|c| c.score),
                "Generation finished"
            );

            if ranked.len() < 2 {
                return Ok(EvolutionStop::InsufficientCandidates);
            }
            if gen + 1 >= max_generations {
                return Ok(EvolutionStop::MaxGenerations);
            }
            if selection::plateaued(
                &evolution.best_scores,
                self.config.plateau_patience,
                self.config.min_improvement,
            ) {
                return Ok(EvolutionStop::Plateau);
            }

            let parents = selection::select(&ranked, &self.config.selection);
            let mut next = self
                .merge_parents(&parents, &population_now, k, evolution)
                .await;
            if next.len() < k {
                let missing = k - next.len();
                tracing::info!(generation = gen + 1, missing, "Topping up with fresh builds");
                next.extend(self.build_candidates(&project.task, missing, gen + 1).await);
            }

            evolution.generation += 1;
            population = next;
        }
    }

    /// Build `count` candidates concurrently. Failed builds are logged and
    /// dropped, so fewer than `count` bundles may come back.
    async fn build_candidates(&self, task: &str, count: usize, gen: u32) -> Vec<TeamBundle> {
        let semaphore = Semaphore::new(self.config.max_concurrent_runs.max(1));
        let builds = (0..count).map(|i| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok();
                match self.builder.build(task).await {
                    Ok(bundle) => Some(bundle),
                    Err(e) => {
                        tracing::warn!(generation = gen, candidate = i, "Build failed: {}", e);
                        None
                    }
                }
            }
        });
        join_all(builds).await.into_iter().flatten().collect()
    }

    /// Give each bundle a fresh team id and a generation label, then store it.
    fn register(&self, bundles: Vec<TeamBundle>, gen: u32) -> Result<Vec<TeamBundle>, EvoError> {
        let mut registered = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            let mut bundle = bundle.with_fresh_id();
            bundle.team.name = format!("Gen {} - {}", gen, bundle.team.name);
            self.orchestrator.store().insert_bundle(&bundle)?;
            registered.push(bundle);
        }
        Ok(registered)
    }

    /// Execute every team once, at most `max_concurrent_runs` at a time.
    /// Results line up with `population`.
    async fn run_generation(
        &self,
        project: &Project,
        evolution: &Evolution,
        population: &[TeamBundle],
    ) -> Result<Vec<Run>, EvoError> {
        let semaphore = Semaphore::new(self.config.max_concurrent_runs.max(1));
        let runs = population.iter().map(|bundle| {
            let semaphore = &semaphore;
            let ctx = RunContext {
                evolution_id: Some(evolution.id.clone()),
                generation: Some(evolution.generation),
                ..RunContext::for_project(project)
            };
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.orchestrator.execute(bundle, &project.task, ctx).await
            }
        });
        join_all(runs).await.into_iter().collect()
    }

    /// Merge parent pairs in rank order until `limit` children exist or the
    /// pairs run out. Rejected merges are recorded on the evolution.
    async fn merge_parents(
        &self,
        parents: &[Candidate],
        population: &[TeamBundle],
        limit: usize,
        evolution: &mut Evolution,
    ) -> Vec<TeamBundle> {
        let find = |team_id: &str| population.iter().find(|b| b.team.id == team_id);
        let mut children = Vec::new();

        for (i, j) in selection::pairs(parents.len(), usize::MAX) {
            if children.len() >= limit {
                break;
            }
            let (a, b) = (&parents[i], &parents[j]);
            let (Some(first), Some(second)) = (find(&a.team_id), find(&b.team_id)) else {
                continue;
            };
            match self.merger.merge(first, second).await {
                Ok(child) => children.push(child),
                Err(e) => {
                    tracing::warn!(first = %a.team_id, second = %b.team_id, "Merge failed: {}", e);
                    evolution
                        .merge_failures
                        .push(format!("{} + {}: {}", a.team_name, b.team_name, e));
                }
            }
        }
        children
    }
}

/// A run counts for selection only when it completed with a score.
fn candidate(bundle: &TeamBundle, run: &Run, gen: u32) -> Option<Candidate> {
    if run.status != RunStatus::Completed {
        return None;
    }
    Some(Candidate {
        team_id: bundle.team.id.clone(),
        team_name: bundle.team.name.clone(),
        run_id: run.id.clone(),
        generation: gen,
        score: run.score?,
    })
}

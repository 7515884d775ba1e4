// src/cli/evolve.rs — `agentevo evolve`: run a full evolution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::orchestrator::Orchestrator;
use crate::core::types::{EngineConfig, Project};
use crate::evolution::{BuilderTeam, EvolutionController, OneShotBuilder, TeamBuilder};
use crate::infra::config::Config;
use crate::loader;
use crate::merger::Merger;

pub struct EvolveArgs {
    pub task: String,
    pub builder: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub population: Option<usize>,
    pub generations: Option<u32>,
}

pub async fn run_evolve(config: &Config, db: Option<&Path>, args: EvolveArgs) -> anyhow::Result<()> {
    let task = super::read_task(&args.task)?;

    let mut engine = EngineConfig::from(config);
    if let Some(k) = args.population {
        engine.evolution.population_size = k;
    }
    if let Some(n) = args.generations {
        engine.evolution.max_generations = n;
    }

    let mut project = Project::new(
        args.project
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "evolution".into()),
        &task,
    );
    if let Some(dir) = &args.project {
        project.files = super::read_project_files(dir)?;
    }

    let store = super::open_store(db)?;
    let provider = super::make_provider(config)?;

    let builder: Arc<dyn TeamBuilder> = match &args.builder {
        Some(dir) => {
            let bundle = loader::load_team_dir(dir)?;
            tracing::info!(builder = %bundle.team.name, "Using builder team");
            Arc::new(BuilderTeam::new(provider.clone(), bundle, &engine))
        }
        None => Arc::new(OneShotBuilder::new(provider.clone(), &engine)),
    };
    let merger = Merger::new(provider.clone(), &engine);
    let orchestrator = Arc::new(Orchestrator::new(provider, store, engine));

    let controller = EvolutionController::new(orchestrator, merger, builder);
    let summary = controller.evolve(&project).await?;

    print!("{}", summary.render(5));
    for failure in &summary.evolution.merge_failures {
        eprintln!("  merge failed: {}", failure);
    }
    Ok(())
}

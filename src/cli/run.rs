// src/cli/run.rs — `agentevo run`: execute and score one team

use std::path::{Path, PathBuf};

use crate::core::orchestrator::{Orchestrator, RunContext};
use crate::core::types::{EngineConfig, Project, Run};
use crate::core::workspace::Workspace;
use crate::infra::config::Config;
use crate::loader;

pub struct RunArgs {
    pub team: PathBuf,
    pub task: String,
    pub project: Option<PathBuf>,
    pub max_rounds: Option<u32>,
    pub no_eval: bool,
    pub out: Option<PathBuf>,
}

/// Load the team, run it on the task, store the Run and print a summary.
pub async fn run_team(config: &Config, db: Option<&Path>, args: RunArgs) -> anyhow::Result<()> {
    let task = super::read_task(&args.task)?;
    let bundle = loader::load_team_dir(&args.team)?.with_fresh_id();

    let store = super::open_store(db)?;
    let provider = super::make_provider(config)?;

    let mut project = Project::new(project_name(&args), &task);
    if let Some(dir) = &args.project {
        project.files = super::read_project_files(dir)?;
    }
    store.insert_project(&project)?;
    store.insert_bundle(&bundle)?;

    let orchestrator = Orchestrator::new(provider, store, EngineConfig::from(config));
    let ctx = RunContext {
        max_rounds: args.max_rounds,
        skip_evaluation: args.no_eval,
        ..RunContext::for_project(&project)
    };
    let run = orchestrator.execute(&bundle, &task, ctx).await?;

    if let (Some(out), Some(result)) = (&args.out, &run.result) {
        Workspace::from_files(&result.files).save_to_dir(out)?;
        eprintln!("Workspace written to {}", out.display());
    }

    println!("{}", serde_json::to_string_pretty(&summary(&run))?);
    if let Some(error) = &run.error {
        anyhow::bail!("Run {} failed: {}", run.id, error);
    }
    Ok(())
}

fn project_name(args: &RunArgs) -> String {
    args.project
        .as_ref()
        .or(Some(&args.team))
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "adhoc".into())
}

/// What gets printed: status, score and the final answer, not the transcript.
pub fn summary(run: &Run) -> serde_json::Value {
    let result = run.result.as_ref();
    serde_json::json!({
        "run_id": run.id,
        "team_id": run.team_id,
        "status": run.status.as_str(),
        "score": run.score,
        "rationale": run.score_rationale,
        "error": run.error,
        "rounds": result.map(|r| r.rounds),
        "termination": result.map(|r| r.termination),
        "final_output": result.and_then(|r| r.final_output()),
        "files": result.map(|r| r.files.keys().collect::<Vec<_>>()),
    })
}

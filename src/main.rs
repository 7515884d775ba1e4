// src/main.rs — agentevo entry point

use std::path::Path;

use clap::Parser;

use agentevo::cli::evolve::{self, EvolveArgs};
use agentevo::cli::run::{self, RunArgs};
use agentevo::cli::{merge, validate, Cli, Commands};
use agentevo::infra::config::Config;
use agentevo::infra::logger;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG / AGENTEVO_LOG
    logger::init_logging("info");

    if let Err(e) = dispatch().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn dispatch() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };
    if let Some(model) = &cli.model {
        config.models.default = model.clone();
    }
    let db = cli.db.as_deref();

    match cli.command {
        Commands::Validate { dir } => validate::run_validate(&dir),
        Commands::Run {
            team,
            task,
            project,
            max_rounds,
            no_eval,
            out,
        } => {
            let args = RunArgs {
                team,
                task,
                project,
                max_rounds,
                no_eval,
                out,
            };
            run::run_team(&config, db, args).await
        }
        Commands::Merge { first, second, out } => {
            merge::run_merge(&config, db, &first, &second, &out).await
        }
        Commands::Evolve {
            task,
            builder,
            project,
            population,
            generations,
        } => {
            let args = EvolveArgs {
                task,
                builder,
                project,
                population,
                generations,
            };
            evolve::run_evolve(&config, db, args).await
        }
    }
}

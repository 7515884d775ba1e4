// src/cli/mod.rs — CLI definition (clap derive) and shared command helpers

pub mod evolve;
pub mod merge;
pub mod run;
pub mod validate;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::infra::config::Config;
use crate::infra::paths;
use crate::provider::openai::OpenAIProvider;
use crate::provider::ModelProvider;
use crate::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "agentevo", about = "Build, run and evolve teams of LLM agents", version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Default model for agents, judge, merger and builder
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// SQLite database path (defaults to the data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute one team on a task and score the result
    Run {
        /// Team directory (tools.json, agents.json, team.json)
        #[arg(long)]
        team: PathBuf,
        /// Task text, or @path to read it from a file
        #[arg(long)]
        task: String,
        /// Directory whose files seed the run workspace
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long)]
        max_rounds: Option<u32>,
        /// Skip the judge
        #[arg(long)]
        no_eval: bool,
        /// Write the final workspace files here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge two team directories into a new one
    Merge {
        first: PathBuf,
        second: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Evolve teams for a task over several generations
    Evolve {
        /// Task text, or @path to read it from a file
        #[arg(long)]
        task: String,
        /// Builder team directory; a single model call builds teams otherwise
        #[arg(long)]
        builder: Option<PathBuf>,
        /// Directory whose files seed every run workspace
        #[arg(long)]
        project: Option<PathBuf>,
        /// Candidates per generation
        #[arg(long)]
        population: Option<usize>,
        #[arg(long)]
        generations: Option<u32>,
    },
    /// Check a team directory without running it
    Validate { dir: PathBuf },
}

/// `@path` reads the task from a file; anything else is the task itself.
pub fn read_task(arg: &str) -> anyhow::Result<String> {
    let task = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Could not read task file {}: {}", path, e))?,
        None => arg.to_string(),
    };
    if task.trim().is_empty() {
        anyhow::bail!("Task is empty");
    }
    Ok(task)
}

/// Every UTF-8 file under `dir`, keyed by its `/`-separated relative path.
/// Hidden entries and non-text files are skipped.
pub fn read_project_files(dir: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(true);
            if hidden {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                tracing::debug!(path = %path.display(), "Skipping non-text project file");
                continue;
            };
            let relative = path.strip_prefix(dir)?;
            let key: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.insert(key.join("/"), content);
        }
    }
    Ok(files)
}

pub fn open_store(db: Option<&Path>) -> anyhow::Result<Arc<dyn Store>> {
    let path = db.map(Path::to_path_buf).unwrap_or_else(paths::db_path);
    tracing::debug!(db = %path.display(), "Opening store");
    Ok(Arc::new(SqliteStore::open(&path)?))
}

pub fn make_provider(config: &Config) -> anyhow::Result<Arc<dyn ModelProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key found. Set {} or change models.api_key_env in the config.",
            config.models.api_key_env
        )
    })?;
    Ok(Arc::new(OpenAIProvider::with_base_url(
        api_key,
        config.models.base_url.clone(),
    )))
}

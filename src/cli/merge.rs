// src/cli/merge.rs — `agentevo merge`: combine two team directories

use std::path::Path;

use crate::core::types::EngineConfig;
use crate::infra::config::Config;
use crate::loader;
use crate::merger::Merger;

/// Merge two team directories, record the result in the store and write it
/// out as a new team directory.
pub async fn run_merge(
    config: &Config,
    db: Option<&Path>,
    first: &Path,
    second: &Path,
    out: &Path,
) -> anyhow::Result<()> {
    let first = loader::load_team_dir(first)?;
    let second = loader::load_team_dir(second)?;
    let provider = super::make_provider(config)?;

    let merger = Merger::new(provider, &EngineConfig::from(config));
    let merged = merger.merge(&first, &second).await?;
    super::open_store(db)?.insert_bundle(&merged)?;
    loader::save_team_dir(&merged, out)?;

    println!(
        "Merged '{}' + '{}' into '{}' ({} agents, {} tools) at {}",
        first.team.name,
        second.team.name,
        merged.team.name,
        merged.agents.len(),
        merged.tools.len(),
        out.display()
    );
    Ok(())
}

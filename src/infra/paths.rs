// src/infra/paths.rs — Config and data path management
//
// All paths respect the AGENTEVO_HOME environment variable for isolation.
// When AGENTEVO_HOME is set, config and data live under that directory.
// When unset, config uses ~/.agentevo/ and data uses XDG_DATA_HOME/agentevo.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<Option<ProjectDirs>> = OnceLock::new();

fn project_dirs() -> Option<&'static ProjectDirs> {
    PROJECT_DIRS
        .get_or_init(|| ProjectDirs::from("", "", "agentevo"))
        .as_ref()
}

fn agentevo_home() -> Option<PathBuf> {
    std::env::var_os("AGENTEVO_HOME").map(PathBuf::from)
}

/// Home directory, falling back to the working directory when none is known.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $AGENTEVO_HOME/ or ~/.agentevo/
pub fn config_dir() -> PathBuf {
    if let Some(home) = agentevo_home() {
        return home;
    }
    dirs_home().join(".agentevo")
}

/// Data directory: $AGENTEVO_HOME/data/ or ~/.local/share/agentevo/
pub fn data_dir() -> PathBuf {
    if let Some(home) = agentevo_home() {
        return home.join("data");
    }
    match project_dirs() {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn db_path() -> PathBuf {
    data_dir().join("agentevo.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_under_data_dir() {
        assert!(db_path().starts_with(data_dir()));
        assert_eq!(db_path().file_name().unwrap(), "agentevo.db");
    }

    #[test]
    fn test_config_file_name() {
        assert_eq!(config_file_path().file_name().unwrap(), "config.toml");
    }
}

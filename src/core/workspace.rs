// src/core/workspace.rs — Project-scoped in-memory file workspace
//
// Every run gets its own workspace seeded from the project's files. The
// default file tools read and write here; nothing touches the real disk
// until `save_to_dir` is called explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("invalid path '{0}': must be relative and stay inside the workspace")]
    InvalidPath(String),
    #[error("file not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    files: BTreeMap<String, String>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a path → text map. Invalid paths are skipped with a warning.
    pub fn from_files(files: &BTreeMap<String, String>) -> Self {
        let mut ws = Self::new();
        for (path, content) in files {
            match normalize_path(path) {
                Ok(p) => {
                    ws.files.insert(p, content.clone());
                }
                Err(e) => tracing::warn!("Skipping seed file: {}", e),
            }
        }
        ws
    }

    pub fn read(&self, path: &str) -> Result<&str, WorkspaceError> {
        let key = normalize_path(path)?;
        self.files
            .get(&key)
            .map(String::as_str)
            .ok_or(WorkspaceError::NotFound(key))
    }

    /// Write or append; returns the normalized path.
    pub fn write(
        &mut self,
        path: &str,
        content: &str,
        mode: WriteMode,
    ) -> Result<String, WorkspaceError> {
        let key = normalize_path(path)?;
        let entry = self.files.entry(key.clone()).or_default();
        match mode {
            WriteMode::Overwrite => *entry = content.to_string(),
            WriteMode::Append => entry.push_str(content),
        }
        Ok(key)
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|k| self.files.contains_key(&k))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.files.clone()
    }

    /// Indented directory view for prompts.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        let mut printed_dirs: Vec<String> = Vec::new();
        for path in self.files.keys() {
            let parts: Vec<&str> = path.split('/').collect();
            for depth in 0..parts.len() - 1 {
                let dir = parts[..=depth].join("/");
                if !printed_dirs.contains(&dir) {
                    out.push_str(&"  ".repeat(depth));
                    out.push_str(parts[depth]);
                    out.push_str("/\n");
                    printed_dirs.push(dir);
                }
            }
            out.push_str(&"  ".repeat(parts.len() - 1));
            out.push_str(parts[parts.len() - 1]);
            out.push('\n');
        }
        out
    }

    pub fn save_to_dir(&self, dir: &Path) -> std::io::Result<()> {
        for (path, content) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }
        Ok(())
    }
}

/// Normalize to a relative `a/b/c` form. Rejects empty paths, absolute
/// paths (`/x`, `\x`, `C:\x`) and `..`.
pub fn normalize_path(path: &str) -> Result<String, WorkspaceError> {
    let trimmed = path.trim();
    let drive = trimmed.as_bytes().get(1) == Some(&b':')
        && trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if trimmed.starts_with(['/', '\\']) || drive {
        return Err(WorkspaceError::InvalidPath(path.to_string()));
    }
    let mut parts = Vec::new();
    for part in trimmed.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(WorkspaceError::InvalidPath(path.to_string())),
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return Err(WorkspaceError::InvalidPath(path.to_string()));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./src//main.rs").unwrap(), "src/main.rs");
        assert!(normalize_path("/abs/file.txt").is_err());
        assert!(normalize_path("\\\\server\\share.txt").is_err());
        assert!(normalize_path("C:\\temp\\x.txt").is_err());
        assert_eq!(normalize_path("notes:v2.md").unwrap(), "notes:v2.md");
        assert_eq!(normalize_path("a\\b.txt").unwrap(), "a/b.txt");
        assert!(normalize_path("../etc/passwd").is_err());
        assert!(normalize_path("a/../../b").is_err());
        assert!(normalize_path("  ").is_err());
    }

    #[test]
    fn test_write_read_append() {
        let mut ws = Workspace::new();
        ws.write("notes.md", "one", WriteMode::Overwrite).unwrap();
        ws.write("./notes.md", "+two", WriteMode::Append).unwrap();
        assert_eq!(ws.read("notes.md").unwrap(), "one+two");
        ws.write("notes.md", "fresh", WriteMode::Overwrite).unwrap();
        assert_eq!(ws.read("notes.md").unwrap(), "fresh");
    }

    #[test]
    fn test_read_missing() {
        let ws = Workspace::new();
        assert_eq!(
            ws.read("nope.txt"),
            Err(WorkspaceError::NotFound("nope.txt".into()))
        );
    }

    #[test]
    fn test_seed_skips_bad_paths() {
        let mut seed = BTreeMap::new();
        seed.insert("ok.txt".to_string(), "x".to_string());
        seed.insert("../bad.txt".to_string(), "y".to_string());
        let ws = Workspace::from_files(&seed);
        assert_eq!(ws.len(), 1);
        assert!(ws.exists("ok.txt"));
    }

    #[test]
    fn test_tree() {
        let mut ws = Workspace::new();
        ws.write("src/main.py", "", WriteMode::Overwrite).unwrap();
        ws.write("src/util/io.py", "", WriteMode::Overwrite).unwrap();
        ws.write("README.md", "", WriteMode::Overwrite).unwrap();
        assert_eq!(
            ws.tree(),
            "README.md\nsrc/\n  main.py\n  util/\n    io.py\n"
        );
    }

    #[test]
    fn test_save_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new();
        ws.write("pkg/a.txt", "hello", WriteMode::Overwrite).unwrap();
        ws.save_to_dir(dir.path()).unwrap();
        let written = std::fs::read_to_string(dir.path().join("pkg/a.txt")).unwrap();
        assert_eq!(written, "hello");
    }
}

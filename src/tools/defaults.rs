// src/tools/defaults.rs — Always-available file tools, scoped to the run workspace

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::core::types::{ParamType, ReturnSpec, ReturnType, Tool, ToolParameter};
use crate::core::workspace::{Workspace, WriteMode};
use crate::infra::errors::EvoError;

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";

/// Older configs refer to the defaults by these ids.
const LEGACY_IDS: [(&str, &str); 2] = [("file_reader", READ_FILE), ("file_writer", WRITE_FILE)];

pub fn is_default_tool(id: &str) -> bool {
    canonical_id(id).is_some()
}

/// Map a default tool id or legacy alias to its canonical id.
pub fn canonical_id(id: &str) -> Option<&'static str> {
    match id {
        READ_FILE => Some(READ_FILE),
        WRITE_FILE => Some(WRITE_FILE),
        _ => LEGACY_IDS
            .iter()
            .find(|(legacy, _)| *legacy == id)
            .map(|(_, canonical)| *canonical),
    }
}

/// Definitions of the default tools, for prompts and argument checking.
pub fn definitions() -> &'static [Tool] {
    static DEFS: OnceLock<Vec<Tool>> = OnceLock::new();
    DEFS.get_or_init(|| vec![read_file_def(), write_file_def()])
}

pub fn definition(id: &str) -> Option<&'static Tool> {
    let id = canonical_id(id)?;
    definitions().iter().find(|t| t.id == id)
}

fn param(name: &str, description: &str, required: bool) -> ToolParameter {
    ToolParameter {
        name: name.into(),
        param_type: ParamType::String,
        description: description.into(),
        required,
        default: None,
    }
}

fn read_file_def() -> Tool {
    Tool {
        id: READ_FILE.into(),
        name: READ_FILE.into(),
        description: "Read the contents of a file in the project workspace".into(),
        parameters: vec![
            param("file_path", "Relative path of the file to read", true),
            param("encoding", "Text encoding (only utf-8 is supported)", false),
        ],
        returns: ReturnSpec {
            return_type: ReturnType::String,
            description: "File contents".into(),
        },
        code: String::new(),
    }
}

fn write_file_def() -> Tool {
    Tool {
        id: WRITE_FILE.into(),
        name: WRITE_FILE.into(),
        description: "Write content to a file in the project workspace".into(),
        parameters: vec![
            param("file_path", "Relative path of the file to write", true),
            param("content", "Content to write", true),
            param("mode", "'w' to overwrite (default) or 'a' to append", false),
            param("encoding", "Text encoding (only utf-8 is supported)", false),
        ],
        returns: ReturnSpec {
            return_type: ReturnType::String,
            description: "Confirmation message".into(),
        },
        code: String::new(),
    }
}

/// Execute a default tool against the workspace. Arguments are already
/// checked for required/unknown names by the caller.
pub fn execute(
    id: &str,
    args: &BTreeMap<String, String>,
    workspace: &mut Workspace,
) -> Result<String, EvoError> {
    match canonical_id(id) {
        Some(READ_FILE) => read_file(args, workspace),
        Some(WRITE_FILE) => write_file(args, workspace),
        _ => Err(EvoError::ToolNotFound(id.to_string())),
    }
}

fn check_encoding(tool: &str, args: &BTreeMap<String, String>) -> Result<(), EvoError> {
    match args.get("encoding").map(|e| e.trim().to_ascii_lowercase()) {
        None => Ok(()),
        Some(e) if e.is_empty() || e == "utf-8" || e == "utf8" => Ok(()),
        Some(e) => Err(EvoError::Argument {
            tool: tool.into(),
            message: format!("unsupported encoding '{}'", e),
        }),
    }
}

fn required<'a>(
    tool: &str,
    args: &'a BTreeMap<String, String>,
    name: &str,
) -> Result<&'a str, EvoError> {
    args.get(name).map(String::as_str).ok_or_else(|| EvoError::Argument {
        tool: tool.into(),
        message: format!("Missing required arguments: {}", name),
    })
}

fn read_file(args: &BTreeMap<String, String>, workspace: &Workspace) -> Result<String, EvoError> {
    check_encoding(READ_FILE, args)?;
    let path = required(READ_FILE, args, "file_path")?.trim();
    let content = workspace.read(path).map_err(|e| EvoError::ToolExecution {
        tool: READ_FILE.into(),
        message: e.to_string(),
    })?;
    Ok(format!(
        "Successfully read {} characters from {}\n\nContent:\n{}",
        content.chars().count(),
        path,
        content
    ))
}

fn write_file(
    args: &BTreeMap<String, String>,
    workspace: &mut Workspace,
) -> Result<String, EvoError> {
    check_encoding(WRITE_FILE, args)?;
    let path = required(WRITE_FILE, args, "file_path")?.trim();
    let content = required(WRITE_FILE, args, "content")?;
    let mode = match args.get("mode").map(|m| m.trim()) {
        None | Some("") | Some("w") => WriteMode::Overwrite,
        Some("a") => WriteMode::Append,
        Some(other) => {
            return Err(EvoError::Argument {
                tool: WRITE_FILE.into(),
                message: format!("mode must be 'w' or 'a', got '{}'", other),
            })
        }
    };

    let written = workspace
        .write(path, content, mode)
        .map_err(|e| EvoError::ToolExecution {
            tool: WRITE_FILE.into(),
            message: e.to_string(),
        })?;
    let verb = match mode {
        WriteMode::Overwrite => "overwrote",
        WriteMode::Append => "appended to",
    };
    Ok(format!(
        "Successfully {} {}. Wrote {} characters.",
        verb,
        written,
        content.chars().count()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_legacy_ids() {
        assert_eq!(canonical_id("file_reader"), Some(READ_FILE));
        assert_eq!(canonical_id("file_writer"), Some(WRITE_FILE));
        assert!(is_default_tool("read_file"));
        assert!(!is_default_tool("calculator"));
        assert_eq!(definition("file_writer").unwrap().parameters.len(), 4);
    }

    #[test]
    fn test_write_then_read() {
        let mut ws = Workspace::new();
        let out = execute(
            WRITE_FILE,
            &args(&[("file_path", "out/hello.txt"), ("content", "hi there")]),
            &mut ws,
        )
        .unwrap();
        assert_eq!(out, "Successfully overwrote out/hello.txt. Wrote 8 characters.");

        let out = execute(READ_FILE, &args(&[("file_path", "out/hello.txt")]), &mut ws).unwrap();
        assert_eq!(
            out,
            "Successfully read 8 characters from out/hello.txt\n\nContent:\nhi there"
        );
    }

    #[test]
    fn test_append_mode() {
        let mut ws = Workspace::new();
        execute(WRITE_FILE, &args(&[("file_path", "log"), ("content", "a")]), &mut ws).unwrap();
        let out = execute(
            WRITE_FILE,
            &args(&[("file_path", "log"), ("content", "b"), ("mode", "a")]),
            &mut ws,
        )
        .unwrap();
        assert!(out.starts_with("Successfully appended to log."));
        assert_eq!(ws.read("log").unwrap(), "ab");
    }

    #[test]
    fn test_bad_mode_is_argument_error() {
        let mut ws = Workspace::new();
        let err = execute(
            WRITE_FILE,
            &args(&[("file_path", "x"), ("content", "y"), ("mode", "rw")]),
            &mut ws,
        )
        .unwrap_err();
        assert!(matches!(err, EvoError::Argument { .. }));
    }

    #[test]
    fn test_escape_rejected() {
        let mut ws = Workspace::new();
        let err = execute(
            WRITE_FILE,
            &args(&[("file_path", "../../etc/passwd"), ("content", "x")]),
            &mut ws,
        )
        .unwrap_err();
        assert!(matches!(err, EvoError::ToolExecution { .. }));

        let err = execute(
            WRITE_FILE,
            &args(&[("file_path", "/etc/passwd"), ("content", "x")]),
            &mut ws,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be relative"));
        assert!(ws.is_empty());
    }

    #[test]
    fn test_read_missing_file() {
        let mut ws = Workspace::new();
        let err = execute(READ_FILE, &args(&[("file_path", "nope")]), &mut ws).unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }
}

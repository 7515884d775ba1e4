// src/core/markers.rs — Parse tool-call, delegation and finish markers from model output

use std::collections::BTreeMap;

use super::types::Delegation;

pub const FINISH_MARKER: &str = "<FINISHED>";
pub const DELEGATE_OPEN: &str = "[DELEGATE:";

const BEGIN_TOOL_CALL: &str = "BEGIN_TOOL_CALL";
const END_TOOL_CALL: &str = "END_TOOL_CALL";
const BEGIN_ARG: &str = "BEGIN_ARG";
const END_ARG: &str = "END_ARG";
const TRIPLE_QUOTE: &str = "\"\"\"";

/// A tool invocation requested by the model, arguments still raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: BTreeMap<String, String>,
}

/// Everything the agent loop needs from one model response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// In order of appearance.
    pub tool_calls: Vec<ToolInvocation>,
    /// First delegation marker, if any.
    pub delegation: Option<Delegation>,
    pub finished: bool,
}

impl ParsedResponse {
    pub fn has_markers(&self) -> bool {
        !self.tool_calls.is_empty() || self.delegation.is_some() || self.finished
    }
}

/// Parse a model response.
///
/// Expected format:
/// ```text
/// BEGIN_TOOL_CALL write_file
/// BEGIN_ARG file_path
/// notes.md
/// END_ARG
/// END_TOOL_CALL
///
/// [DELEGATE: reviewer]
/// Check notes.md for typos.
///
/// <FINISHED>
/// ```
///
/// Tool-call blocks without `END_TOOL_CALL` are dropped as calls, but their
/// lines stay in the prose so a later delegation or finish marker still
/// counts. Markers inside closed tool-call blocks (e.g. in file content) are
/// ignored.
pub fn parse_response(response: &str) -> ParsedResponse {
    let mut tool_calls = Vec::new();
    let mut prose = String::new();
    let mut block: Option<BlockState> = None;

    for line in response.lines() {
        let trimmed = line.trim();

        let Some(state) = block.as_mut() else {
            if let Some(name) = keyword_arg(trimmed, BEGIN_TOOL_CALL) {
                block = Some(BlockState::new(name, line));
            } else {
                prose.push_str(line);
                prose.push('\n');
            }
            continue;
        };
        state.raw.push(line.to_string());

        if trimmed == END_TOOL_CALL {
            if let Some(mut state) = block.take() {
                state.close_arg();
                tool_calls.push(ToolInvocation {
                    tool: state.tool,
                    arguments: state.arguments,
                });
            }
            continue;
        }

        if state.current.is_some() {
            if trimmed == END_ARG {
                state.close_arg();
            } else if let Some(name) = keyword_arg(trimmed, BEGIN_ARG) {
                // tolerate a missing END_ARG
                state.close_arg();
                state.current = Some((name.to_string(), Vec::new()));
            } else if let Some((_, lines)) = state.current.as_mut() {
                lines.push(line.to_string());
            }
        } else if let Some(name) = keyword_arg(trimmed, BEGIN_ARG) {
            state.current = Some((name.to_string(), Vec::new()));
        }
    }

    if let Some(unterminated) = block {
        for line in unterminated.raw {
            prose.push_str(&line);
            prose.push('\n');
        }
    }

    ParsedResponse {
        tool_calls,
        delegation: parse_delegation(&prose),
        finished: prose.contains(FINISH_MARKER),
    }
}

struct BlockState {
    tool: String,
    arguments: BTreeMap<String, String>,
    current: Option<(String, Vec<String>)>,
    /// Lines as written, returned to the prose if the block never closes.
    raw: Vec<String>,
}

impl BlockState {
    fn new(tool: &str, opening: &str) -> Self {
        Self {
            tool: tool.to_string(),
            arguments: BTreeMap::new(),
            current: None,
            raw: vec![opening.to_string()],
        }
    }

    fn close_arg(&mut self) {
        if let Some((name, lines)) = self.current.take() {
            self.arguments.insert(name, arg_value(lines));
        }
    }
}

/// `KEYWORD name` → `name`; `None` when the keyword or the name is missing.
fn keyword_arg<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim();
    (!name.is_empty()).then_some(name)
}

fn arg_value(mut lines: Vec<String>) -> String {
    let fenced = lines.len() >= 2
        && lines.first().map(|l| l.trim()) == Some(TRIPLE_QUOTE)
        && lines.last().map(|l| l.trim()) == Some(TRIPLE_QUOTE);
    if fenced {
        lines.pop();
        lines.remove(0);
        return lines.join("\n");
    }
    lines.join("\n").trim_matches('\n').to_string()
}

/// First `[DELEGATE: id]` with a valid id; the task runs to the next
/// delegation marker or the end, with finish markers removed.
fn parse_delegation(text: &str) -> Option<Delegation> {
    let mut rest = text;
    while let Some(start) = rest.find(DELEGATE_OPEN) {
        let after = &rest[start + DELEGATE_OPEN.len()..];
        let Some(close) = after.find(']') else {
            return None;
        };
        let target = after[..close].trim();
        let body = &after[close + 1..];

        if is_agent_id(target) {
            let end = body.find(DELEGATE_OPEN).unwrap_or(body.len());
            let task = body[..end].replace(FINISH_MARKER, "").trim().to_string();
            return Some(Delegation {
                target: target.to_string(),
                task,
            });
        }
        rest = body;
    }
    None
}

fn is_agent_id(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ─── Tool calls ─────────────────────────────────────────────

    #[test]
    fn test_single_tool_call() {
        let resp = "Let me add.\nBEGIN_TOOL_CALL add\nBEGIN_ARG a\n2\nEND_ARG\nBEGIN_ARG b\n3\nEND_ARG\nEND_TOOL_CALL\n";
        let parsed = parse_response(resp);
        assert_eq!(parsed.tool_calls.len(), 1);
        let call = &parsed.tool_calls[0];
        assert_eq!(call.tool, "add");
        assert_eq!(call.arguments["a"], "2");
        assert_eq!(call.arguments["b"], "3");
        assert!(parsed.delegation.is_none());
        assert!(!parsed.finished);
    }

    #[test]
    fn test_multiline_argument_preserved() {
        let resp = "BEGIN_TOOL_CALL write_file\nBEGIN_ARG file_path\nmain.py\nEND_ARG\nBEGIN_ARG content\ndef main():\n    print(1)\n\nmain()\nEND_ARG\nEND_TOOL_CALL";
        let call = &parse_response(resp).tool_calls[0];
        assert_eq!(call.arguments["content"], "def main():\n    print(1)\n\nmain()");
    }

    #[test]
    fn test_triple_quoted_argument() {
        let resp = "BEGIN_TOOL_CALL write_file\nBEGIN_ARG content\n\"\"\"\n  indented\nEND_ARG inside\n\"\"\"\nEND_ARG\nEND_TOOL_CALL";
        let call = &parse_response(resp).tool_calls[0];
        assert_eq!(call.arguments["content"], "  indented\nEND_ARG inside");
    }

    #[test]
    fn test_calls_kept_in_order() {
        let resp = "BEGIN_TOOL_CALL first\nEND_TOOL_CALL\ntext\nBEGIN_TOOL_CALL second\nEND_TOOL_CALL";
        let names: Vec<_> = parse_response(resp)
            .tool_calls
            .into_iter()
            .map(|c| c.tool)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_unterminated_block_dropped() {
        let resp = "BEGIN_TOOL_CALL ok\nEND_TOOL_CALL\nBEGIN_TOOL_CALL broken\nBEGIN_ARG x\n1\nEND_ARG";
        let parsed = parse_response(resp);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].tool, "ok");
    }

    #[test]
    fn test_markers_after_unterminated_block_still_count() {
        let resp = "BEGIN_TOOL_CALL write_file\nBEGIN_ARG file_path\nplan.md\nEND_ARG\n[DELEGATE: coder] implement x\n<FINISHED>";
        let parsed = parse_response(resp);
        assert!(parsed.tool_calls.is_empty());
        assert_eq!(
            parsed.delegation,
            Some(Delegation {
                target: "coder".into(),
                task: "implement x".into()
            })
        );
        assert!(parsed.finished);
    }

    #[test]
    fn test_missing_end_arg_tolerated() {
        let resp = "BEGIN_TOOL_CALL write_file\nBEGIN_ARG file_path\nhello.py\nBEGIN_ARG content\nprint('hi')\nEND_TOOL_CALL";
        let call = &parse_response(resp).tool_calls[0];
        assert_eq!(call.arguments["file_path"], "hello.py");
        assert_eq!(call.arguments["content"], "print('hi')");
    }

    // ─── Delegation & finish ────────────────────────────────────

    #[test]
    fn test_delegation() {
        let parsed = parse_response("Done my part.\n[DELEGATE: reviewer]\nReview the code\nin app.py");
        assert_eq!(
            parsed.delegation,
            Some(Delegation {
                target: "reviewer".into(),
                task: "Review the code\nin app.py".into()
            })
        );
    }

    #[test]
    fn test_first_delegation_wins() {
        let parsed = parse_response("[DELEGATE: a] do A\n[DELEGATE: b] do B");
        let d = parsed.delegation.unwrap();
        assert_eq!(d.target, "a");
        assert_eq!(d.task, "do A");
    }

    #[test]
    fn test_invalid_delegation_id_skipped() {
        let parsed = parse_response("[DELEGATE: not an id] x\n[DELEGATE: coder] write it");
        assert_eq!(parsed.delegation.unwrap().target, "coder");
    }

    #[test]
    fn test_finish_marker() {
        let parsed = parse_response("All done.\n<FINISHED>");
        assert!(parsed.finished);
        assert!(parsed.has_markers());
    }

    #[test]
    fn test_markers_inside_tool_block_ignored() {
        let resp = "BEGIN_TOOL_CALL write_file\nBEGIN_ARG content\n<FINISHED> [DELEGATE: x] y\nEND_ARG\nEND_TOOL_CALL";
        let parsed = parse_response(resp);
        assert!(!parsed.finished);
        assert!(parsed.delegation.is_none());
        assert_eq!(parsed.tool_calls.len(), 1);
    }

    #[test]
    fn test_finish_stripped_from_delegated_task() {
        let d = parse_response("[DELEGATE: qa] test it <FINISHED>")
            .delegation
            .unwrap();
        assert_eq!(d.task, "test it");
    }

    #[test]
    fn test_plain_answer_has_no_markers() {
        let parsed = parse_response("The answer is 42.");
        assert!(!parsed.has_markers());
    }
}

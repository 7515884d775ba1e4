// src/core/truncation.rs — Tool output and prompt excerpt truncation
//
// Limits text fed back to the model to prevent context blowup. Keeps the
// head and the tail, since errors and summaries tend to sit at the end.

/// Result of a truncation operation.
pub struct TruncationResult {
    pub content: String,
    pub was_truncated: bool,
    /// Original size in bytes.
    pub original_bytes: usize,
}

/// Truncate tool output to at most `max_bytes` (plus a short note).
pub fn truncate_tool_output(content: &str, max_bytes: usize) -> TruncationResult {
    let original_bytes = content.len();
    if original_bytes <= max_bytes {
        return TruncationResult {
            content: content.to_string(),
            was_truncated: false,
            original_bytes,
        };
    }

    let half = max_bytes / 2;
    let head = &content[..floor_char_boundary(content, half)];
    let tail = &content[ceil_char_boundary(content, original_bytes - half)..];

    TruncationResult {
        content: format!(
            "{}\n\n[... output truncated: {} of {} bytes omitted ...]\n\n{}",
            head,
            original_bytes - head.len() - tail.len(),
            original_bytes,
            tail
        ),
        was_truncated: true,
        original_bytes,
    }
}

/// Keep the first and last `max_chars / 2` characters, joined by `...`.
pub fn head_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(count - half).collect();
    format!("{}...{}", head, tail)
}

/// First `max_chars` characters, with `...` when cut.
pub fn head(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

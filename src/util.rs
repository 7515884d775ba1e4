// src/util.rs — Fenced code block extraction from model output

/// A ```` ```lang label ```` block found in free text.
#[derive(Debug, Clone, PartialEq)]
pub struct FencedBlock {
    pub lang: String,
    /// Text after the language tag, e.g. `agents.json`.
    pub label: String,
    pub body: String,
}

/// All fenced blocks in `text`, in order. An unclosed block runs to the end.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        match current.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let mut parts = info.split_whitespace();
                    let lang = parts.next().unwrap_or("").to_ascii_lowercase();
                    let label = parts.collect::<Vec<_>>().join(" ");
                    current = Some((lang, label, Vec::new()));
                }
            }
            Some((lang, label, body)) if trimmed == "```" => {
                blocks.push(FencedBlock {
                    lang,
                    label,
                    body: body.join("\n"),
                });
            }
            Some((lang, label, mut body)) => {
                body.push(line);
                current = Some((lang, label, body));
            }
        }
    }
    if let Some((lang, label, body)) = current {
        blocks.push(FencedBlock {
            lang,
            label,
            body: body.join("\n"),
        });
    }
    blocks
}

/// Body of the last JSON block labelled `label` (case-insensitive).
/// Later blocks win so a corrected answer overrides an earlier draft.
pub fn labelled_json_block<'a>(blocks: &'a [FencedBlock], label: &str) -> Option<&'a str> {
    blocks
        .iter()
        .rev()
        .find(|b| b.lang == "json" && b.label.eq_ignore_ascii_case(label))
        .map(|b| b.body.as_str())
}

/// Body of the first JSON block, labelled or not.
pub fn first_json_block(blocks: &[FencedBlock]) -> Option<&str> {
    blocks
        .iter()
        .find(|b| b.lang == "json")
        .map(|b| b.body.as_str())
}

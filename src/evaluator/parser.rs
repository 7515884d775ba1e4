// src/evaluator/parser.rs — Parse judge responses into a score, rationale and dimension scores

use super::DimensionScore;

/// Rubric dimensions the judge is asked to score.
pub const DIMENSIONS: [&str; 5] = [
    "completeness",
    "correctness",
    "quality",
    "documentation",
    "efficiency",
];

/// Parsed judge result. `score` is `None` when no score could be found.
pub struct ParsedJudgement {
    pub score: Option<f64>,
    pub reasoning: String,
    pub dimensions: Vec<DimensionScore>,
}

/// Parse a judge response.
///
/// Expected format:
/// ```text
/// Score: 7.5/10
/// completeness: 8
/// correctness: 7
/// ...
/// Reasoning: free text
/// ```
///
/// Score lookup order: `Score: X/10`, then `Score: X`, then any `X/10`.
pub fn parse_judge_response(response: &str) -> ParsedJudgement {
    let score = find_score(response).map(|s| s.clamp(0.0, 10.0));

    let dimensions = response
        .lines()
        .filter_map(|line| parse_dimension_line(line.trim()))
        .collect();

    let reasoning = match find_ci(response, "reasoning:") {
        Some(idx) => response[idx + "reasoning:".len()..].trim().to_string(),
        None => response.trim().to_string(),
    };

    ParsedJudgement {
        score,
        reasoning,
        dimensions,
    }
}

fn find_score(text: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    let labelled: Vec<(f64, &str)> = lower
        .match_indices("score:")
        .filter_map(|(idx, m)| parse_number(lower[idx + m.len()..].trim_start()))
        .collect();

    // Score: X/10
    if let Some((value, _)) = labelled.iter().find(|(_, rest)| out_of_ten(rest)) {
        return Some(*value);
    }
    // Score: X
    if let Some((value, _)) = labelled.first() {
        return Some(*value);
    }
    // X/10 anywhere
    lower
        .char_indices()
        .filter(|(i, c)| c.is_ascii_digit() && !preceded_by_number_char(&lower, *i))
        .filter_map(|(i, _)| parse_number(&lower[i..]))
        .find(|(_, rest)| out_of_ten(rest))
        .map(|(value, _)| value)
}

/// Leading `123` or `12.5`; returns the value and the remaining text.
fn parse_number(s: &str) -> Option<(f64, &str)> {
    let int_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if int_end == 0 {
        return None;
    }
    let mut end = int_end;
    if s[end..].starts_with('.') {
        let frac = &s[end + 1..];
        let frac_len = frac.find(|c: char| !c.is_ascii_digit()).unwrap_or(frac.len());
        if frac_len > 0 {
            end += 1 + frac_len;
        }
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// Rest begins with `/10` (whitespace allowed around the slash).
fn out_of_ten(rest: &str) -> bool {
    rest.trim_start()
        .strip_prefix('/')
        .map(|r| {
            let r = r.trim_start();
            r.starts_with("10") && !r[2..].starts_with(|c: char| c.is_ascii_digit())
        })
        .unwrap_or(false)
}

fn preceded_by_number_char(s: &str, idx: usize) -> bool {
    s[..idx]
        .chars()
        .next_back()
        .map(|c| c.is_ascii_digit() || c == '.')
        .unwrap_or(false)
}

/// Parse a line like "correctness: 8" or "- Quality: 7/10".
pub(crate) fn parse_dimension_line(line: &str) -> Option<DimensionScore> {
    let line = line.trim_start_matches(['-', '*']).trim();
    let (name, rest) = line.split_once(':')?;
    let name = name.trim().trim_matches('*').trim().to_ascii_lowercase();
    if !DIMENSIONS.contains(&name.as_str()) {
        return None;
    }
    let (score, _) = parse_number(rest.trim_start())?;
    Some(DimensionScore {
        dimension: name,
        score: score.clamp(0.0, 10.0),
    })
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

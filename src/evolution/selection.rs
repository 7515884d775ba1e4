// src/evolution/selection.rs — Ranking, parent selection and plateau detection

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::infra::config::SelectionPolicy;

/// A team that produced a scored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub team_id: String,
    pub team_name: String,
    pub run_id: String,
    pub generation: u32,
    pub score: f64,
}

/// Highest score first. Ties keep their original order.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates
}

/// Pick parents from a ranked list. Never fewer than two when two exist.
pub fn select(ranked: &[Candidate], policy: &SelectionPolicy) -> Vec<Candidate> {
    let picked: Vec<Candidate> = match policy {
        SelectionPolicy::TopN(n) => ranked.iter().take((*n).max(2)).cloned().collect(),
        SelectionPolicy::Threshold(min) => ranked.iter().filter(|c| c.score >= *min).cloned().collect(),
    };
    if picked.len() < 2 {
        return ranked.iter().take(2).cloned().collect();
    }
    picked
}

/// Parent index pairs in rank order: (0,1), (0,2), ..., (1,2), ...
/// At most `limit` pairs.
pub fn pairs(selected: usize, limit: usize) -> Vec<(usize, usize)> {
    (0..selected)
        .flat_map(|i| (i + 1..selected).map(move |j| (i, j)))
        .take(limit)
        .collect()
}

/// True when the best score of the last `patience` generations beats the
/// best before them by no more than `min_improvement`.
pub fn plateaued(best_scores: &[f64], patience: u32, min_improvement: f64) -> bool {
    let patience = patience as usize;
    if patience == 0 || best_scores.len() <= patience {
        return false;
    }
    let split = best_scores.len() - patience;
    let before = best_scores[..split].iter().copied().fold(f64::MIN, f64::max);
    let recent = best_scores[split..].iter().copied().fold(f64::MIN, f64::max);
    recent - before <= min_improvement
}

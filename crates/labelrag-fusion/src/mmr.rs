//! Maximal Marginal Relevance: greedy selection balancing query relevance
//! against similarity to already-selected items.

use std::cmp::Ordering;

/// Input unit for diversity selection. `embedding` is assumed L2-normalized
/// by the caller, so dot product stands in for cosine similarity.
#[derive(Debug, Clone)]
pub struct MmrCandidate {
    pub id: String,
    pub query_similarity: f64,
    pub embedding: Vec<f32>,
}

/// Dot product with a defensive contract: mismatched lengths yield 0.0
/// instead of panicking.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

/// Select up to `k` candidates maximizing
/// `lambda * query_similarity - (1 - lambda) * max_similarity_to_selected`.
///
/// The first pick is the candidate with the highest query similarity (stable
/// sort, so ties keep original order). `lambda = 1` degenerates to top-k by
/// relevance; `lambda = 0` to pure diversity after the first pick. Output
/// length is `min(k, candidates.len())` with no duplicate ids.
pub fn mmr_diversify(candidates: &[MmrCandidate], k: usize, lambda: f64) -> Vec<MmrCandidate> {
    let mut remain: Vec<MmrCandidate> = candidates.to_vec();
    let mut selected: Vec<MmrCandidate> = Vec::new();

    while selected.len() < k && !remain.is_empty() {
        if selected.is_empty() {
            remain.sort_by(|a, b| {
                b.query_similarity
                    .partial_cmp(&a.query_similarity)
                    .unwrap_or(Ordering::Equal)
            });
            selected.push(remain.remove(0));
            continue;
        }

        let mut best_idx = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, d) in remain.iter().enumerate() {
            let max_sim_to_selected = selected
                .iter()
                .map(|s| dot(&d.embedding, &s.embedding))
                .fold(f64::NEG_INFINITY, f64::max);
            let mmr = lambda * d.query_similarity - (1.0 - lambda) * max_sim_to_selected;
            if mmr > best_score {
                best_score = mmr;
                best_idx = i;
            }
        }
        selected.push(remain.remove(best_idx));
    }

    selected
}

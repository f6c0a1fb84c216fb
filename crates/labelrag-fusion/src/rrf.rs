//! Reciprocal Rank Fusion: score = Σ 1/(c + rank + 1) over input lists.
//!
//! Fuses rankings from different retrieval methods without normalizing their
//! native scores against each other.

use labelrag_core::types::Hit;
use std::cmp::Ordering;
use std::collections::HashMap;

struct Fused {
    hit: Hit,
    score: f64,
}

/// Fuse ranked lists into one list of unique hits, at most `max` long.
///
/// Each hit at 0-based rank `i` contributes `1/(c + i + 1)` to its id's
/// accumulated score. The first-seen hit per id is kept as the exemplar;
/// later occurrences only add score, they never replace source/highlight.
/// The sort is stable, so ties keep first-insertion order.
pub fn rrf_fuse(lists: &[Vec<Hit>], c: f64, max: usize) -> Vec<Hit> {
    let mut fused: Vec<Fused> = Vec::new();
    let mut slot_by_id: HashMap<String, usize> = HashMap::new();

    for list in lists {
        for (rank, hit) in list.iter().enumerate() {
            let add = 1.0 / (c + rank as f64 + 1.0);
            match slot_by_id.get(&hit.id) {
                Some(&slot) => fused[slot].score += add,
                None => {
                    slot_by_id.insert(hit.id.clone(), fused.len());
                    fused.push(Fused { hit: hit.clone(), score: add });
                }
            }
        }
    }

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    fused.truncate(max);
    fused.into_iter().map(|f| f.hit).collect()
}

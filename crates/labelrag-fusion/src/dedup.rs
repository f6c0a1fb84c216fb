//! Per-label dedup: keep an answer from citing one label many times.

use labelrag_core::types::Hit;
use std::collections::HashMap;

/// Grouping key for a hit. Falls back through the label-identifying fields a
/// chunk may carry, then the hit's own id (so ungrouped hits never collide).
fn label_key(hit: &Hit) -> &str {
    hit.source_str("set_id")
        .or_else(|| hit.source_str("product_key"))
        .or_else(|| hit.source_str("label_id"))
        .unwrap_or(&hit.id)
}

/// Keep at most `max_per_label` hits per label group, preserving relative
/// order. `max_per_label == 0` disables the cap.
pub fn cap_per_label(hits: &[Hit], max_per_label: usize) -> Vec<Hit> {
    if max_per_label == 0 {
        return hits.to_vec();
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for h in hits {
        let n = seen.entry(label_key(h).to_string()).or_insert(0);
        if *n < max_per_label {
            out.push(h.clone());
            *n += 1;
        }
    }
    out
}

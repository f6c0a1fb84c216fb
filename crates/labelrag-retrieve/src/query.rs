//! Query-body construction for each retrieval strategy.
//!
//! Strategies exist because clusters differ in which vector-search surface
//! they support: a knn query clause, a top-level knn section, or only
//! script-scoring over the raw stored vector. Lexical match is the terminal
//! fallback. Every body carries `size`, an explicit `_source` projection that
//! excludes the dense vector field, and (optionally) one capped highlight
//! fragment on the text field.

use labelrag_core::types::{Filter, SourceSelection, Strategy};
use serde_json::{json, Map, Value};

/// Dense vector field name in the index; never returned to callers.
pub const VECTOR_FIELD: &str = "embedding";
/// Field targeted by lexical match and highlighting.
pub const TEXT_FIELD: &str = "text";
/// Highlight fragment cap, aligned with the ingestion chunk size.
pub const HIGHLIGHT_FRAGMENT_SIZE: usize = 800;

/// Resolved knobs for body construction.
#[derive(Debug, Clone)]
pub struct QueryParams<'a> {
    pub top_k: usize,
    pub num_candidates: usize,
    pub filter: &'a Filter,
    pub source: &'a SourceSelection,
    pub highlight: bool,
}

/// Equality filter as a list of term clauses (AND semantics).
pub fn term_filters(filter: &Filter) -> Vec<Value> {
    filter
        .iter()
        .map(|(field, value)| {
            let mut term = Map::new();
            term.insert(field.clone(), value.to_json());
            json!({ "term": Value::Object(term) })
        })
        .collect()
}

/// Wrap `base` with the filter via a bool query. No filter: the base query
/// itself, or match_all when there is no base either.
pub fn with_filter(filter: &Filter, base: Option<Value>) -> Value {
    if filter.is_empty() {
        return base.unwrap_or_else(|| json!({ "match_all": {} }));
    }
    let terms = term_filters(filter);
    match base {
        Some(q) => json!({ "bool": { "must": [q], "filter": terms } }),
        None => json!({ "bool": { "filter": terms } }),
    }
}

/// knn expressed as a bare query clause, AND-combined with the filter.
/// (This surface takes no num_candidates.)
fn ann_query_with_filter(vector: &[f32], k: usize, filter: &Filter) -> Value {
    let knn = json!({ "knn": { VECTOR_FIELD: { "vector": vector, "k": k } } });
    if filter.is_empty() {
        return knn;
    }
    json!({ "bool": { "must": [knn], "filter": term_filters(filter) } })
}

fn source_projection(source: &SourceSelection) -> Value {
    let includes = match source {
        SourceSelection::AllFields => json!(["*"]),
        SourceSelection::Fields(fields) => json!(fields),
    };
    json!({ "includes": includes, "excludes": [VECTOR_FIELD] })
}

fn highlight_block() -> Value {
    json!({
        "fields": {
            TEXT_FIELD: {
                "fragment_size": HIGHLIGHT_FRAGMENT_SIZE,
                "number_of_fragments": 1,
                "no_match_size": HIGHLIGHT_FRAGMENT_SIZE,
            }
        }
    })
}

fn body(size: usize, fields: Vec<(&str, Value)>, params: &QueryParams<'_>) -> Value {
    let mut map = Map::new();
    map.insert("size".to_string(), json!(size));
    for (key, value) in fields {
        map.insert(key.to_string(), value);
    }
    map.insert("_source".to_string(), source_projection(params.source));
    if params.highlight {
        map.insert("highlight".to_string(), highlight_block());
    }
    Value::Object(map)
}

/// Top-level knn section used by both the fallback path and the hybrid ANN
/// branch (which passes its own k / num_candidates).
pub fn ann_toplevel_section(vector: &[f32], k: usize, num_candidates: usize, filter: &Filter) -> Value {
    let mut knn = Map::new();
    knn.insert("field".to_string(), json!(VECTOR_FIELD));
    knn.insert("query_vector".to_string(), json!(vector));
    knn.insert("k".to_string(), json!(k));
    knn.insert("num_candidates".to_string(), json!(num_candidates));
    if !filter.is_empty() {
        knn.insert("filter".to_string(), json!(term_filters(filter)));
    }
    Value::Object(knn)
}

/// Lexical body, also the text branch of hybrid retrieval.
pub fn lexical_body(query: &str, size: usize, params: &QueryParams<'_>) -> Value {
    body(
        size,
        vec![(
            "query",
            with_filter(params.filter, Some(json!({ "match": { TEXT_FIELD: query } }))),
        )],
        params,
    )
}

/// Hybrid ANN branch body: top-level knn sized to `ann_k`.
pub fn ann_branch_body(vector: &[f32], ann_k: usize, num_candidates: usize, params: &QueryParams<'_>) -> Value {
    body(
        ann_k,
        vec![("knn", ann_toplevel_section(vector, ann_k, num_candidates, params.filter))],
        params,
    )
}

/// Build the ordered (strategy, body) plan for the fallback path.
///
/// `Auto` yields all four strategies in fallback order; a pinned strategy
/// yields exactly one entry, so its failure has nowhere to go but up.
pub fn strategy_bodies(
    query: &str,
    vector: &[f32],
    want: Strategy,
    params: &QueryParams<'_>,
) -> Vec<(Strategy, Value)> {
    let order: Vec<Strategy> = match want {
        Strategy::Auto => Strategy::FALLBACK_ORDER.to_vec(),
        pinned => vec![pinned],
    };

    order
        .into_iter()
        .map(|strategy| {
            let b = match strategy {
                Strategy::AnnQuery => body(
                    params.top_k,
                    vec![("query", ann_query_with_filter(vector, params.top_k, params.filter))],
                    params,
                ),
                Strategy::AnnTopLevel => body(
                    params.top_k,
                    vec![(
                        "knn",
                        ann_toplevel_section(vector, params.top_k, params.num_candidates, params.filter),
                    )],
                    params,
                ),
                Strategy::Scored => body(
                    params.top_k,
                    vec![(
                        "query",
                        json!({
                            "script_score": {
                                "query": with_filter(params.filter, None),
                                "script": {
                                    "source": "cosineSimilarity(params.q, 'embedding') + 1.0",
                                    "params": { "q": vector },
                                },
                            }
                        }),
                    )],
                    params,
                ),
                Strategy::Lexical => lexical_body(query, params.top_k, params),
                Strategy::Auto => unreachable!("auto is expanded above"),
            };
            (strategy, b)
        })
        .collect()
}

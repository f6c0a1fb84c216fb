use std::env;
use std::fs;

use labelrag_backend::{embedder_from_config, HttpSearchBackend};
use labelrag_core::config::AppConfig;
use labelrag_core::traits::SearchBackend;
use labelrag_core::types::{RetrieveOptions, ScalarValue, Strategy};
use labelrag_retrieve::Retriever;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn get_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1).cloned())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn truncated(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Accepts a bare JSON array or `{"vector": [...]}`.
fn read_query_vector(path: &str) -> anyhow::Result<Vec<f32>> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let arr = parsed
        .get("vector")
        .and_then(|v| v.as_array())
        .or_else(|| parsed.as_array())
        .ok_or_else(|| anyhow::anyhow!("--qvec {path}: expected a JSON array or {{\"vector\": [...]}}"))?;
    arr.iter()
        .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(|| anyhow::anyhow!("non-numeric vector entry")))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: labelrag-retrieve \"<query>\" [--top-k 20] [--route ORAL] [--ingredient CLOZAPINE] [--strategy auto|ann_query|ann_toplevel|scored|lexical] [--no-highlight] [--max-per-label 1] [--index drug-chunks] [--qvec vector.json] [--diag]");
        std::process::exit(1);
    }
    let query = args[0].clone();

    let config = AppConfig::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let backend = HttpSearchBackend::from_config(&config.backend)?;
    let embedder = embedder_from_config(&config.embeddings)?;
    let retriever = Retriever::new(backend, embedder, config.retrieval.clone());

    let mut opts = RetrieveOptions {
        index: get_arg(&args, "--index"),
        top_k: get_arg(&args, "--top-k").map(|v| v.parse()).transpose()?,
        highlight: !has_flag(&args, "--no-highlight"),
        max_per_label: get_arg(&args, "--max-per-label").map(|v| v.parse()).transpose()?,
        ..Default::default()
    };
    if let Some(s) = get_arg(&args, "--strategy") {
        opts.strategy = Some(s.parse::<Strategy>().map_err(|e| anyhow::anyhow!(e))?);
    }
    if let Some(route) = get_arg(&args, "--route") {
        opts.filter.insert("openfda.route".to_string(), ScalarValue::from(route));
    }
    if let Some(ingredient) = get_arg(&args, "--ingredient") {
        opts.filter.insert("openfda.substance_name".to_string(), ScalarValue::from(ingredient));
    }
    if let Some(path) = get_arg(&args, "--qvec") {
        opts.query_vector = Some(read_query_vector(&path)?);
    }

    let index = opts.index.clone().unwrap_or_else(|| config.retrieval.index.clone());
    let diag = has_flag(&args, "--diag");

    let out = retriever.retrieve_with_info(&query, &opts).await?;
    println!("Strategy used: {}  hits={}", out.strategy, out.hits.len());

    if out.hits.is_empty() {
        // Diagnostics only; failures here never mask the empty result.
        if let Err(e) = run_diagnostics(retriever.backend(), &index, &opts, diag).await {
            eprintln!("diagnostics unavailable: {e}");
        }
    }

    for h in &out.hits {
        let highlight = h
            .highlight
            .as_ref()
            .and_then(|hl| hl.get("text"))
            .map(|frags| frags.join(" … "))
            .filter(|s| !s.is_empty());
        let snippet = match highlight {
            Some(hl) => truncated(&hl, 800),
            None => truncated(h.source_str("text").unwrap_or(""), 800),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "id": h.id,
                "score": (h.score * 1000.0).round() / 1000.0,
                "section": h.source_str("section"),
                "label_id": h.source_str("label_id"),
                "snippet": snippet,
            }))?
        );
    }

    Ok(())
}

/// On zero hits: count documents matching just the filters (to validate
/// field/values), then optionally probe which values exist in the index.
async fn run_diagnostics<B: SearchBackend>(
    backend: &B,
    index: &str,
    opts: &RetrieveOptions,
    force: bool,
) -> anyhow::Result<()> {
    let terms = labelrag_retrieve::query::term_filters(&opts.filter);
    let count = backend
        .count(index, &json!({ "query": { "bool": { "filter": terms } } }))
        .await?;
    println!("Filter-only match count: {count}");

    if count == 0 || force {
        let agg_body = json!({
            "size": 0,
            "aggs": {
                "routes": { "terms": { "field": "openfda.route", "size": 20 } },
                "subs": { "terms": { "field": "openfda.substance_name", "size": 20 } },
                "has_route": { "filter": { "exists": { "field": "openfda.route" } } },
                "has_sub": { "filter": { "exists": { "field": "openfda.substance_name" } } },
            }
        });
        let res = backend.search(index, &agg_body).await?;
        let aggs = res
            .get("body")
            .unwrap_or(&res)
            .get("aggregations")
            .cloned()
            .unwrap_or_default();
        println!(
            "Diag aggregations: {}",
            serde_json::to_string_pretty(&json!({
                "routes": aggs["routes"]["buckets"],
                "subs": aggs["subs"]["buckets"],
                "exists": {
                    "route": aggs["has_route"]["doc_count"],
                    "substance_name": aggs["has_sub"]["doc_count"],
                }
            }))?
        );
    }
    Ok(())
}

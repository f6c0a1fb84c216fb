use std::env;

use labelrag_backend::{embedder_from_config, HttpSearchBackend};
use labelrag_core::config::AppConfig;
use labelrag_core::types::{HybridOptions, RetrieveOptions, ScalarValue};
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: labelrag-hybrid \"<query>\" [--top-k 12] [--text-k 200] [--ann-k 200] [--rrf-c 60] [--route ORAL] [--ingredient CLOZAPINE] [--index drug-chunks] [--no-highlight]");
        std::process::exit(1);
    }
    let query = args[0].clone();

    let config = AppConfig::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let backend = HttpSearchBackend::from_config(&config.backend)?;
    let embedder = embedder_from_config(&config.embeddings)?;
    let retriever = Retriever::new(backend, embedder, config.retrieval.clone());

    let mut base = RetrieveOptions {
        index: get_arg(&args, "--index"),
        top_k: get_arg(&args, "--top-k").map(|v| v.parse()).transpose()?,
        highlight: !has_flag(&args, "--no-highlight"),
        ..Default::default()
    };
    if let Some(route) = get_arg(&args, "--route") {
        base.filter.insert("openfda.route".to_string(), ScalarValue::from(route));
    }
    if let Some(ingredient) = get_arg(&args, "--ingredient") {
        base.filter.insert("openfda.substance_name".to_string(), ScalarValue::from(ingredient));
    }

    let opts = HybridOptions {
        base,
        text_k: get_arg(&args, "--text-k").map(|v| v.parse()).transpose()?,
        ann_k: get_arg(&args, "--ann-k").map(|v| v.parse()).transpose()?,
        rrf_c: get_arg(&args, "--rrf-c").map(|v| v.parse()).transpose()?,
        window: None,
    };

    let out = retriever.retrieve_hybrid(&query, &opts).await?;
    println!(
        "Strategy: {}  text={} ann={} embedded={}  fused hits={}",
        out.info.strategy(),
        out.info.text_count,
        out.info.ann_count,
        out.info.embedded,
        out.hits.len()
    );

    for h in &out.hits {
        let snippet = h
            .highlight
            .as_ref()
            .and_then(|hl| hl.get("text"))
            .map(|frags| frags.join(" … "))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| h.source_str("text").unwrap_or("").to_string());
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "id": h.id,
                "section": h.source_str("section"),
                "label_id": h.source_str("label_id"),
                "snippet": truncated(&snippet, 800),
            }))?
        );
    }

    Ok(())
}

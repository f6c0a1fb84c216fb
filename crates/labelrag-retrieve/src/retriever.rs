//! The retrieval orchestrator: embed once, then either walk the strategy
//! fallback chain sequentially or run lexical + ANN branches in parallel and
//! fuse with RRF.

use anyhow::anyhow;
use labelrag_core::config::RetrievalConfig;
use labelrag_core::error::{RetrieveError, Result};
use labelrag_core::traits::{Embedder, SearchBackend};
use labelrag_core::types::{
    Hit, HybridInfo, HybridOptions, HybridRetrieval, Retrieval, RetrieveOptions, Strategy,
    DEFAULT_RRF_C,
};
use labelrag_fusion::{cap_per_label, rrf_fuse};
use serde_json::Value;
use tracing::{debug, warn};

use crate::query::{self, QueryParams};

pub struct Retriever<B: SearchBackend> {
    backend: B,
    embedder: Box<dyn Embedder>,
    config: RetrievalConfig,
}

impl<B: SearchBackend> Retriever<B> {
    pub fn new(backend: B, embedder: Box<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self { backend, embedder, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Try strategies in order until one returns an array-shaped hits field.
    ///
    /// Sequential on purpose: a fallback is only issued once the previous
    /// strategy's outcome is known, so a succeeding first strategy costs one
    /// backend call. A pinned strategy's failure propagates; in auto mode
    /// exhaustion degrades to an empty result tagged with the requested
    /// strategy.
    pub async fn retrieve_with_info(&self, query_text: &str, opts: &RetrieveOptions) -> Result<Retrieval> {
        let index = opts.index.as_deref().unwrap_or(&self.config.index);
        let top_k = opts.top_k.unwrap_or(self.config.top_k);
        let cap = opts.cap.unwrap_or(top_k);
        let num_candidates = opts.num_candidates.unwrap_or_else(|| 500.max(top_k * 50));
        let want = opts.strategy.unwrap_or(Strategy::Auto);
        let pinned = want != Strategy::Auto;

        let (vector, _embedded) = self.query_vector(query_text, opts).await?;

        let params = QueryParams {
            top_k,
            num_candidates,
            filter: &opts.filter,
            source: &opts.source,
            highlight: opts.highlight,
        };
        let plans = query::strategy_bodies(query_text, &vector, want, &params);

        for (strategy, body) in plans {
            debug!(index, strategy = %strategy, "search request");
            match self.backend.search(index, &body).await {
                Ok(res) => {
                    if let Some(hits) = extract_hits(&res) {
                        let mut hits = match opts.max_per_label {
                            Some(max) => cap_per_label(&hits, max),
                            None => hits,
                        };
                        hits.truncate(cap);
                        debug!(strategy = %strategy, returned = hits.len(), "done");
                        return Ok(Retrieval { hits, strategy });
                    }
                    // Missing/non-array hits counts as a strategy miss.
                    warn!(strategy = %strategy, "response missing hits array");
                    if pinned {
                        return Err(RetrieveError::Strategy {
                            strategy,
                            source: anyhow!("response missing hits array"),
                        });
                    }
                }
                Err(e) => {
                    warn!(strategy = %strategy, error = %e, "strategy failed");
                    if pinned {
                        return Err(RetrieveError::Strategy { strategy, source: e });
                    }
                }
            }
        }

        Ok(Retrieval { hits: vec![], strategy: want })
    }

    /// Run lexical and ANN search concurrently and fuse via RRF.
    ///
    /// Each branch degrades to an empty list on failure; both failing yields
    /// an empty fused pool, never an error. No per-label dedup here: the
    /// fused pool goes to a downstream selector that dedupes when citing.
    pub async fn retrieve_hybrid(&self, query_text: &str, opts: &HybridOptions) -> Result<HybridRetrieval> {
        let base = &opts.base;
        let index = base.index.as_deref().unwrap_or(&self.config.index);
        let top_k = base.top_k.unwrap_or(self.config.top_k);
        let text_k = opts.text_k.unwrap_or_else(|| 200.max(top_k * 10));
        let ann_k = opts.ann_k.unwrap_or_else(|| 200.max(top_k * 10));
        let cap = base.cap.unwrap_or(top_k);
        let rrf_c = opts.rrf_c.unwrap_or(DEFAULT_RRF_C);
        let window = opts.window.unwrap_or_else(|| text_k.max(ann_k));
        let num_candidates = base.num_candidates.unwrap_or_else(|| 500.max(ann_k * 2));

        let (vector, embedded) = self.query_vector(query_text, base).await?;

        let params = QueryParams {
            top_k,
            num_candidates,
            filter: &base.filter,
            source: &base.source,
            highlight: base.highlight,
        };
        let text_body = query::lexical_body(query_text, text_k, &params);
        let ann_body = query::ann_branch_body(&vector, ann_k, num_candidates, &params);

        debug!(index, text_k, ann_k, "hybrid dispatch");
        let (text_res, ann_res) = tokio::join!(
            self.backend.search(index, &text_body),
            self.backend.search(index, &ann_body),
        );

        let text_hits = branch_hits(text_res, "text");
        let ann_hits = branch_hits(ann_res, "ann");
        let text_count = text_hits.len();
        let ann_count = ann_hits.len();

        let fused = rrf_fuse(&[text_hits, ann_hits], rrf_c, window.max(cap));
        let hits: Vec<Hit> = fused.into_iter().take(cap).collect();

        Ok(HybridRetrieval {
            hits,
            info: HybridInfo { text_count, ann_count, embedded },
        })
    }

    /// Use the caller's vector when present and non-empty, otherwise embed
    /// the query. An unusable provider result is an error: no search is
    /// possible without a vector.
    async fn query_vector(&self, query_text: &str, opts: &RetrieveOptions) -> Result<(Vec<f32>, bool)> {
        if let Some(v) = &opts.query_vector {
            if !v.is_empty() {
                return Ok((v.clone(), false));
            }
        }
        let mut vectors = self
            .embedder
            .embed_batch(&[query_text.to_string()])
            .await
            .map_err(|e| RetrieveError::EmbeddingFailed(e.to_string()))?;
        if vectors.is_empty() || vectors[0].is_empty() {
            return Err(RetrieveError::EmbeddingFailed(
                "provider returned no vector".to_string(),
            ));
        }
        Ok((vectors.remove(0), true))
    }
}

fn branch_hits(res: anyhow::Result<Value>, branch: &str) -> Vec<Hit> {
    match res {
        Ok(value) => extract_hits(&value).unwrap_or_else(|| {
            warn!(branch, "response missing hits array");
            vec![]
        }),
        Err(e) => {
            warn!(branch, error = %e, "hybrid branch failed");
            vec![]
        }
    }
}

/// Pull the hit array out of a backend response, tolerating both the
/// enveloped shape `{body: {hits: {hits: [...]}}}` and the bare one.
/// Returns None when the hits field is missing, non-array, or malformed.
pub fn extract_hits(res: &Value) -> Option<Vec<Hit>> {
    let arr = res
        .get("body")
        .and_then(|b| b.get("hits"))
        .and_then(|h| h.get("hits"))
        .or_else(|| res.get("hits").and_then(|h| h.get("hits")))?
        .as_array()?;
    let mut out = Vec::with_capacity(arr.len());
    for h in arr {
        out.push(serde_json::from_value(h.clone()).ok()?);
    }
    Some(out)
}

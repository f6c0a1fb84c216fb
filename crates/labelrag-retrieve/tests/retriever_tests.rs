use async_trait::async_trait;
use labelrag_core::config::RetrievalConfig;
use labelrag_core::error::RetrieveError;
use labelrag_core::traits::{Embedder, SearchBackend};
use labelrag_core::types::{HybridOptions, RetrieveOptions, ScalarValue, Strategy};
use labelrag_retrieve::retriever::extract_hits;
use labelrag_retrieve::Retriever;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Outcome the mock backend returns for one strategy class.
#[derive(Clone)]
enum Outcome {
    Respond(Value),
    Fail(String),
}

/// Routes each search call by the shape of its body, the way the original
/// cluster would: top-level knn section, knn query clause, script_score, or
/// lexical match. Records every call for assertions.
#[derive(Default)]
struct MockBackend {
    outcomes: HashMap<&'static str, Outcome>,
    calls: Mutex<Vec<(String, Value)>>,
}

fn classify(body: &Value) -> &'static str {
    if body.get("knn").is_some() {
        return "ann_toplevel";
    }
    let q = &body["query"];
    if q.get("knn").is_some() || q["bool"]["must"][0].get("knn").is_some() {
        "ann_query"
    } else if q.get("script_score").is_some() {
        "scored"
    } else {
        "lexical"
    }
}

impl MockBackend {
    fn with(outcomes: &[(&'static str, Outcome)]) -> Self {
        Self {
            outcomes: outcomes.iter().cloned().collect(),
            calls: Mutex::new(vec![]),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }

    fn recorded_body(&self, class: &str) -> Value {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .find(|(c, _)| c == class)
            .map(|(_, b)| b.clone())
            .expect("no call recorded for class")
    }
}

#[async_trait]
impl SearchBackend for MockBackend {
    async fn search(&self, _index: &str, body: &Value) -> anyhow::Result<Value> {
        let class = classify(body);
        self.calls.lock().expect("lock").push((class.to_string(), body.clone()));
        match self.outcomes.get(class) {
            Some(Outcome::Respond(v)) => Ok(v.clone()),
            Some(Outcome::Fail(msg)) => Err(anyhow::anyhow!("{msg}")),
            None => Err(anyhow::anyhow!("no outcome configured for {class}")),
        }
    }

    async fn count(&self, _index: &str, _body: &Value) -> anyhow::Result<u64> {
        Ok(0)
    }
}

struct CountingEmbedder {
    dim: usize,
    calls: Arc<AtomicUsize>,
}

impl CountingEmbedder {
    fn new(dim: usize) -> Self {
        Self { dim, calls: Arc::new(AtomicUsize::new(0)) }
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![0.01; self.dim]).collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dim(&self) -> usize {
        8
    }

    async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Err(anyhow::anyhow!("provider unreachable"))
    }
}

fn make_hits(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "_id": format!("{prefix}_{i}"),
                "_score": 1.0 - i as f64 * 0.01,
                "_source": {
                    "chunk_id": format!("{prefix}_chunk_{i}"),
                    "label_id": format!("{prefix}_label_{}", i / 2),
                    "section": "warnings",
                    "text": format!("content {prefix} {i}"),
                },
                "highlight": { "text": [format!("<em>{prefix}</em> {i}")] },
            })
        })
        .collect()
}

fn bare(hits: Vec<Value>) -> Value {
    json!({ "hits": { "hits": hits } })
}

fn enveloped(hits: Vec<Value>) -> Value {
    json!({ "body": { "hits": { "hits": hits } } })
}

fn retriever(backend: MockBackend) -> Retriever<MockBackend> {
    Retriever::new(
        backend,
        Box::new(CountingEmbedder::new(8)),
        RetrievalConfig::default(),
    )
}

#[tokio::test]
async fn fallback_advances_past_a_failed_strategy() {
    let backend = MockBackend::with(&[
        ("ann_query", Outcome::Fail("no such query type".into())),
        ("ann_toplevel", Outcome::Respond(bare(make_hits("t", 3)))),
    ]);
    let r = retriever(backend);

    let out = r
        .retrieve_with_info("ibuprofen dosing", &RetrieveOptions::default())
        .await
        .expect("retrieval");

    assert_eq!(out.strategy, Strategy::AnnTopLevel);
    assert_eq!(out.hits.len(), 3);
    assert_eq!(out.hits[0].id, "t_0");
    assert_eq!(r.backend().call_count(), 2, "short-circuits after first success");
}

#[tokio::test]
async fn pinned_strategy_failure_propagates() {
    let backend = MockBackend::with(&[("scored", Outcome::Fail("script scoring unsupported".into()))]);
    let r = retriever(backend);

    let opts = RetrieveOptions { strategy: Some(Strategy::Scored), ..Default::default() };
    let err = r.retrieve_with_info("q", &opts).await.expect_err("must propagate");

    match err {
        RetrieveError::Strategy { strategy, .. } => assert_eq!(strategy, Strategy::Scored),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(r.backend().call_count(), 1, "no fallback for a pinned strategy");
}

#[tokio::test]
async fn auto_accepts_an_empty_hit_array() {
    let backend = MockBackend::with(&[("ann_query", Outcome::Respond(enveloped(vec![])))]);
    let r = retriever(backend);

    let out = r.retrieve_with_info("q", &RetrieveOptions::default()).await.expect("ok");
    assert!(out.hits.is_empty());
    assert_eq!(out.strategy, Strategy::AnnQuery);
    assert_eq!(r.backend().call_count(), 1, "empty is still a result, not a miss");
}

#[tokio::test]
async fn malformed_hits_field_advances_the_loop() {
    let backend = MockBackend::with(&[
        ("ann_query", Outcome::Respond(json!({ "hits": { "hits": "not-an-array" } }))),
        ("ann_toplevel", Outcome::Respond(bare(make_hits("t", 1)))),
    ]);
    let r = retriever(backend);

    let out = r.retrieve_with_info("q", &RetrieveOptions::default()).await.expect("ok");
    assert_eq!(out.strategy, Strategy::AnnTopLevel);
    assert_eq!(r.backend().call_count(), 2);
}

#[tokio::test]
async fn all_strategies_exhausted_degrades_to_empty() {
    let backend = MockBackend::with(&[
        ("ann_query", Outcome::Fail("a".into())),
        ("ann_toplevel", Outcome::Fail("b".into())),
        ("scored", Outcome::Fail("c".into())),
        ("lexical", Outcome::Fail("d".into())),
    ]);
    let r = retriever(backend);

    let out = r.retrieve_with_info("q", &RetrieveOptions::default()).await.expect("fail soft");
    assert!(out.hits.is_empty());
    assert_eq!(out.strategy, Strategy::Auto, "tagged with the requested strategy");
    assert_eq!(r.backend().call_count(), 4);
}

#[tokio::test]
async fn embedding_failure_propagates() {
    let backend = MockBackend::with(&[("ann_query", Outcome::Respond(bare(make_hits("t", 1))))]);
    let r = Retriever::new(backend, Box::new(FailingEmbedder), RetrievalConfig::default());

    let err = r
        .retrieve_with_info("q", &RetrieveOptions::default())
        .await
        .expect_err("no vector, no search");
    assert!(matches!(err, RetrieveError::EmbeddingFailed(_)));
    assert_eq!(r.backend().call_count(), 0);
}

#[tokio::test]
async fn provided_query_vector_skips_embedding() {
    let backend = MockBackend::with(&[("ann_query", Outcome::Respond(bare(make_hits("t", 2))))]);
    let embedder = CountingEmbedder::new(8);
    let embed_calls = Arc::clone(&embedder.calls);
    let r = Retriever::new(backend, Box::new(embedder), RetrievalConfig::default());

    let opts = RetrieveOptions { query_vector: Some(vec![0.02; 8]), ..Default::default() };
    let out = r.retrieve_with_info("q", &opts).await.expect("ok");
    assert_eq!(out.hits.len(), 2);
    assert_eq!(embed_calls.load(Ordering::SeqCst), 0, "no embedding call");

    let body = r.backend().recorded_body("ann_query");
    let sent = body["query"]["knn"]["embedding"]["vector"].as_array().expect("vector");
    assert_eq!(sent.len(), 8);
    assert!((sent[0].as_f64().expect("f64") - 0.02).abs() < 1e-6);
}

#[tokio::test]
async fn per_label_cap_applies_before_the_slice() {
    // t_0 and t_1 share label t_label_0; t_2 and t_3 share t_label_1.
    let backend = MockBackend::with(&[("ann_query", Outcome::Respond(bare(make_hits("t", 4))))]);
    let r = retriever(backend);

    let opts = RetrieveOptions { max_per_label: Some(1), ..Default::default() };
    let out = r.retrieve_with_info("q", &opts).await.expect("ok");
    let ids: Vec<&str> = out.hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["t_0", "t_2"]);
}

#[tokio::test]
async fn filter_terms_reach_the_backend_verbatim() {
    let backend = MockBackend::with(&[("ann_query", Outcome::Respond(bare(vec![])))]);
    let r = retriever(backend);

    let mut opts = RetrieveOptions::default();
    opts.filter.insert("openfda.route".to_string(), ScalarValue::from("ORAL"));
    r.retrieve_with_info("q", &opts).await.expect("ok");

    let body = r.backend().recorded_body("ann_query");
    assert_eq!(body["query"]["bool"]["filter"][0]["term"]["openfda.route"], json!("ORAL"));
    assert_eq!(body["_source"]["excludes"], json!(["embedding"]));
}

#[tokio::test]
async fn hybrid_fuses_text_and_ann_and_caps() {
    let text_hits = make_hits("t", 5);
    let mut ann_hits = make_hits("a", 5);
    ann_hits[0]["_id"] = json!("t_0"); // shared top hit across branches

    let backend = MockBackend::with(&[
        ("lexical", Outcome::Respond(enveloped(text_hits))),
        ("ann_toplevel", Outcome::Respond(enveloped(ann_hits))),
    ]);
    let r = retriever(backend);

    let opts = HybridOptions {
        base: RetrieveOptions { top_k: Some(6), highlight: true, ..Default::default() },
        text_k: Some(5),
        ann_k: Some(5),
        rrf_c: Some(60.0),
        ..Default::default()
    };
    let out = r.retrieve_hybrid("ibuprofen dosing", &opts).await.expect("ok");

    assert_eq!(out.info.strategy(), "hybrid");
    assert_eq!(out.info.text_count, 5);
    assert_eq!(out.info.ann_count, 5);
    assert!(out.info.embedded);
    assert_eq!(out.hits.len(), 6);
    assert_eq!(out.hits[0].id, "t_0", "two rank-1 contributions win");
    let hl = out.hits[0].highlight.as_ref().expect("highlight");
    assert!(hl["text"][0].contains("<em>"));

    let ann_body = r.backend().recorded_body("ann_toplevel");
    assert_eq!(ann_body["size"], json!(5));
    assert_eq!(ann_body["knn"]["num_candidates"], json!(500), "max(500, ann_k*2)");
}

#[tokio::test]
async fn hybrid_tolerates_a_failed_branch() {
    let backend = MockBackend::with(&[
        ("lexical", Outcome::Respond(bare(make_hits("t", 3)))),
        ("ann_toplevel", Outcome::Fail("vector search down".into())),
    ]);
    let r = retriever(backend);

    let opts = HybridOptions {
        base: RetrieveOptions { top_k: Some(2), ..Default::default() },
        text_k: Some(3),
        ann_k: Some(3),
        ..Default::default()
    };
    let out = r.retrieve_hybrid("boxed warning", &opts).await.expect("never throws");

    assert_eq!(out.hits.len(), 2);
    assert!(out.hits[0].id.starts_with("t_"));
    assert_eq!(out.info.text_count, 3);
    assert_eq!(out.info.ann_count, 0);
}

#[tokio::test]
async fn hybrid_with_query_vector_reports_not_embedded() {
    let backend = MockBackend::with(&[
        ("lexical", Outcome::Respond(bare(make_hits("t", 2)))),
        ("ann_toplevel", Outcome::Respond(bare(vec![]))),
    ]);
    let r = retriever(backend);

    let opts = HybridOptions {
        base: RetrieveOptions { query_vector: Some(vec![0.02; 8]), ..Default::default() },
        ..Default::default()
    };
    let out = r.retrieve_hybrid("q", &opts).await.expect("ok");
    assert!(!out.info.embedded);
}

#[test]
fn extract_hits_tolerates_both_response_shapes() {
    let hits = make_hits("t", 2);
    assert_eq!(extract_hits(&bare(hits.clone())).expect("bare").len(), 2);
    assert_eq!(extract_hits(&enveloped(hits)).expect("enveloped").len(), 2);
    assert!(extract_hits(&json!({ "took": 3 })).is_none());
    assert!(extract_hits(&json!({ "hits": { "hits": 7 } })).is_none());
}

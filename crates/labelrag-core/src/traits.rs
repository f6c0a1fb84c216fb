use async_trait::async_trait;
use serde_json::Value;

/// Minimal surface of the search backend consumed by retrieval.
///
/// `search` returns the raw JSON response; callers tolerate both the
/// enveloped shape `{body: {hits: {hits: [...]}}}` and the bare shape
/// `{hits: {hits: [...]}}`. `count` is used only by diagnostics.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, index: &str, body: &Value) -> anyhow::Result<Value>;
    async fn count(&self, index: &str, body: &Value) -> anyhow::Result<u64>;
}

/// Embedding provider: one L2-normalized vector per input text, same order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

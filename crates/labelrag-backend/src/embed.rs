//! Embedding providers.
//!
//! `RemoteEmbedder` calls an OpenAI-style embeddings endpoint. `HashEmbedder`
//! buckets xxhashed tokens into a fixed-dim L2-normalized vector: cheap,
//! deterministic, and good enough for tests and offline runs where real
//! semantic quality does not matter.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use labelrag_core::config::EmbeddingsConfig;
use labelrag_core::traits::Embedder;
use serde::Deserialize;
use serde_json::json;

pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn from_config(cfg: &EmbeddingsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            dim: cfg.dim,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "model": self.model, "input": texts }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            bail!("embeddings endpoint returned {status}: {text}");
        }
        let parsed: EmbeddingsResponse = res.json().await?;
        if parsed.data.len() != texts.len() {
            bail!("expected {} embeddings, got {}", texts.len(), parsed.data.len());
        }
        // The API may return items out of order; index restores input order.
        let mut out = vec![Vec::new(); texts.len()];
        for item in parsed.data {
            let slot = out
                .get_mut(item.index)
                .ok_or_else(|| anyhow!("embedding index {} out of range", item.index))?;
            *slot = item.embedding;
        }
        Ok(out)
    }
}

/// Deterministic fake: hash each whitespace token into a bucket, then
/// L2-normalize. Same input, same vector.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Provider selection from config: the hashing fake when `use_fake` is set,
/// the remote API otherwise.
pub fn embedder_from_config(cfg: &EmbeddingsConfig) -> anyhow::Result<Box<dyn Embedder>> {
    if cfg.use_fake {
        return Ok(Box::new(HashEmbedder::new(cfg.dim)));
    }
    Ok(Box::new(RemoteEmbedder::from_config(cfg)?))
}

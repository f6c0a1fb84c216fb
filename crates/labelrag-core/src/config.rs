//! Typed configuration, resolved once at process start.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env
//! vars (double underscore for nesting, e.g. `APP_BACKEND__NODE`). The
//! orchestrator receives the extracted struct; nothing re-reads the
//! environment per call.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;

/// Retrieval defaults applied when the per-call options leave them unset.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { index: default_index(), top_k: default_top_k() }
    }
}

/// Connection settings for the search backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_node")]
    pub node: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Dev only: tolerate self-signed certs on the backend node.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            node: default_node(),
            username: default_username(),
            password: String::new(),
            accept_invalid_certs: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embed_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embed_dim")]
    pub dim: usize,
    /// Use the deterministic hashing embedder instead of the remote API.
    #[serde(default)]
    pub use_fake: bool,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embed_endpoint(),
            model: default_embed_model(),
            api_key: None,
            dim: default_embed_dim(),
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))
    }
}

fn default_index() -> String { "drug-chunks".to_string() }
fn default_top_k() -> usize { crate::types::DEFAULT_TOP_K }
fn default_node() -> String { "https://localhost:9200".to_string() }
fn default_username() -> String { "admin".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_embed_endpoint() -> String { "https://api.openai.com/v1/embeddings".to_string() }
fn default_embed_model() -> String { "text-embedding-3-small".to_string() }
fn default_embed_dim() -> usize { 1536 }

//! HTTP adapter for an OpenSearch-compatible search engine.
//!
//! Speaks the two endpoints the core consumes: `POST {node}/{index}/_search`
//! and `POST {node}/{index}/_count`, with basic auth. Retrieval itself
//! defines no deadline; the client timeout here bounds every backend call.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use labelrag_core::config::BackendConfig;
use labelrag_core::traits::SearchBackend;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub struct HttpSearchBackend {
    client: reqwest::Client,
    node: String,
    username: String,
    password: String,
}

impl HttpSearchBackend {
    pub fn from_config(cfg: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            // Dev only: self-signed certs on a local node.
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            node: cfg.node.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let url = format!("{}/{path}", self.node);
        debug!(%url, "backend request");
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        let status = res.status();
        let value: Value = res.json().await?;
        if !status.is_success() {
            bail!("backend returned {status}: {value}");
        }
        Ok(value)
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, index: &str, body: &Value) -> anyhow::Result<Value> {
        self.post(&format!("{index}/_search"), body).await
    }

    async fn count(&self, index: &str, body: &Value) -> anyhow::Result<u64> {
        let res = self.post(&format!("{index}/_count"), body).await?;
        // Same envelope tolerance as search responses.
        let body = res.get("body").unwrap_or(&res);
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("count response missing count field"))
    }
}

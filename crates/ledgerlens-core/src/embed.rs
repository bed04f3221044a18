//! Text embeddings for the retrieval pipeline
//!
//! [`OllamaEmbedder`] talks to Ollama's `/api/embeddings` endpoint.
//! [`embed_batch`] fans a list of texts out over a bounded number of
//! concurrent requests and reassembles the vectors in input order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Produces an embedding vector for a piece of text
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model(&self) -> &str;
}

#[derive(Clone)]
pub struct OllamaEmbedder {
    http_client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Create from `OLLAMA_HOST` / `OLLAMA_EMBED_MODEL`; `None` without a host
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("OLLAMA_HOST") else {
            return Ok(None);
        };
        let defaults = EmbeddingConfig::default();
        let model = std::env::var("OLLAMA_EMBED_MODEL").unwrap_or(defaults.model);
        Self::new(&host, &model, Duration::from_secs(defaults.timeout_secs)).map(Some)
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http_client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!(
                "Embedding request returned {}",
                status
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Malformed embedding response: {}", e)))?;
        if body.embedding.is_empty() {
            return Err(Error::Provider("Empty embedding returned".into()));
        }
        debug!(model = %self.model, dims = body.embedding.len(), "Embedded text");
        Ok(body.embedding.into_iter().map(|v| v as f32).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Embed `texts` with at most `max_concurrency` requests in flight.
///
/// The output is parallel to `texts`; items that failed are `None`. The batch
/// fails only when every item failed or `cancel` fired.
pub async fn embed_batch(
    embedder: Arc<dyn Embedder>,
    texts: &[String],
    max_concurrency: usize,
    cancel: &CancelToken,
) -> Result<Vec<Option<Vec<f32>>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (index, text) in texts.iter().cloned().enumerate() {
        let embedder = Arc::clone(&embedder);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| Error::Cancelled);
            if cancel.is_cancelled() {
                return (index, Err(Error::Cancelled));
            }
            (index, embedder.embed(&text).await)
        });
    }

    let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
    let mut first_error: Option<String> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(vector))) => results[index] = Some(vector),
            Ok((index, Err(e))) => {
                warn!(index, error = %e, "Embedding failed");
                first_error.get_or_insert_with(|| e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Embedding task panicked");
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let succeeded = results.iter().filter(|r| r.is_some()).count();
    if succeeded == 0 {
        return Err(Error::Provider(format!(
            "All {} embedding requests failed: {}",
            texts.len(),
            first_error.unwrap_or_default()
        )));
    }
    debug!(total = texts.len(), succeeded, "Embedded batch");
    Ok(results)
}

//! HTTP embedding client.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend-agnostic embedding interface.
///
/// `embed` is order-preserving: one vector per input text, same order,
/// same length. `health` reports reachability and must not fail —
/// an unreachable backend is a normal, reportable state.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;

    fn health(&self) -> impl Future<Output = bool> + Send;
}

/// Client for the embedding microservice (`POST /embed`, `GET /health`).
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Embedder for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(format!("{}/embed", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .json(&EmbedRequest { texts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "embedding service returned an error");
            return Err(EmbedError::Backend {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| EmbedError::Malformed(format!("invalid JSON: {e}")))?;

        validate_batch(texts.len(), &parsed.embeddings)?;
        Ok(parsed.embeddings)
    }

    async fn health(&self) -> bool {
        match self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("embedding service unreachable: {e}");
                false
            }
        }
    }
}

fn validate_batch(expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    if embeddings.len() != expected {
        return Err(EmbedError::Malformed(format!(
            "expected {expected} vectors, got {}",
            embeddings.len()
        )));
    }

    let dim = embeddings[0].len();
    if dim == 0 {
        return Err(EmbedError::Malformed("zero-dimension vector".into()));
    }
    if let Some(bad) = embeddings.iter().find(|v| v.len() != dim) {
        return Err(EmbedError::Malformed(format!(
            "inconsistent dimensionality: {dim} vs {}",
            bad.len()
        )));
    }

    Ok(())
}

//! Test-only deterministic embedder.

use std::sync::{Arc, Mutex};

use crate::client::Embedder;
use crate::error::{EmbedError, Result};

/// Deterministic in-process embedder for tests.
///
/// Vectors are derived from a blake3 hash of the text, so identical
/// inputs always embed identically and distinct inputs almost never
/// collide. Batch sizes are recorded for assertions.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub fail: bool,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimension: 8,
            fail: false,
            batch_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// An embedder whose every call fails and whose health probe is down.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Sizes of the batches passed to `embed`, in call order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let hash = blake3::hash(text.as_bytes());
        hash.as_bytes()
            .iter()
            .cycle()
            .take(self.dimension)
            .map(|b| f32::from(*b) / 255.0)
            .collect()
    }
}

impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(EmbedError::Backend { status: 503 });
        }
        if let Ok(mut sizes) = self.batch_sizes.lock() {
            sizes.push(texts.len());
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn health(&self) -> bool {
        !self.fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed(&["hello".into()]).await.unwrap();
        let b = embedder.embed(&["hello".into()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embed_respects_dimension() {
        let embedder = MockEmbedder::new(16);
        let vectors = embedder.embed(&["x".into()]).await.unwrap();
        assert_eq!(vectors[0].len(), 16);
    }

    #[tokio::test]
    async fn distinct_texts_differ() {
        let embedder = MockEmbedder::default();
        let vectors = embedder.embed(&["a".into(), "b".into()]).await.unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn failing_embedder_errors_and_is_unhealthy() {
        let embedder = MockEmbedder::failing();
        assert!(embedder.embed(&["a".into()]).await.is_err());
        assert!(!embedder.health().await);
    }

    #[tokio::test]
    async fn batch_sizes_recorded() {
        let embedder = MockEmbedder::default();
        embedder.embed(&["a".into(), "b".into()]).await.unwrap();
        embedder.embed(&["c".into()]).await.unwrap();
        assert_eq!(embedder.batch_sizes(), vec![2, 1]);
    }
}

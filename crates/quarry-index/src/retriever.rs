//! Query-time semantic search over an indexed root.

use std::path::Path;
use std::sync::Arc;

use quarry_embed::Embedder;
use quarry_store::{ScoredVectorPoint, VectorStore, collection_key, payload};
use tracing::{debug, warn};

use crate::error::RetrieveError;
use crate::indexer::resolve_root;

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub file_path: String,
    pub content: String,
    pub score: f32,
}

/// Point-in-time index health, for status displays.
///
/// Never fails: backend problems degrade to zero counts and
/// `embedding_service_reachable: false` rather than an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStatus {
    pub files: usize,
    pub chunks: usize,
    /// True iff at least one chunk is stored.
    pub indexed: bool,
    pub embedding_service_reachable: bool,
}

/// Searches the collection belonging to one indexed root.
pub struct Retriever<E: Embedder> {
    store: Arc<dyn VectorStore>,
    embedder: Arc<E>,
    collection: String,
}

impl<E: Embedder> Retriever<E> {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<E>, root: &Path) -> Self {
        let collection = collection_key(&resolve_root(root));
        Self {
            store,
            embedder,
            collection,
        }
    }

    /// Top `n_results` chunks most similar to `query`, best first.
    ///
    /// A blank query or an unindexed root yields an empty result.
    ///
    /// # Errors
    ///
    /// [`RetrieveError::Unavailable`] when the embedding backend cannot
    /// embed the query; [`RetrieveError::Store`] on store failures.
    pub async fn search(
        &self,
        query: &str,
        n_results: u64,
    ) -> Result<Vec<SearchHit>, RetrieveError> {
        if query.trim().is_empty() || n_results == 0 {
            return Ok(Vec::new());
        }

        let texts = vec![query.to_owned()];
        let mut vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(RetrieveError::Unavailable)?;
        let Some(vector) = vectors.pop() else {
            return Ok(Vec::new());
        };

        let points = self
            .store
            .search(&self.collection, vector, n_results)
            .await?;
        debug!(hits = points.len(), "semantic search complete");
        Ok(points.into_iter().filter_map(to_hit).collect())
    }

    /// Whether the root currently has indexed content: true iff at
    /// least one chunk is stored. A collection created by a pass that
    /// found nothing to index does not count.
    ///
    /// # Errors
    ///
    /// [`RetrieveError::Store`] when the store cannot be reached.
    pub async fn is_indexed(&self) -> Result<bool, RetrieveError> {
        Ok(self.store.count(&self.collection).await?.chunks > 0)
    }

    /// Current counts and backend reachability. `indexed` follows the
    /// same iff-contract as [`Retriever::is_indexed`].
    pub async fn status(&self) -> IndexStatus {
        let reachable = self.embedder.health().await;

        match self.store.count(&self.collection).await {
            Ok(stats) => IndexStatus {
                files: stats.files,
                chunks: stats.chunks,
                indexed: stats.chunks > 0,
                embedding_service_reachable: reachable,
            },
            Err(e) => {
                warn!(error = %e, "store unreachable during status check");
                IndexStatus {
                    embedding_service_reachable: reachable,
                    ..IndexStatus::default()
                }
            }
        }
    }
}

/// Points missing the expected payload fields are dropped, not errors.
fn to_hit(point: ScoredVectorPoint) -> Option<SearchHit> {
    let file_path = point.payload.get(payload::PATH)?.as_str()?.to_owned();
    let content = point.payload.get(payload::TEXT)?.as_str()?.to_owned();
    Some(SearchHit {
        file_path,
        content,
        score: point.score,
    })
}

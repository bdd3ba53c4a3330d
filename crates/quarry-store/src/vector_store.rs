//! Object-safe vector store contract.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::VectorStoreError;

/// Payload field names shared by all backends.
pub mod payload {
    /// Source file path, root-relative.
    pub const PATH: &str = "path";
    /// Chunk text.
    pub const TEXT: &str = "text";
    /// Start character offset into the source file.
    pub const START: &str = "start";
    /// End character offset into the source file.
    pub const END: &str = "end";
}

/// A point to upsert: stable id, embedding vector, chunk payload.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// A similarity search hit. Higher score means more similar.
#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Entry counts for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Distinct source files among stored entries.
    pub files: usize,
    /// Stored entries.
    pub chunks: usize,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Collection-scoped vector storage.
///
/// All operations are namespaced by a collection key so two indexed roots
/// never cross-contaminate even on shared backing storage. `upsert` is
/// insert-or-replace by point id; `search` on a missing or empty
/// collection returns an empty result, not an error.
pub trait VectorStore: Send + Sync {
    /// Probe backend readiness. Idempotent; called once by the owning
    /// process before first use so connection failures surface early
    /// instead of on the first write.
    fn open(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Create the collection if missing. A collection that already
    /// exists with a different vector dimension is an error, not a
    /// silent reuse.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    /// Remove the collection and everything in it. Other collections are
    /// unaffected. Missing collection is not an error.
    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Up to `limit` nearest entries, sorted descending by score.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<CollectionStats, VectorStoreError>>;

    /// Remove every entry whose `path` payload field equals `path`.
    fn delete_by_path(
        &self,
        collection: &str,
        path: &str,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;
}

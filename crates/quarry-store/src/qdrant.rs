//! Qdrant-backed vector store.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};

use tracing::{debug, warn};

use crate::error::VectorStoreError;
use crate::vector_store::{
    CollectionStats, ScoredVectorPoint, VectorPoint, VectorStore, payload,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const SCROLL_PAGE: u32 = 256;

pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Create a store connected to the given Qdrant URL.
    ///
    /// Connection is not probed here; call [`VectorStore::open`] once
    /// before first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed from the URL.
    pub fn new(url: &str) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }
}

fn to_qdrant_payload(
    map: &HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>, VectorStoreError> {
    let object: serde_json::Map<String, serde_json::Value> =
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| VectorStoreError::Serialization(e.to_string()))
}

/// Decode the payload value kinds chunk records use (strings and
/// integers, plus doubles for safety). Anything else becomes null.
fn from_qdrant_value(value: &qdrant_client::qdrant::Value) -> serde_json::Value {
    if let Some(s) = value.as_str() {
        return serde_json::Value::String(s.clone());
    }
    if let Some(i) = value.as_integer() {
        return serde_json::json!(i);
    }
    if let Some(d) = value.as_double() {
        return serde_json::json!(d);
    }
    serde_json::Value::Null
}

fn from_qdrant_payload(
    map: &HashMap<String, qdrant_client::qdrant::Value>,
) -> HashMap<String, serde_json::Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), from_qdrant_value(v)))
        .collect()
}

fn point_id_string(id: Option<&qdrant_client::qdrant::PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.and_then(|p| p.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

impl VectorStore for QdrantStore {
    fn open(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.client.health_check().await.map_err(|e| {
                warn!(url = %self.url, error = %e, "qdrant health check failed");
                VectorStoreError::Connection(e.to_string())
            })?;
            Ok(())
        })
    }

    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            if exists {
                return Ok(());
            }

            debug!(collection, vector_size, "creating collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            if !exists {
                return Ok(());
            }
            debug!(collection, "deleting collection");
            self.client
                .delete_collection(&collection)
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut qdrant_points = Vec::with_capacity(points.len());
            for p in points {
                let payload = to_qdrant_payload(&p.payload)?;
                qdrant_points.push(PointStruct::new(p.id, p.vector, payload));
            }

            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, qdrant_points))
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            if !exists {
                return Ok(Vec::new());
            }

            let results = self
                .client
                .search_points(
                    SearchPointsBuilder::new(&collection, vector, limit).with_payload(true),
                )
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            Ok(results
                .result
                .iter()
                .map(|point| ScoredVectorPoint {
                    id: point_id_string(point.id.as_ref()),
                    score: point.score,
                    payload: from_qdrant_payload(&point.payload),
                })
                .collect())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<CollectionStats, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            if !exists {
                return Ok(CollectionStats::default());
            }

            let counted = self
                .client
                .count(CountPointsBuilder::new(&collection).exact(true))
                .await
                .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            let chunks = counted.result.map_or(0, |r| r.count);

            // Distinct file paths require a payload scan; Qdrant has no
            // aggregation API.
            let mut files: HashSet<String> = HashSet::new();
            let mut offset = None;
            loop {
                let mut builder = ScrollPointsBuilder::new(&collection)
                    .limit(SCROLL_PAGE)
                    .with_payload(true)
                    .with_vectors(false);
                if let Some(next) = offset {
                    builder = builder.offset(next);
                }

                let page = self
                    .client
                    .scroll(builder)
                    .await
                    .map_err(|e| VectorStoreError::Count(e.to_string()))?;

                for point in &page.result {
                    if let Some(path) = point.payload.get(payload::PATH).and_then(|v| v.as_str()) {
                        files.insert(path.clone());
                    }
                }

                match page.next_page_offset {
                    Some(next) => offset = Some(next),
                    None => break,
                }
            }

            Ok(CollectionStats {
                files: files.len(),
                chunks: usize::try_from(chunks).unwrap_or(usize::MAX),
            })
        })
    }

    fn delete_by_path(
        &self,
        collection: &str,
        path: &str,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        let path = path.to_owned();
        Box::pin(async move {
            let filter = Filter::must([Condition::matches(payload::PATH, path)]);
            self.client
                .delete_points(DeletePointsBuilder::new(&collection).points(filter))
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrip_preserves_chunk_fields() {
        let original: HashMap<String, serde_json::Value> = HashMap::from([
            (payload::PATH.to_owned(), serde_json::json!("src/lib.rs")),
            (payload::TEXT.to_owned(), serde_json::json!("fn main() {}")),
            (payload::START.to_owned(), serde_json::json!(0)),
            (payload::END.to_owned(), serde_json::json!(12)),
        ]);

        let qdrant = to_qdrant_payload(&original).unwrap();
        let back = from_qdrant_payload(&qdrant);

        assert_eq!(back.get(payload::PATH), original.get(payload::PATH));
        assert_eq!(back.get(payload::TEXT), original.get(payload::TEXT));
        assert_eq!(
            back.get(payload::START).and_then(serde_json::Value::as_i64),
            Some(0)
        );
        assert_eq!(
            back.get(payload::END).and_then(serde_json::Value::as_i64),
            Some(12)
        );
    }

    #[test]
    fn point_id_string_handles_missing() {
        assert_eq!(point_id_string(None), "");
    }

    #[test]
    fn new_with_valid_url() {
        let store = QdrantStore::new("http://localhost:6334").unwrap();
        let dbg = format!("{store:?}");
        assert!(dbg.contains("QdrantStore"));
        assert!(dbg.contains("6334"));
    }
}

//! Persistent vector storage for indexed code chunks.
//!
//! One logical collection per indexed root directory, named by a
//! deterministic key so the same root always maps to the same collection
//! across restarts. The [`VectorStore`] trait is object-safe; the Qdrant
//! implementation is the persistent backend, the in-memory one backs
//! tests and non-persistent use.

pub mod collection;
pub mod error;
pub mod in_memory;
pub mod qdrant;
pub mod vector_store;

pub use collection::collection_key;
pub use error::VectorStoreError;
pub use in_memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use vector_store::{CollectionStats, ScoredVectorPoint, VectorPoint, VectorStore, payload};

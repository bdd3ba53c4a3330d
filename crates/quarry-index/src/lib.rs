//! Codebase indexing and semantic retrieval.
//!
//! The pipeline: walk a project tree with a fixed exclusion set, split
//! files into overlapping line-bounded chunks, embed chunk batches via
//! the external embedding service, and upsert them into a vector store
//! collection keyed by the indexed root. At query time the retriever
//! embeds the query and returns the top-N chunks; the context injector
//! wraps retrieval in a failure boundary and formats hits for the host
//! conversation loop, so retrieval problems never interrupt a chat turn.

pub mod chunker;
pub mod config;
pub mod error;
pub mod indexer;
pub mod injector;
pub mod retriever;

pub use chunker::{Chunk, ChunkerConfig};
pub use config::RagConfig;
pub use error::{IndexError, RetrieveError};
pub use indexer::{IndexReport, Indexer, IndexerConfig};
pub use injector::{ContextInjector, Role};
pub use retriever::{IndexStatus, Retriever, SearchHit};

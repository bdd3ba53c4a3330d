//! Error types for quarry-index.

use quarry_embed::EmbedError;
use quarry_store::VectorStoreError;

/// Errors from an indexing pass.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error resolving or reading the indexed root.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding backend failure outside a pass (e.g. single-file
    /// re-index).
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),

    /// Vector store failure outside a pass.
    #[error("store error: {0}")]
    Store(#[from] VectorStoreError),

    /// A pass stopped partway on a backend failure. Counts reflect what
    /// was durably upserted before the stop; everything upserted remains
    /// valid.
    #[error("index pass aborted after {file_count} files / {chunk_count} chunks: {reason}")]
    Aborted {
        file_count: usize,
        chunk_count: usize,
        reason: String,
    },
}

/// Errors from a direct `search` call.
///
/// The context injector recovers from these locally; direct callers see
/// them as-is.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(#[source] EmbedError),

    #[error("store error: {0}")]
    Store(#[from] VectorStoreError),
}

//! Error types for quarry-embed.

/// Errors from the embedding service.
///
/// Every variant means the backend is effectively unavailable for the
/// current call; callers decide whether to abort or degrade. Vectors are
/// never silently substituted.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Network-level failure reaching the service.
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("embedding service error (status {status})")]
    Backend { status: u16 },

    /// Response body did not match the expected shape: wrong vector
    /// count, inconsistent dimensionality, or undecodable JSON.
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

/// Result type alias using `EmbedError`.
pub type Result<T> = std::result::Result<T, EmbedError>;

//! Client for the external embedding service.
//!
//! The service is an opaque remote function: a batch of texts goes in, one
//! fixed-dimension vector per text comes out, in the same order. The
//! [`Embedder`] trait is the seam the indexing pipeline is generic over;
//! [`EmbeddingClient`] is the HTTP implementation, and a deterministic
//! [`mock::MockEmbedder`] is available behind the `mock` feature.

pub mod client;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;

pub use client::{Embedder, EmbeddingClient};
pub use error::{EmbedError, Result};

//! Pipeline configuration: TOML file plus environment overrides.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::chunker::ChunkerConfig;
use crate::indexer::IndexerConfig;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub embedding: EmbeddingSection,
    pub store: StoreSection,
    pub indexing: IndexingSection,
    pub retrieval: RetrievalSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub qdrant_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IndexingSection {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_file_size: u64,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub max_results: u64,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:8100".into(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".into(),
        }
    }
}

impl Default for IndexingSection {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            max_file_size: 1_048_576,
            batch_size: 32,
        }
    }
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self { max_results: 5 }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingSection::default(),
            store: StoreSection::default(),
            indexing: IndexingSection::default(),
            retrieval: RetrievalSection::default(),
        }
    }
}

impl RagConfig {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist; unknown or
    /// missing keys within a present file fall back per-field.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_EMBEDDING_URL") {
            self.embedding.url = v;
        }
        if let Ok(v) = std::env::var("QUARRY_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
    }

    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.indexing.chunk_size,
            overlap: self.indexing.chunk_overlap,
        }
    }

    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chunker: self.chunker_config(),
            max_file_size: self.indexing.max_file_size,
            batch_size: self.indexing.batch_size,
        }
    }
}

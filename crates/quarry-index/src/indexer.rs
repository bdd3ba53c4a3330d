//! Walks a project tree, chunks files, embeds batches, upserts points.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ignore::WalkBuilder;
use quarry_embed::Embedder;
use quarry_store::{VectorPoint, VectorStore, collection_key, payload};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chunker::{Chunk, ChunkerConfig, chunk_file};
use crate::error::IndexError;

/// Directory names pruned from the walk at any depth.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    ".env",
    ".tox",
    ".nox",
    ".mypy_cache",
    ".pytest_cache",
    "dist",
    "build",
    ".eggs",
    "target",
    "vendor",
];

/// Indexing pass configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    /// Files larger than this (bytes) are skipped, not truncated.
    pub max_file_size: u64,
    /// Upper bound on texts per embedding request.
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            max_file_size: 1_048_576,
            batch_size: 32,
        }
    }
}

/// Outcome of a completed indexing pass.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Files that contributed at least one upserted chunk.
    pub file_count: usize,
    /// Chunks upserted.
    pub chunk_count: usize,
    /// Files passed over: too large, binary, or unreadable.
    pub skipped_count: usize,
    /// Per-file problems that did not stop the pass.
    pub errors: Vec<String>,
    pub duration_ms: u128,
}

/// Builds and maintains the vector collection for indexed roots.
///
/// Passes are serialized: a second `index`, `reindex_file`, or `clear`
/// call waits for the running one to finish rather than interleaving
/// writes into the same collection.
pub struct Indexer<E: Embedder> {
    store: Arc<dyn VectorStore>,
    embedder: Arc<E>,
    config: IndexerConfig,
    pass_lock: Mutex<()>,
}

impl<E: Embedder> Indexer<E> {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<E>, config: IndexerConfig) -> Self {
        Self {
            store,
            embedder,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    /// Index every eligible file under `root` into its collection.
    ///
    /// Re-running over unchanged content is idempotent: chunk ids are
    /// deterministic, so existing points are overwritten in place. A
    /// file's stale chunks are deleted the first time a batch containing
    /// its fresh chunks is durably embedded, never earlier, so an
    /// aborted pass cannot leave a file deleted but not re-inserted. A
    /// file that now chunks to nothing has no fresh data to wait for;
    /// its old entries are deleted as soon as it is walked.
    ///
    /// # Errors
    ///
    /// [`IndexError::Aborted`] when the embedding backend or store fails
    /// mid-pass; the counts inside reflect what was already upserted.
    pub async fn index(&self, root: &Path) -> Result<IndexReport, IndexError> {
        let _guard = self.pass_lock.lock().await;
        let started = Instant::now();

        let root = resolve_root(root);
        let collection = collection_key(&root);

        // Probe before touching the filesystem: one cheap request tells
        // us both that the backend is up and what dimension it produces.
        let probe = vec![String::from("probe")];
        let probe_vectors = match self.embedder.embed(&probe).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "embedding backend unreachable, aborting pass");
                return Err(IndexError::Aborted {
                    file_count: 0,
                    chunk_count: 0,
                    reason: e.to_string(),
                });
            }
        };
        let Some(dimension) = probe_vectors.first().map(|v| v.len() as u64) else {
            return Err(IndexError::Aborted {
                file_count: 0,
                chunk_count: 0,
                reason: "embedding backend returned no probe vector".into(),
            });
        };

        self.store.ensure_collection(&collection, dimension).await?;

        let mut report = IndexReport::default();
        let mut pending: Vec<Chunk> = Vec::new();
        let mut cleared: HashSet<String> = HashSet::new();
        let mut indexed_files: HashSet<String> = HashSet::new();

        let walker = WalkBuilder::new(&root)
            .standard_filters(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && is_skipped_dir(&entry.file_name().to_string_lossy()))
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    report.skipped_count += 1;
                    report.errors.push(format!("{}: {e}", path.display()));
                    continue;
                }
            };
            if metadata.len() > self.config.max_file_size {
                debug!(path = %path.display(), size = metadata.len(), "skipping oversized file");
                report.skipped_count += 1;
                continue;
            }

            let bytes = match tokio::fs::read(path).await {
                Ok(b) => b,
                Err(e) => {
                    report.skipped_count += 1;
                    report.errors.push(format!("{}: {e}", path.display()));
                    continue;
                }
            };
            let Ok(content) = String::from_utf8(bytes) else {
                // Binary file.
                report.skipped_count += 1;
                continue;
            };

            let rel = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            let chunks = chunk_file(&rel, &content, &self.config.chunker);
            if chunks.is_empty() {
                // The file may still have entries from a previous pass.
                // No embedding is involved, so deleting immediately is
                // safe even if the pass later aborts.
                if cleared.insert(rel.clone())
                    && let Err(e) = self.store.delete_by_path(&collection, &rel).await
                {
                    warn!(error = %e, "index pass aborted clearing emptied file");
                    return Err(IndexError::Aborted {
                        file_count: indexed_files.len(),
                        chunk_count: report.chunk_count,
                        reason: e.to_string(),
                    });
                }
                continue;
            }
            pending.extend(chunks);

            while pending.len() >= self.config.batch_size {
                let batch: Vec<Chunk> = pending.drain(..self.config.batch_size).collect();
                self.flush_or_abort(&collection, &batch, &mut cleared, &mut indexed_files, &report)
                    .await?;
                report.chunk_count += batch.len();
            }
        }

        if !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            self.flush_or_abort(&collection, &batch, &mut cleared, &mut indexed_files, &report)
                .await?;
            report.chunk_count += batch.len();
        }

        report.file_count = indexed_files.len();
        report.duration_ms = started.elapsed().as_millis();
        info!(
            files = report.file_count,
            chunks = report.chunk_count,
            skipped = report.skipped_count,
            duration_ms = report.duration_ms,
            "index pass complete"
        );
        Ok(report)
    }

    /// Re-index a single file, replacing all of its chunks.
    ///
    /// Returns the number of chunks upserted. A file that chunks to
    /// nothing has its existing entries removed and yields zero.
    ///
    /// # Errors
    ///
    /// Propagates IO, embedding, and store failures directly.
    pub async fn reindex_file(&self, root: &Path, file_path: &Path) -> Result<usize, IndexError> {
        let _guard = self.pass_lock.lock().await;
        let root = resolve_root(root);
        let collection = collection_key(&root);

        let abs = if file_path.is_absolute() {
            file_path.to_path_buf()
        } else {
            root.join(file_path)
        };
        let rel = abs
            .strip_prefix(&root)
            .unwrap_or(&abs)
            .to_string_lossy()
            .into_owned();

        let content = tokio::fs::read_to_string(&abs).await?;
        let chunks = chunk_file(&rel, &content, &self.config.chunker);
        if chunks.is_empty() {
            if self.store.collection_exists(&collection).await? {
                self.store.delete_by_path(&collection, &rel).await?;
            }
            return Ok(0);
        }

        // Embed everything before touching the store so a backend
        // failure leaves the old entries intact.
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            vectors.extend(self.embedder.embed(&texts).await?);
        }
        let dimension = vectors.first().map_or(0, |v| v.len() as u64);

        self.store.ensure_collection(&collection, dimension).await?;
        self.store.delete_by_path(&collection, &rel).await?;
        let points = chunks.iter().zip(vectors).map(point_for).collect();
        self.store.upsert(&collection, points).await?;
        Ok(chunks.len())
    }

    /// Drop the collection for `root` entirely.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn clear(&self, root: &Path) -> Result<(), IndexError> {
        let _guard = self.pass_lock.lock().await;
        let root = resolve_root(root);
        let collection = collection_key(&root);
        self.store.delete_collection(&collection).await?;
        info!(collection, "index cleared");
        Ok(())
    }

    async fn flush_or_abort(
        &self,
        collection: &str,
        batch: &[Chunk],
        cleared: &mut HashSet<String>,
        indexed_files: &mut HashSet<String>,
        report: &IndexReport,
    ) -> Result<(), IndexError> {
        if let Err(e) = self.flush_batch(collection, batch, cleared).await {
            warn!(error = %e, "index pass aborted mid-batch");
            return Err(IndexError::Aborted {
                file_count: indexed_files.len(),
                chunk_count: report.chunk_count,
                reason: e.to_string(),
            });
        }
        for chunk in batch {
            indexed_files.insert(chunk.file_path.clone());
        }
        Ok(())
    }

    async fn flush_batch(
        &self,
        collection: &str,
        batch: &[Chunk],
        cleared: &mut HashSet<String>,
    ) -> Result<(), IndexError> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        // Stale chunks for a file go only once we hold fresh embedded
        // data for it.
        for chunk in batch {
            if cleared.insert(chunk.file_path.clone()) {
                self.store
                    .delete_by_path(collection, &chunk.file_path)
                    .await?;
            }
        }

        let points = batch.iter().zip(vectors).map(point_for).collect();
        self.store.upsert(collection, points).await?;
        Ok(())
    }
}

fn point_for((chunk, vector): (&Chunk, Vec<f32>)) -> VectorPoint {
    VectorPoint {
        id: chunk.id(),
        vector,
        payload: HashMap::from([
            (payload::PATH.to_owned(), serde_json::json!(chunk.file_path)),
            (payload::TEXT.to_owned(), serde_json::json!(chunk.text)),
            (
                payload::START.to_owned(),
                serde_json::json!(chunk.start_offset),
            ),
            (payload::END.to_owned(), serde_json::json!(chunk.end_offset)),
        ]),
    }
}

fn is_skipped_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name) || name.ends_with(".egg-info")
}

/// Canonicalize so `./project` and `/abs/project` map to the same
/// collection; a root that cannot be canonicalized is used as given.
pub(crate) fn resolve_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_limits() {
        let config = IndexerConfig::default();
        assert_eq!(config.max_file_size, 1_048_576);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.chunker.chunk_size, 800);
        assert_eq!(config.chunker.overlap, 100);
    }

    #[test]
    fn skip_set_covers_common_artifacts() {
        for name in ["node_modules", ".git", "__pycache__", "target", ".venv"] {
            assert!(is_skipped_dir(name), "{name} should be pruned");
        }
        assert!(is_skipped_dir("quarry.egg-info"));
    }

    #[test]
    fn source_dirs_not_skipped() {
        for name in ["src", "lib", "crates", "docs", "builds"] {
            assert!(!is_skipped_dir(name), "{name} should be walked");
        }
    }

    #[test]
    fn resolve_root_falls_back_for_missing_path() {
        let missing = Path::new("/nonexistent/quarry-test-root");
        assert_eq!(resolve_root(missing), missing.to_path_buf());
    }

    #[test]
    fn resolve_root_normalizes_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(resolve_root(dir.path()), canonical);
    }
}

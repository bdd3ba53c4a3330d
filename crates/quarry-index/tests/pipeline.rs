//! End-to-end pipeline tests over the in-memory store and mock embedder.

use std::path::Path;
use std::sync::Arc;

use quarry_embed::mock::MockEmbedder;
use quarry_index::{
    ChunkerConfig, ContextInjector, IndexError, Indexer, IndexerConfig, Retriever, Role,
};
use quarry_store::{InMemoryVectorStore, VectorStore};
use tempfile::TempDir;

fn small_config() -> IndexerConfig {
    IndexerConfig {
        chunker: ChunkerConfig {
            chunk_size: 100,
            overlap: 20,
        },
        max_file_size: 4096,
        batch_size: 4,
    }
}

fn store() -> Arc<dyn VectorStore> {
    Arc::new(InMemoryVectorStore::new())
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn python_lines(n: usize) -> String {
    (0..n)
        .map(|i| format!("def handler_{i:03}(request): ...\n"))
        .collect()
}

#[tokio::test]
async fn index_and_search_roundtrip() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "config.py", "safe_mode = 'off'\nauto_run = False\n");
    write_file(dir.path(), "cli.py", "parser.add_argument('--safe')\n");

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());

    let report = indexer.index(dir.path()).await.unwrap();
    assert_eq!(report.file_count, 2);
    assert!(report.chunk_count >= 2);
    assert_eq!(report.skipped_count, 0);
    assert!(report.errors.is_empty());

    let retriever = Retriever::new(store, embedder, dir.path());
    let hits = retriever.search("safe mode configuration", 10).await.unwrap();
    assert!(!hits.is_empty());
    for hit in &hits {
        assert!(!hit.file_path.is_empty());
        assert!(!hit.content.is_empty());
    }
}

#[tokio::test]
async fn excluded_dirs_are_pruned() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/main.py", "print('hello')\n");
    write_file(dir.path(), "node_modules/dep/index.js", "module.exports = 1\n");
    write_file(dir.path(), ".git/config", "[core]\n");
    write_file(dir.path(), "__pycache__/main.pyc", "cached\n");

    let indexer = Indexer::new(store(), Arc::new(MockEmbedder::new(8)), small_config());
    let report = indexer.index(dir.path()).await.unwrap();
    assert_eq!(report.file_count, 1);
}

#[tokio::test]
async fn oversized_file_skipped() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "small.py", "x = 1\n");
    write_file(dir.path(), "huge.py", &"y = 2\n".repeat(2000));

    let indexer = Indexer::new(store(), Arc::new(MockEmbedder::new(8)), small_config());
    let report = indexer.index(dir.path()).await.unwrap();
    assert_eq!(report.file_count, 1);
    assert_eq!(report.skipped_count, 1);
}

#[tokio::test]
async fn binary_file_skipped_without_error() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "ok.py", "x = 1\n");
    std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

    let indexer = Indexer::new(store(), Arc::new(MockEmbedder::new(8)), small_config());
    let report = indexer.index(dir.path()).await.unwrap();
    assert_eq!(report.file_count, 1);
    assert_eq!(report.skipped_count, 1);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn double_index_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", &python_lines(12));
    write_file(dir.path(), "b.py", &python_lines(5));

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());

    let first = indexer.index(dir.path()).await.unwrap();
    let second = indexer.index(dir.path()).await.unwrap();
    assert_eq!(first.chunk_count, second.chunk_count);

    let retriever = Retriever::new(store, embedder, dir.path());
    let status = retriever.status().await;
    assert_eq!(status.chunks, first.chunk_count);
    assert_eq!(status.files, 2);
}

#[tokio::test]
async fn stale_chunks_removed_after_edit() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", &python_lines(12));

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());

    let first = indexer.index(dir.path()).await.unwrap();
    assert!(first.chunk_count >= 2);

    // Shrink the file; re-index must drop chunks at now-gone offsets.
    write_file(dir.path(), "a.py", &python_lines(2));
    let second = indexer.index(dir.path()).await.unwrap();
    assert!(second.chunk_count < first.chunk_count);

    let retriever = Retriever::new(store, embedder, dir.path());
    let status = retriever.status().await;
    assert_eq!(status.chunks, second.chunk_count);
    assert_eq!(status.files, 1);
}

#[tokio::test]
async fn file_emptied_between_passes_loses_its_entries() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", &python_lines(12));
    write_file(dir.path(), "b.py", "y = 2\n");

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    indexer.index(dir.path()).await.unwrap();

    // The file still exists but now chunks to nothing; a full re-index
    // must drop its old entries.
    write_file(dir.path(), "a.py", "\n\n");
    let report = indexer.index(dir.path()).await.unwrap();
    assert_eq!(report.file_count, 1);

    let retriever = Retriever::new(store, embedder, dir.path());
    let status = retriever.status().await;
    assert_eq!(status.files, 1);
    assert_eq!(status.chunks, 1);
}

#[tokio::test]
async fn empty_root_stays_unindexed() {
    let dir = TempDir::new().unwrap();

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    let report = indexer.index(dir.path()).await.unwrap();
    assert_eq!(report.chunk_count, 0);

    let retriever = Retriever::new(store, embedder, dir.path());
    assert!(!retriever.is_indexed().await.unwrap());
    let status = retriever.status().await;
    assert!(!status.indexed);
    assert_eq!(status.chunks, 0);

    let injector = ContextInjector::new(retriever, 5);
    assert_eq!(injector.inject(Role::User, "anything here?").await, "");
}

#[tokio::test]
async fn index_aborts_when_backend_down() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", "x = 1\n");

    let store = store();
    let indexer = Indexer::new(
        Arc::clone(&store),
        Arc::new(MockEmbedder::failing()),
        small_config(),
    );

    let err = indexer.index(dir.path()).await.unwrap_err();
    match err {
        IndexError::Aborted {
            file_count,
            chunk_count,
            ..
        } => {
            // The probe fails before any file is touched.
            assert_eq!(file_count, 0);
            assert_eq!(chunk_count, 0);
        }
        other => panic!("expected Aborted, got {other:?}"),
    }
}

#[tokio::test]
async fn status_degrades_when_backend_down() {
    let dir = TempDir::new().unwrap();
    let retriever = Retriever::new(store(), Arc::new(MockEmbedder::failing()), dir.path());

    let status = retriever.status().await;
    assert_eq!(status.files, 0);
    assert_eq!(status.chunks, 0);
    assert!(!status.indexed);
    assert!(!status.embedding_service_reachable);
}

#[tokio::test]
async fn status_reports_counts_after_index() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", &python_lines(8));

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    let report = indexer.index(dir.path()).await.unwrap();

    let retriever = Retriever::new(store, embedder, dir.path());
    let status = retriever.status().await;
    assert!(status.indexed);
    assert!(status.embedding_service_reachable);
    assert_eq!(status.files, 1);
    assert_eq!(status.chunks, report.chunk_count);
}

#[tokio::test]
async fn clear_resets_status() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", "x = 1\n");

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    indexer.index(dir.path()).await.unwrap();
    indexer.clear(dir.path()).await.unwrap();

    let retriever = Retriever::new(store, embedder, dir.path());
    let status = retriever.status().await;
    assert!(!status.indexed);
    assert_eq!(status.chunks, 0);
}

#[tokio::test]
async fn search_before_index_returns_empty() {
    let dir = TempDir::new().unwrap();
    let retriever = Retriever::new(store(), Arc::new(MockEmbedder::new(8)), dir.path());
    let hits = retriever.search("anything", 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn blank_query_short_circuits() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(MockEmbedder::new(8));
    let retriever = Retriever::new(store(), Arc::clone(&embedder), dir.path());

    let hits = retriever.search("   \n", 5).await.unwrap();
    assert!(hits.is_empty());
    // The backend was never called.
    assert!(embedder.batch_sizes().is_empty());
}

#[tokio::test]
async fn search_respects_limit_and_order() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", &python_lines(20));

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    let report = indexer.index(dir.path()).await.unwrap();
    assert!(report.chunk_count > 2);

    let retriever = Retriever::new(store, embedder, dir.path());
    let hits = retriever.search("request handler", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn embedding_batches_respect_batch_size() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", &python_lines(30));
    write_file(dir.path(), "b.py", &python_lines(30));

    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(store(), Arc::clone(&embedder), small_config());
    indexer.index(dir.path()).await.unwrap();

    let sizes = embedder.batch_sizes();
    assert!(!sizes.is_empty());
    for size in sizes {
        assert!(size <= small_config().batch_size);
    }
}

#[tokio::test]
async fn injector_adds_context_for_user_messages() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "config.py", "safe_mode = 'off'\n");
    write_file(dir.path(), "cli.py", "parser.add_argument('--safe')\n");

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    indexer.index(dir.path()).await.unwrap();

    let retriever = Retriever::new(store, embedder, dir.path());
    let injector = ContextInjector::new(retriever, 10);

    let block = injector
        .inject(Role::User, "where is safe_mode defined?")
        .await;
    assert!(block.starts_with("<code_context>"));
    assert!(block.ends_with("</code_context>"));
    assert!(block.contains("config.py"));
    assert!(block.contains("safe_mode = 'off'"));
}

#[tokio::test]
async fn injector_ignores_non_user_messages() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", "x = 1\n");

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    indexer.index(dir.path()).await.unwrap();

    let retriever = Retriever::new(store, embedder, dir.path());
    let injector = ContextInjector::new(retriever, 5);

    assert_eq!(injector.inject(Role::Assistant, "what is x?").await, "");
    assert_eq!(injector.inject(Role::System, "what is x?").await, "");
    assert_eq!(injector.inject(Role::Tool, "what is x?").await, "");
    assert_eq!(injector.inject(Role::User, "   ").await, "");
}

#[tokio::test]
async fn injector_empty_when_not_indexed() {
    let dir = TempDir::new().unwrap();
    let retriever = Retriever::new(store(), Arc::new(MockEmbedder::new(8)), dir.path());
    let injector = ContextInjector::new(retriever, 5);

    assert_eq!(injector.inject(Role::User, "anything at all").await, "");
}

#[tokio::test]
async fn injector_empty_when_backend_down() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", "x = 1\n");

    let store = store();
    let indexer = Indexer::new(
        Arc::clone(&store),
        Arc::new(MockEmbedder::new(8)),
        small_config(),
    );
    indexer.index(dir.path()).await.unwrap();

    // Indexed fine, but the backend is gone at query time.
    let retriever = Retriever::new(store, Arc::new(MockEmbedder::failing()), dir.path());
    let injector = ContextInjector::new(retriever, 5);

    assert_eq!(injector.inject(Role::User, "what is x?").await, "");
}

#[tokio::test]
async fn reindex_file_replaces_its_chunks() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", &python_lines(12));
    write_file(dir.path(), "b.py", "y = 2\n");

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    let report = indexer.index(dir.path()).await.unwrap();

    write_file(dir.path(), "a.py", &python_lines(2));
    let upserted = indexer
        .reindex_file(dir.path(), Path::new("a.py"))
        .await
        .unwrap();
    assert!(upserted >= 1);
    assert!(upserted < report.chunk_count);

    let retriever = Retriever::new(store, embedder, dir.path());
    let status = retriever.status().await;
    assert_eq!(status.files, 2);
    assert!(status.chunks < report.chunk_count);
}

#[tokio::test]
async fn reindex_file_to_empty_removes_entries() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.py", "x = 1\n");
    write_file(dir.path(), "b.py", "y = 2\n");

    let store = store();
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), small_config());
    indexer.index(dir.path()).await.unwrap();

    write_file(dir.path(), "a.py", "\n");
    let upserted = indexer
        .reindex_file(dir.path(), Path::new("a.py"))
        .await
        .unwrap();
    assert_eq!(upserted, 0);

    let retriever = Retriever::new(store, embedder, dir.path());
    let status = retriever.status().await;
    assert_eq!(status.files, 1);
}

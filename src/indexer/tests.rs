use super::*;
use crate::DocsError;
use crate::embeddings::{ChunkingConfig, RecursiveSplitter};
use crate::index::SimilarityIndex;
use crate::test_support::{KeywordEmbedder, StaticFetcher};
use std::fs;
use tempfile::TempDir;

const MAPEO: &str = "https://docs.mapeo.app";
const TERRASTORIES: &str = "https://docs.terrastories.app";
const TOOLKIT: &str = "https://earthdefenderstoolkit.com";
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn manifest(sources: &[&str]) -> SourceManifest {
    SourceManifest::new(sources.iter().map(|s| (*s).to_string()).collect())
}

fn settings(temp_dir: &TempDir, comparison: ManifestComparison) -> CacheSettings {
    CacheSettings {
        passages_path: temp_dir.path().join("app/passages.json"),
        index_path: temp_dir.path().join("app/index.json"),
        freshness_days: 7,
        comparison,
    }
}

fn fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with_page(MAPEO, "Mapeo records tracks and observations.")
        .with_page(TERRASTORIES, "Terrastories works offline.")
        .with_page(TOOLKIT, "The toolkit lists tools for earth defenders.")
}

fn manager_with(
    settings: CacheSettings,
    fetcher: &Arc<StaticFetcher>,
    embedder: &Arc<KeywordEmbedder>,
) -> IndexCacheManager {
    let fetcher: Arc<StaticFetcher> = Arc::clone(fetcher);
    let embedder: Arc<KeywordEmbedder> = Arc::clone(embedder);
    IndexCacheManager::new(
        settings,
        fetcher,
        Arc::new(RecursiveSplitter::new(ChunkingConfig::default())),
        embedder,
    )
}

fn embedder() -> Arc<KeywordEmbedder> {
    Arc::new(KeywordEmbedder::new(&["mapeo", "offline", "toolkit"]))
}

fn backdate(path: &std::path::Path, age: Duration) {
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(SystemTime::now() - age))
        .expect("mtime should be settable");
}

#[tokio::test]
async fn first_run_fetches_and_persists() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());
    let sources = manifest(&[MAPEO, TERRASTORIES]);

    assert_eq!(
        manager.plan(&sources).await.expect("plan should succeed"),
        CacheDecision::Rebuild(RebuildReason::SnapshotMissing)
    );
    // Planning creates placeholders and fetches nothing
    assert!(manager.settings().passages_path.exists());
    assert!(manager.settings().index_path.exists());
    assert_eq!(fetcher.call_count(), 0);

    let index = manager.obtain_index(&sources).await.expect("index should build");

    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(index.len(), 2);

    let store: PassageStore = load_snapshot(&manager.settings().passages_path)
        .loaded()
        .expect("passages persisted");
    assert_eq!(store.manifest, sources);
    assert_eq!(store.passages.len(), 2);

    let artifact: IndexArtifact = load_snapshot(&manager.settings().index_path)
        .loaded()
        .expect("artifact persisted");
    assert_eq!(artifact.passage_count, 2);
    assert_eq!(artifact.dimension, 3);
    assert_eq!(artifact.embedding_model, "keyword-test");
}

#[tokio::test]
async fn fresh_unchanged_snapshot_is_reused_without_fetching() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let embedder = embedder();
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder);
    let sources = manifest(&[MAPEO, TERRASTORIES]);

    manager.obtain_index(&sources).await.expect("first build");
    assert_eq!(manager.plan(&sources).await.expect("plan"), CacheDecision::Reuse);

    let index = manager.obtain_index(&sources).await.expect("reuse");

    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(index.len(), 2);
    // Reuse re-embeds the persisted passages
    assert_eq!(embedder.embedded_texts.load(std::sync::atomic::Ordering::SeqCst), 4);
    let results = index.query("offline", 1).await.expect("search");
    assert_eq!(results[0].passage.source_id, TERRASTORIES);
}

#[tokio::test]
async fn staleness_forces_rebuild() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());
    let sources = manifest(&[MAPEO]);

    manager.obtain_index(&sources).await.expect("first build");

    backdate(&manager.settings().index_path, DAY * 6);
    assert_eq!(manager.plan(&sources).await.expect("plan"), CacheDecision::Reuse);

    backdate(&manager.settings().index_path, DAY * 7);
    assert_eq!(
        manager.plan(&sources).await.expect("plan"),
        CacheDecision::Rebuild(RebuildReason::Stale)
    );

    manager.obtain_index(&sources).await.expect("rebuild");
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(manager.plan(&sources).await.expect("plan"), CacheDecision::Reuse);
}

#[tokio::test]
async fn stale_snapshot_rebuilds_even_with_same_manifest_in_any_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());

    manager
        .obtain_index(&manifest(&[MAPEO, TERRASTORIES]))
        .await
        .expect("first build");
    backdate(&manager.settings().index_path, DAY * 30);

    assert_eq!(
        manager
            .plan(&manifest(&[TERRASTORIES, MAPEO]))
            .await
            .expect("plan"),
        CacheDecision::Rebuild(RebuildReason::Stale)
    );
}

#[tokio::test]
async fn reordering_is_unchanged_when_sorted() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());

    manager
        .obtain_index(&manifest(&[MAPEO, TERRASTORIES]))
        .await
        .expect("first build");

    let reordered = manifest(&[TERRASTORIES, MAPEO]);
    assert_eq!(manager.plan(&reordered).await.expect("plan"), CacheDecision::Reuse);
    manager.obtain_index(&reordered).await.expect("reuse");
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn reordering_is_a_change_when_ordered() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Ordered), &fetcher, &embedder());

    manager
        .obtain_index(&manifest(&[MAPEO, TERRASTORIES]))
        .await
        .expect("first build");

    let reordered = manifest(&[TERRASTORIES, MAPEO]);
    assert_eq!(
        manager.plan(&reordered).await.expect("plan"),
        CacheDecision::Rebuild(RebuildReason::ManifestChanged)
    );

    manager.obtain_index(&reordered).await.expect("rebuild");
    assert_eq!(fetcher.call_count(), 4);

    let store: PassageStore = load_snapshot(&manager.settings().passages_path)
        .loaded()
        .expect("passages persisted");
    assert_eq!(store.manifest, reordered);
}

#[tokio::test]
async fn added_source_is_a_change() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());

    manager.obtain_index(&manifest(&[MAPEO])).await.expect("first build");

    assert_eq!(
        manager
            .plan(&manifest(&[MAPEO, TOOLKIT]))
            .await
            .expect("plan"),
        CacheDecision::Rebuild(RebuildReason::ManifestChanged)
    );
}

#[tokio::test]
async fn failed_fetch_leaves_snapshots_untouched() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let sources = manifest(&[MAPEO, TERRASTORIES, TOOLKIT]);

    let healthy = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &healthy, &embedder());
    manager.obtain_index(&sources).await.expect("first build");

    let passages_before = fs::read(&manager.settings().passages_path).expect("readable");
    let index_before = fs::read(&manager.settings().index_path).expect("readable");

    let broken = Arc::new(fetcher().with_failure(TERRASTORIES));
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &broken, &embedder());
    let error = manager
        .rebuild(&sources)
        .await
        .expect_err("second source fails");

    assert!(matches!(
        error,
        DocsError::SourceFetch { ref source_id, .. } if source_id == TERRASTORIES
    ));
    assert_eq!(
        *broken.fetched.lock().expect("fetch log"),
        vec![MAPEO.to_string(), TERRASTORIES.to_string()]
    );
    assert_eq!(
        fs::read(&manager.settings().passages_path).expect("readable"),
        passages_before
    );
    assert_eq!(
        fs::read(&manager.settings().index_path).expect("readable"),
        index_before
    );
}

#[tokio::test]
async fn failed_embedding_persists_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let failing = Arc::new(KeywordEmbedder::failing(&["mapeo"]));
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &failing);

    let error = manager
        .obtain_index(&manifest(&[MAPEO]))
        .await
        .expect_err("embedding fails");

    assert!(matches!(error, DocsError::Embedding(_)));
    assert_eq!(
        load_snapshot::<PassageStore>(&manager.settings().passages_path),
        SnapshotState::Empty
    );
    assert_eq!(
        load_snapshot::<IndexArtifact>(&manager.settings().index_path),
        SnapshotState::Empty
    );
}

#[tokio::test]
async fn malformed_snapshot_triggers_rebuild() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());
    let sources = manifest(&[MAPEO]);

    manager.obtain_index(&sources).await.expect("first build");
    fs::write(&manager.settings().passages_path, "{ not json").expect("write");

    assert_eq!(
        manager.plan(&sources).await.expect("plan"),
        CacheDecision::Rebuild(RebuildReason::SnapshotMissing)
    );
    manager.obtain_index(&sources).await.expect("rebuild recovers");
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn empty_index_artifact_is_not_fresh() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());
    let sources = manifest(&[MAPEO]);

    manager.obtain_index(&sources).await.expect("first build");
    // A fresh mtime alone is not enough without content
    fs::write(&manager.settings().index_path, "").expect("truncate");

    assert_eq!(
        manager.plan(&sources).await.expect("plan"),
        CacheDecision::Rebuild(RebuildReason::SnapshotMissing)
    );
}

#[tokio::test]
async fn status_reports_snapshot_details() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());
    let sources = manifest(&[MAPEO, TOOLKIT]);

    let empty = manager.status(&sources).await.expect("status");
    assert!(empty.artifact.is_none());
    assert!(empty.age.is_none());
    assert_eq!(empty.passage_count, None);

    manager.obtain_index(&sources).await.expect("build");
    backdate(&manager.settings().index_path, DAY * 2);

    let status = manager.status(&sources).await.expect("status");
    assert_eq!(status.decision, CacheDecision::Reuse);
    assert_eq!(status.passage_count, Some(2));
    assert!(status.age.expect("age known") >= DAY * 2);
    assert_eq!(status.artifact.expect("artifact").passage_count, 2);
}

#[tokio::test]
async fn shared_index_builds_once_and_refresh_swaps() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let fetcher = Arc::new(fetcher());
    let manager = manager_with(settings(&temp_dir, ManifestComparison::Sorted), &fetcher, &embedder());
    let shared = Arc::new(SharedIndex::new(manager, manifest(&[MAPEO, TERRASTORIES])));

    let (first, second) = tokio::join!(shared.get(), shared.get());
    let first = first.expect("index");
    let second = second.expect("index");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fetcher.call_count(), 2);

    let refreshed = shared.refresh().await.expect("refresh");
    assert_eq!(fetcher.call_count(), 4);
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert!(Arc::ptr_eq(&refreshed, &shared.get().await.expect("index")));
}

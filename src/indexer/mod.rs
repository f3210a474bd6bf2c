// Indexer module
// Decides whether the persisted passages can be reused and rebuilds the index when not

#[cfg(test)]
mod tests;

use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::Config;
use crate::crawler::SourceFetcher;
use crate::embeddings::{Embedder, TextSplitter, estimate_token_count};
use crate::index::MemoryIndex;
use crate::manifest::{ManifestComparison, SourceManifest};
use crate::snapshot::{
    IndexArtifact, PassageStore, SnapshotState, ensure_placeholder, is_fresh, load_snapshot,
    modified_at, snapshot_age, write_snapshot,
};

/// Why the persisted index cannot be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// No usable passage snapshot or index artifact
    SnapshotMissing,
    /// The index artifact is older than the freshness window
    Stale,
    /// The requested sources differ from the persisted ones
    ManifestChanged,
}

impl fmt::Display for RebuildReason {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SnapshotMissing => write!(f, "no usable snapshot"),
            Self::Stale => write!(f, "snapshot is stale"),
            Self::ManifestChanged => write!(f, "source manifest changed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    Reuse,
    Rebuild(RebuildReason),
}

impl fmt::Display for CacheDecision {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reuse => write!(f, "reuse persisted passages"),
            Self::Rebuild(reason) => write!(f, "rebuild ({})", reason),
        }
    }
}

/// Read-only view of the cache for reporting
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub decision: CacheDecision,
    /// Age of the index artifact, if one exists
    pub age: Option<Duration>,
    pub artifact: Option<IndexArtifact>,
    /// Passages in the persisted store, if it loaded
    pub passage_count: Option<usize>,
}

/// Where snapshots live and how they are judged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub passages_path: PathBuf,
    pub index_path: PathBuf,
    pub freshness_days: u32,
    pub comparison: ManifestComparison,
}

impl CacheSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            passages_path: config.passages_snapshot_path(),
            index_path: config.index_snapshot_path(),
            freshness_days: config.cache.freshness_days,
            comparison: config.manifest_comparison(),
        }
    }
}

/// Produces a similarity index that is either fresh or explicitly rebuilt
pub struct IndexCacheManager {
    settings: CacheSettings,
    fetcher: Arc<dyn SourceFetcher>,
    splitter: Arc<dyn TextSplitter>,
    embedder: Arc<dyn Embedder>,
    build_lock: Mutex<()>,
}

impl fmt::Debug for IndexCacheManager {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexCacheManager")
            .field("settings", &self.settings)
            .field("embedding_model", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl IndexCacheManager {
    #[inline]
    pub fn new(
        settings: CacheSettings,
        fetcher: Arc<dyn SourceFetcher>,
        splitter: Arc<dyn TextSplitter>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            splitter,
            embedder,
            build_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Decide between reuse and rebuild without fetching anything
    ///
    /// Creates empty placeholders for missing snapshot files.
    #[inline]
    pub async fn plan(&self, manifest: &SourceManifest) -> Result<CacheDecision> {
        let _guard = self.build_lock.lock().await;
        let (decision, _) = self.inspect(manifest)?;
        Ok(decision)
    }

    /// Current decision plus snapshot details
    #[inline]
    pub async fn status(&self, manifest: &SourceManifest) -> Result<CacheStatus> {
        let _guard = self.build_lock.lock().await;
        let (decision, previous) = self.inspect(manifest)?;

        let artifact = load_snapshot::<IndexArtifact>(&self.settings.index_path).loaded();
        let age = artifact
            .as_ref()
            .and_then(|_| modified_at(&self.settings.index_path))
            .map(|modified| snapshot_age(modified, SystemTime::now()));

        Ok(CacheStatus {
            decision,
            age,
            artifact,
            passage_count: previous.map(|store| store.passages.len()),
        })
    }

    /// Reuse the persisted passages when fresh and unchanged, otherwise rebuild
    #[inline]
    pub async fn obtain_index(&self, manifest: &SourceManifest) -> Result<MemoryIndex> {
        let _guard = self.build_lock.lock().await;
        let (decision, previous) = self.inspect(manifest)?;

        match (decision, previous) {
            (CacheDecision::Reuse, Some(store)) => {
                info!(
                    "Reusing {} persisted passages for {} sources",
                    store.passages.len(),
                    store.manifest.len()
                );
                MemoryIndex::build(store.passages, Arc::clone(&self.embedder)).await
            }
            (decision, _) => {
                info!("Rebuilding index: {}", decision);
                self.rebuild_locked(manifest).await
            }
        }
    }

    /// Fetch every source again regardless of freshness
    #[inline]
    pub async fn rebuild(&self, manifest: &SourceManifest) -> Result<MemoryIndex> {
        let _guard = self.build_lock.lock().await;
        self.ensure_placeholders()?;
        info!("Forced rebuild of index for {} sources", manifest.len());
        self.rebuild_locked(manifest).await
    }

    fn ensure_placeholders(&self) -> Result<()> {
        ensure_placeholder(&self.settings.passages_path)?;
        ensure_placeholder(&self.settings.index_path)?;
        Ok(())
    }

    /// Caller must hold `build_lock`
    fn inspect(&self, manifest: &SourceManifest) -> Result<(CacheDecision, Option<PassageStore>)> {
        self.ensure_placeholders()?;

        let previous = match load_snapshot::<PassageStore>(&self.settings.passages_path) {
            SnapshotState::Loaded(store) => Some(store),
            SnapshotState::Missing | SnapshotState::Empty => {
                debug!(
                    "No passage snapshot at {}",
                    self.settings.passages_path.display()
                );
                None
            }
            SnapshotState::Malformed(reason) => {
                warn!(
                    "Ignoring malformed passage snapshot {}: {}",
                    self.settings.passages_path.display(),
                    reason
                );
                None
            }
        };

        let artifact_state = load_snapshot::<IndexArtifact>(&self.settings.index_path);
        if let SnapshotState::Malformed(reason) = &artifact_state {
            warn!(
                "Ignoring malformed index artifact {}: {}",
                self.settings.index_path.display(),
                reason
            );
        }

        let decision = if previous.is_none() || !artifact_state.is_loaded() {
            CacheDecision::Rebuild(RebuildReason::SnapshotMissing)
        } else if !self.is_artifact_fresh() {
            CacheDecision::Rebuild(RebuildReason::Stale)
        } else if manifest.differs_from(
            previous.as_ref().map(|store| &store.manifest),
            self.settings.comparison,
        ) {
            CacheDecision::Rebuild(RebuildReason::ManifestChanged)
        } else {
            CacheDecision::Reuse
        };

        debug!("Cache decision for {}: {}", manifest, decision);
        Ok((decision, previous))
    }

    fn is_artifact_fresh(&self) -> bool {
        modified_at(&self.settings.index_path).is_some_and(|modified| {
            is_fresh(modified, SystemTime::now(), self.settings.freshness_days)
        })
    }

    /// Fetch, split, embed, then persist; nothing is written unless every step succeeds
    async fn rebuild_locked(&self, manifest: &SourceManifest) -> Result<MemoryIndex> {
        let mut documents = Vec::new();
        for source_id in manifest {
            let fetched = self.fetcher.fetch_source(source_id).await?;
            info!("Fetched {} documents from {}", fetched.len(), source_id);
            documents.extend(fetched);
        }

        let passages = self.splitter.split(&documents)?;
        if passages.is_empty() {
            warn!("Sources produced no passages; the index will be empty");
        }

        let index = MemoryIndex::build(passages, Arc::clone(&self.embedder)).await?;

        let estimated_tokens = passages_tokens(&index);
        let store = PassageStore {
            manifest: manifest.clone(),
            passages: index.passages().cloned().collect(),
        };
        write_snapshot(&self.settings.passages_path, &store)?;

        let artifact = IndexArtifact {
            built_at: Utc::now(),
            embedding_model: index.model_name().to_string(),
            dimension: index.dimension(),
            passage_count: index.len(),
            manifest: manifest.clone(),
        };
        write_snapshot(&self.settings.index_path, &artifact)?;

        info!(
            "Persisted {} passages (~{} tokens) from {} documents",
            artifact.passage_count,
            estimated_tokens,
            documents.len()
        );
        Ok(index)
    }
}

fn passages_tokens(index: &MemoryIndex) -> usize {
    index
        .passages()
        .map(|passage| estimate_token_count(&passage.text))
        .sum()
}

/// Lazily obtained index shared by every request
#[derive(Debug)]
pub struct SharedIndex {
    manager: IndexCacheManager,
    manifest: SourceManifest,
    current: RwLock<Option<Arc<MemoryIndex>>>,
}

impl SharedIndex {
    #[inline]
    pub fn new(manager: IndexCacheManager, manifest: SourceManifest) -> Self {
        Self {
            manager,
            manifest,
            current: RwLock::new(None),
        }
    }

    #[inline]
    pub fn manager(&self) -> &IndexCacheManager {
        &self.manager
    }

    #[inline]
    pub fn manifest(&self) -> &SourceManifest {
        &self.manifest
    }

    /// The current index, obtaining it on first use
    #[inline]
    pub async fn get(&self) -> Result<Arc<MemoryIndex>> {
        {
            let current = self.current.read().await;
            if let Some(index) = current.as_ref() {
                return Ok(Arc::clone(index));
            }
        }

        let mut current = self.current.write().await;
        // Another caller may have finished while we waited for the write lock
        if let Some(index) = current.as_ref() {
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(self.manager.obtain_index(&self.manifest).await?);
        *current = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Force a rebuild and swap in the new index
    #[inline]
    pub async fn refresh(&self) -> Result<Arc<MemoryIndex>> {
        let index = Arc::new(self.manager.rebuild(&self.manifest).await?);
        *self.current.write().await = Some(Arc::clone(&index));
        Ok(index)
    }
}

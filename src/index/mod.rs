// Similarity index
// Brute-force cosine search over embedded passages, rebuilt from the passage store


use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embeddings::{Embedder, Passage};
use crate::{DocsError, Result};

/// A passage with its similarity to a query; higher is closer
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Vector search over passages
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Embed a query with the same model the index was built with
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Top `k` passages for a query vector, highest score first
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>>;

    #[inline]
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        let vector = self.embed_query(text).await?;
        self.search(&vector, k).await
    }
}

struct IndexEntry {
    passage: Passage,
    vector: Vec<f32>,
}

/// In-memory index holding one vector per passage
pub struct MemoryIndex {
    entries: Vec<IndexEntry>,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
}

impl std::fmt::Debug for MemoryIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("passages", &self.entries.len())
            .field("dimension", &self.dimension)
            .field("model", &self.embedder.model_name())
            .finish()
    }
}

impl MemoryIndex {
    /// Embed every passage and build the index
    ///
    /// Fails without side effects if the embedder fails or returns inconsistent vectors.
    #[inline]
    pub async fn build(passages: Vec<Passage>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != passages.len() {
            return Err(DocsError::Embedding(format!(
                "Expected {} embeddings, got {}",
                passages.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if let Some(position) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(DocsError::Embedding(format!(
                "Embedding {} has dimension {}, expected {}",
                position,
                vectors[position].len(),
                dimension
            )));
        }

        let entries: Vec<IndexEntry> = passages
            .into_iter()
            .zip(vectors)
            .map(|(passage, vector)| IndexEntry { passage, vector })
            .collect();

        info!(
            "Built similarity index with {} passages (dimension {}, model {})",
            entries.len(),
            dimension,
            embedder.model_name()
        );

        Ok(Self {
            entries,
            embedder,
            dimension,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector length; zero for an empty index
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Indexed passages in store order
    #[inline]
    pub fn passages(&self) -> impl Iterator<Item = &Passage> {
        self.entries.iter().map(|entry| &entry.passage)
    }
}

#[async_trait]
impl SimilarityIndex for MemoryIndex {
    #[inline]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    #[inline]
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        if !self.entries.is_empty() && query.len() != self.dimension {
            return Err(DocsError::Embedding(format!(
                "Query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<ScoredPassage> = self
            .entries
            .iter()
            .map(|entry| ScoredPassage {
                passage: entry.passage.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        // Ties keep store order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);

        debug!(
            "Similarity search k={} returned {} passages (best score {:?})",
            k,
            scored.len(),
            scored.first().map(|s| s.score)
        );

        Ok(scored)
    }
}

/// Cosine similarity in [-1, 1]
///
/// Zero for mismatched or zero-length vectors. Vectors with non-finite
/// components rank as least similar (-1).
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    // Accumulate in f64 so large components cannot overflow the norms
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if !(dot.is_finite() && norm_a.is_finite() && norm_b.is_finite()) {
        return -1.0;
    }
    if norm_a < f64::from(f32::EPSILON) || norm_b < f64::from(f32::EPSILON) {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}


use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::index::{ScoredPassage, SimilarityIndex};

/// Score threshold and search window for passage retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages scoring below this are discarded
    pub min_score: f32,
    pub initial_k: usize,
    pub k_increment: usize,
    pub max_k: usize,
    /// Qualifying passages that stop the widening early
    pub min_passages: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_score: 0.7,
            initial_k: 4,
            k_increment: 2,
            max_k: 20,
            min_passages: 3,
        }
    }
}

/// Widens the search window until enough passages clear the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRetriever {
    config: RetrievalConfig,
}

impl ThresholdRetriever {
    #[inline]
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Qualifying passages from the last search, highest score first; may be empty
    #[inline]
    pub async fn retrieve(
        &self,
        index: &dyn SimilarityIndex,
        question: &str,
    ) -> Result<Vec<ScoredPassage>> {
        let config = &self.config;
        let query = index.embed_query(question).await?;

        let mut k = config.initial_k.min(config.max_k).max(1);
        loop {
            let qualifying: Vec<ScoredPassage> = index
                .search(&query, k)
                .await?
                .into_iter()
                .filter(|scored| scored.score >= config.min_score)
                .collect();

            debug!("k={} yielded {} qualifying passages", k, qualifying.len());

            let next_k = k.saturating_add(config.k_increment);
            if qualifying.len() >= config.min_passages
                || config.k_increment == 0
                || next_k > config.max_k
            {
                info!(
                    "Retrieved {} passages (k={}, min_score={})",
                    qualifying.len(),
                    k,
                    config.min_score
                );
                return Ok(qualifying);
            }
            k = next_k;
        }
    }
}

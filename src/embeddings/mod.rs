// Embeddings module
// Passage splitting and the embedding collaborator used to build and query the index

pub mod chunking;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{
    ChunkingConfig, Passage, RecursiveSplitter, TextSplitter, estimate_token_count, split_text,
};

/// Turns text into fixed-length vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, recorded in the index snapshot
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, preserving input order
    #[inline]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

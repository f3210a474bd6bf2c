
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::Result;
use crate::crawler::SourceDocument;

/// Separators tried in order; the empty separator splits between characters
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A bounded chunk of source text used as a retrieval unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// The manifest entry this passage was fetched from
    pub source_id: String,
    /// The page the passage was extracted from
    pub url: String,
    /// Title of that page
    pub title: String,
    /// Sequence position within the passage store
    pub position: usize,
    /// The passage text, at most `chunk_size` characters
    pub text: String,
}

/// Configuration for passage splitting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum passage length in characters
    pub chunk_size: usize,
    /// Approximate number of trailing characters repeated at the start of the next passage
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
        }
    }
}

/// Splits fetched documents into passages
pub trait TextSplitter: Send + Sync {
    fn split(&self, documents: &[SourceDocument]) -> Result<Vec<Passage>>;
}

/// Recursive character splitter: paragraphs first, then lines, words and characters
#[derive(Debug, Clone, Default)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
}

impl RecursiveSplitter {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }
}

impl TextSplitter for RecursiveSplitter {
    #[inline]
    fn split(&self, documents: &[SourceDocument]) -> Result<Vec<Passage>> {
        let mut passages = Vec::new();

        for document in documents {
            for text in split_text(&document.text, &self.config) {
                passages.push(Passage {
                    source_id: document.source_id.clone(),
                    url: document.url.clone(),
                    title: document.title.clone(),
                    position: passages.len(),
                    text,
                });
            }
        }

        debug!(
            "Split {} documents into {} passages (avg {} chars)",
            documents.len(),
            passages.len(),
            passages.iter().map(|p| char_len(&p.text)).sum::<usize>() / passages.len().max(1)
        );

        Ok(passages)
    }
}

/// Split text into trimmed, non-empty pieces of at most `chunk_size` characters
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn split_recursive(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    // Use the first separator that actually occurs; the empty one always does
    let (separator, remaining) = match separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
    {
        Some(i) => (separators[i], &separators[i + 1..]),
        None => ("", &[][..]),
    };

    let pieces: Vec<&str> = if separator.is_empty() {
        text.split_inclusive(|_: char| true).collect()
    } else {
        text.split(separator).filter(|p| !p.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, separator, config));
            fitting.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, remaining, config));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, separator, config));
    }

    chunks
}

/// Greedily join pieces up to `chunk_size`, carrying a tail of at most `chunk_overlap`
fn merge_pieces(pieces: &[&str], separator: &str, config: &ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let piece_len = char_len(piece);
        let joiner_len = if window.is_empty() { 0 } else { separator_len };

        if total + joiner_len + piece_len > config.chunk_size && !window.is_empty() {
            merged.push(join_window(&window, separator));

            while !window.is_empty()
                && (total > config.chunk_overlap
                    || total + separator_len + piece_len > config.chunk_size)
            {
                if let Some(removed) = window.pop_front() {
                    total -= char_len(removed);
                    if !window.is_empty() {
                        total -= separator_len;
                    }
                }
            }
        }

        if !window.is_empty() {
            total += separator_len;
        }
        total += piece_len;
        window.push_back(piece);
    }

    if !window.is_empty() {
        merged.push(join_window(&window, separator));
    }

    merged
}

fn join_window(window: &VecDeque<&str>, separator: &str) -> String {
    window.iter().copied().collect::<Vec<_>>().join(separator)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}

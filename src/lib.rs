use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocsError>;

#[derive(Error, Debug)]
pub enum DocsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch source {source_id}: {message}")]
    SourceFetch { source_id: String, message: String },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Language model error: {0}")]
    Model(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod crawler;
pub mod embeddings;
pub mod history;
pub mod index;
pub mod indexer;
pub mod llm;
pub mod manifest;
pub mod ollama;
pub mod rag;
pub mod snapshot;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::crawler::CrawlerConfig;
use crate::embeddings::chunking::ChunkingConfig;
use crate::history::HistoryBackend;
use crate::manifest::{ManifestComparison, SourceManifest};
use crate::rag::answer::EmptyContextPolicy;
use crate::rag::retriever::RetrievalConfig;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "DOCS_ASSISTANT_DIR";

const PASSAGES_SNAPSHOT_FILE: &str = "passages.json";
const INDEX_SNAPSHOT_FILE: &str = "index.json";
const HISTORY_DATABASE_FILE: &str = "history.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Documentation sources to answer from, in crawl order
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            chat_model: "llama3.1:8b".to_string(),
            temperature: 0.0,
            batch_size: 16,
            timeout_seconds: 120,
            retry_attempts: 3,
        }
    }
}

/// Where and for how long fetched passages are cached
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Application scope; snapshots live under `<config dir>/<app_name>/`
    pub app_name: String,
    /// Maximum age of the persisted index before sources are fetched again
    pub freshness_days: u32,
    pub manifest_comparison: ManifestComparison,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            app_name: "docs-assistant".to_string(),
            freshness_days: 7,
            manifest_comparison: ManifestComparison::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssistantConfig {
    /// Who the assistant is; placed at the top of every answer prompt
    pub persona: String,
    pub empty_context_policy: EmptyContextPolicy,
    /// Reply used when no passage clears the score threshold
    pub fallback_answer: String,
    pub history_backend: HistoryBackend,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            persona: "You are an AI product support agent. You answer questions about the \
                      products described in the documentation you are given. Be respectful, \
                      helpful and patient with users of any technical level."
                .to_string(),
            empty_context_policy: EmptyContextPolicy::default(),
            fallback_answer: "I'm sorry, I couldn't find anything in the documentation about \
                              that. Could you rephrase the question, or ask about something else?"
                .to_string(),
            history_backend: HistoryBackend::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid chunk size: {0} (must be between 100 and 8000 characters)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid minimum score: {0} (must be between -1.0 and 1.0)")]
    InvalidMinScore(f32),
    #[error("Invalid retrieval window: initial_k={0}, k_increment={1}, max_k={2}")]
    InvalidRetrievalWindow(usize, usize, usize),
    #[error("Invalid minimum passage count: {0} (must be at least 1)")]
    InvalidMinPassages(usize),
    #[error("Invalid application name: {0:?} (must be a non-empty single path segment)")]
    InvalidAppName(String),
    #[error("Invalid page limit: {0} (must be between 1 and 10000)")]
    InvalidPageLimit(usize),
    #[error("Invalid source {0}: {1}")]
    InvalidSource(String, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            crawler: CrawlerConfig::default(),
            assistant: AssistantConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// Resolve the configuration directory, honouring `DOCS_ASSISTANT_DIR`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        dirs::config_dir()
            .map(|dir| dir.join("docs-assistant"))
            .or_else(|| dirs::home_dir().map(|home| home.join(".docs-assistant")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.validate_chunking()?;
        self.validate_retrieval()?;
        self.validate_cache()?;
        self.validate_crawler()?;
        self.validate_sources()?;
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;

        if !(100..=8000).contains(&chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(chunking.chunk_size));
        }

        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                chunking.chunk_overlap,
                chunking.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;

        if !(-1.0..=1.0).contains(&retrieval.min_score) {
            return Err(ConfigError::InvalidMinScore(retrieval.min_score));
        }

        if retrieval.initial_k == 0
            || retrieval.k_increment == 0
            || retrieval.max_k == 0
            || retrieval.max_k > 1000
        {
            return Err(ConfigError::InvalidRetrievalWindow(
                retrieval.initial_k,
                retrieval.k_increment,
                retrieval.max_k,
            ));
        }

        if retrieval.min_passages == 0 {
            return Err(ConfigError::InvalidMinPassages(retrieval.min_passages));
        }

        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        let name = &self.cache.app_name;
        if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::InvalidAppName(name.clone()));
        }
        Ok(())
    }

    fn validate_crawler(&self) -> Result<(), ConfigError> {
        let crawler = &self.crawler;

        if !(1..=600).contains(&crawler.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(crawler.timeout_seconds));
        }

        if !(1..=10_000).contains(&crawler.max_pages_per_source) {
            return Err(ConfigError::InvalidPageLimit(crawler.max_pages_per_source));
        }

        Ok(())
    }

    fn validate_sources(&self) -> Result<(), ConfigError> {
        for source in &self.sources {
            let url = Url::parse(source)
                .map_err(|e| ConfigError::InvalidSource(source.clone(), e.to_string()))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidSource(
                    source.clone(),
                    "must use HTTP or HTTPS".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The configured sources as a manifest
    #[inline]
    pub fn manifest(&self) -> SourceManifest {
        SourceManifest::new(self.sources.clone())
    }

    #[inline]
    pub fn manifest_comparison(&self) -> ManifestComparison {
        self.cache.manifest_comparison
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the snapshots of the configured application scope
    #[inline]
    pub fn cache_dir_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.cache.app_name)
    }

    #[inline]
    pub fn passages_snapshot_path(&self) -> PathBuf {
        self.cache_dir_path().join(PASSAGES_SNAPSHOT_FILE)
    }

    #[inline]
    pub fn index_snapshot_path(&self) -> PathBuf {
        self.cache_dir_path().join(INDEX_SNAPSHOT_FILE)
    }

    /// Get the path for the SQLite conversation history
    #[inline]
    pub fn history_database_path(&self) -> PathBuf {
        self.cache_dir_path().join(HISTORY_DATABASE_FILE)
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

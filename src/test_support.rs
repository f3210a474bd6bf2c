// Deterministic collaborators shared by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::crawler::{SourceDocument, SourceFetcher};
use crate::embeddings::{Embedder, Passage};
use crate::llm::LanguageModel;
use crate::{DocsError, Result};

/// Embeds text as keyword occurrence counts, one dimension per keyword
#[derive(Debug)]
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    pub embed_calls: AtomicUsize,
    pub embedded_texts: AtomicUsize,
    pub fail: bool,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            embed_calls: AtomicUsize::new(0),
            embedded_texts: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing(keywords: &[&str]) -> Self {
        Self {
            fail: true,
            ..Self::new(keywords)
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| lower.matches(k.as_str()).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embedded_texts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DocsError::Embedding("embedding backend down".to_string()));
        }
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embedded_texts.fetch_add(texts.len(), Ordering::SeqCst);
        if self.fail {
            return Err(DocsError::Embedding("embedding backend down".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Language model that replays fixed replies and records every prompt
#[derive(Debug, Default)]
pub struct ScriptedModel {
    pub condensed: String,
    pub answer: String,
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(condensed: &str, answer: &str) -> Self {
        Self {
            condensed: condensed.to_string(),
            answer: answer.to_string(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }

    pub fn condense_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| is_condense_prompt(p))
            .collect()
    }

    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| !is_condense_prompt(p))
            .collect()
    }
}

pub fn is_condense_prompt(prompt: &str) -> bool {
    prompt.starts_with("Given the following conversation")
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        if self.fail {
            return Err(DocsError::Model("model unavailable".to_string()));
        }
        if is_condense_prompt(prompt) {
            Ok(format!("  {}\n", self.condensed))
        } else {
            Ok(self.answer.clone())
        }
    }
}

/// Serves canned documents per source and counts fetches
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Vec<SourceDocument>>,
    failing: Vec<String>,
    pub calls: AtomicUsize,
    pub fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, source_id: &str, text: &str) -> Self {
        self.pages
            .entry(source_id.to_string())
            .or_default()
            .push(SourceDocument {
                source_id: source_id.to_string(),
                url: format!("{}/page", source_id.trim_end_matches('/')),
                title: format!("Docs for {source_id}"),
                text: text.to_string(),
            });
        self
    }

    pub fn with_failure(mut self, source_id: &str) -> Self {
        self.failing.push(source_id.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch_source(&self, source_id: &str) -> Result<Vec<SourceDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fetched
            .lock()
            .expect("fetch log poisoned")
            .push(source_id.to_string());

        if self.failing.iter().any(|s| s == source_id) {
            return Err(DocsError::SourceFetch {
                source_id: source_id.to_string(),
                message: "HTTP error 503".to_string(),
            });
        }

        Ok(self.pages.get(source_id).cloned().unwrap_or_default())
    }
}

pub fn passage(position: usize, url: &str, text: &str) -> Passage {
    Passage {
        source_id: "https://docs.mapeo.app".to_string(),
        url: url.to_string(),
        title: "Test Page".to_string(),
        position,
        text: text.to_string(),
    }
}

/// Route `RUST_LOG`-filtered tracing output to the test harness
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

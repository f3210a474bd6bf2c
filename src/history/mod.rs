// Conversation history
// Per-requester question/answer exchanges, in memory or in SQLite


pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::Result;

pub use sqlite::SqliteHistoryStore;

/// One completed question and the answer that was sent back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    #[inline]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Exchanges for one requester, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    exchanges: Vec<Exchange>,
}

impl ConversationHistory {
    #[inline]
    pub fn new(exchanges: Vec<Exchange>) -> Self {
        Self { exchanges }
    }

    #[inline]
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    #[inline]
    pub fn push(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }
}

/// Where conversation history is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBackend {
    /// Lost when the process exits
    #[default]
    Memory,
    /// Persisted to `history.db` in the config directory
    Sqlite,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// History for `requester`; empty if the requester is unknown
    async fn load(&self, requester: &str) -> Result<ConversationHistory>;

    async fn append(&self, requester: &str, exchange: Exchange) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    conversations: RwLock<HashMap<String, ConversationHistory>>,
}

impl InMemoryHistoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    #[inline]
    async fn load(&self, requester: &str) -> Result<ConversationHistory> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(requester).cloned().unwrap_or_default())
    }

    #[inline]
    async fn append(&self, requester: &str, exchange: Exchange) -> Result<()> {
        self.conversations
            .write()
            .await
            .entry(requester.to_string())
            .or_default()
            .push(exchange);
        Ok(())
    }
}

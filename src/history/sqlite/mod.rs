use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use super::{ConversationHistory, Exchange, HistoryStore};
use crate::{DocsError, Result};


pub type DbPool = Pool<Sqlite>;

/// History persisted in a local SQLite database
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: DbPool,
}

impl SqliteHistoryStore {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let database_path = database_path.as_ref();
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to open history database {}",
                    database_path.display()
                )
            })
            .map_err(database_error)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running history database migrations");

        sqlx::migrate!("src/history/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run history schema migration")
            .map_err(database_error)?;

        debug!("History database migrations completed");
        Ok(())
    }
}

fn database_error(error: anyhow::Error) -> DocsError {
    DocsError::Database(format!("{:#}", error))
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    #[inline]
    async fn load(&self, requester: &str) -> Result<ConversationHistory> {
        let rows = sqlx::query(
            "SELECT question, answer FROM conversation_history WHERE requester_id = ? ORDER BY id",
        )
        .bind(requester)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load conversation history")
        .map_err(database_error)?;

        let exchanges = rows
            .iter()
            .map(|row| Exchange {
                question: row.get("question"),
                answer: row.get("answer"),
            })
            .collect();

        Ok(ConversationHistory::new(exchanges))
    }

    #[inline]
    async fn append(&self, requester: &str, exchange: Exchange) -> Result<()> {
        sqlx::query(
            "INSERT INTO conversation_history (requester_id, question, answer, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(requester)
        .bind(&exchange.question)
        .bind(&exchange.answer)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to append conversation history")
        .map_err(database_error)?;

        debug!("Stored exchange for requester {}", requester);
        Ok(())
    }
}

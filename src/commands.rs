use anyhow::{Context, Result, bail};
use console::style;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, get_config_dir, show_config};
use crate::crawler::SiteCrawler;
use crate::embeddings::RecursiveSplitter;
use crate::history::{HistoryBackend, HistoryStore, InMemoryHistoryStore, SqliteHistoryStore};
use crate::indexer::{CacheDecision, CacheSettings, IndexCacheManager, SharedIndex};
use crate::ollama::OllamaClient;
use crate::rag::Assistant;
use crate::transport::ConsoleTransport;

/// Load the configuration from the resolved config directory
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = get_config_dir(config_dir)?;
    Config::load(&dir)
}

fn require_sources(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        bail!(
            "No documentation sources configured; add `sources = [\"https://...\"]` to {}",
            config.config_file_path().display()
        );
    }
    Ok(())
}

/// Index cache manager wired to the crawler, splitter and Ollama embeddings
#[inline]
pub fn build_cache_manager(config: &Config, client: &OllamaClient) -> IndexCacheManager {
    IndexCacheManager::new(
        CacheSettings::from_config(config),
        Arc::new(SiteCrawler::new(config.crawler.clone())),
        Arc::new(RecursiveSplitter::new(config.chunking.clone())),
        Arc::new(client.clone()),
    )
}

async fn open_history(config: &Config) -> Result<Arc<dyn HistoryStore>> {
    match config.assistant.history_backend {
        HistoryBackend::Memory => Ok(Arc::new(InMemoryHistoryStore::new())),
        HistoryBackend::Sqlite => {
            let store = SqliteHistoryStore::new(config.history_database_path())
                .await
                .context("Failed to open conversation history")?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the full question answering pipeline from configuration
#[inline]
pub async fn build_assistant(config: &Config) -> Result<Assistant> {
    require_sources(config)?;

    let client = OllamaClient::new(&config.ollama)?;
    let index = Arc::new(SharedIndex::new(
        build_cache_manager(config, &client),
        config.manifest(),
    ));
    let history = open_history(config).await?;

    Ok(Assistant::from_config(
        config,
        index,
        history,
        Arc::new(client),
    ))
}

/// Answer a single question and print the reply
#[inline]
pub async fn ask(config_dir: Option<&Path>, question: &str, requester: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let assistant = build_assistant(&config).await?;

    info!("Answering one question for {}", requester);
    let answer = assistant.handle_question(requester, question).await;
    println!("{}", answer);
    Ok(())
}

/// Interactive conversation over stdin and stdout
#[inline]
pub async fn chat(config_dir: Option<&Path>, requester: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let assistant = build_assistant(&config).await?;

    eprintln!(
        "{} Ask about {} (Ctrl-D to quit)",
        style("docs-assistant").bold().cyan(),
        config.sources.join(", ")
    );

    // Warm the index so the first question is not slowed by a rebuild
    if let Err(e) = assistant.shared_index().get().await {
        warn!("Index is not available yet: {}", e);
    }

    let mut transport = ConsoleTransport::stdio(requester);
    let handled = assistant.serve(&mut transport).await?;
    eprintln!("{} {} questions answered", style("Bye!").green(), handled);
    Ok(())
}

/// Fetch every source again and replace the persisted snapshots
#[inline]
pub async fn refresh(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir)?;
    require_sources(&config)?;

    let client = OllamaClient::new(&config.ollama)?;
    let manager = build_cache_manager(&config, &client);
    let manifest = config.manifest();

    let index = manager
        .rebuild(&manifest)
        .await
        .context("Index rebuild failed")?;

    println!(
        "{} Indexed {} passages from {} sources",
        style("✓").green().bold(),
        index.len(),
        manifest.len()
    );
    println!("  Snapshot: {}", config.passages_snapshot_path().display());
    Ok(())
}

/// Report what the next question would do with the cache, and model health
#[inline]
pub async fn status(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir)?;

    println!("{}", style("Docs Assistant Status").bold().cyan());
    println!("{}", "=".repeat(40));

    println!("{}", style("Sources:").bold().yellow());
    if config.sources.is_empty() {
        println!("  {}", style("(none configured)").red());
    }
    for source in &config.sources {
        println!("  - {}", source);
    }

    let client = OllamaClient::new(&config.ollama)?;
    let manager = build_cache_manager(&config, &client);
    let status = manager.status(&config.manifest()).await?;

    println!("{}", style("Cache:").bold().yellow());
    println!("  Directory: {}", config.cache_dir_path().display());
    let decision = match status.decision {
        CacheDecision::Reuse => style(status.decision.to_string()).green(),
        CacheDecision::Rebuild(_) => style(status.decision.to_string()).yellow(),
    };
    println!("  Next question will: {}", decision);
    match status.age {
        Some(age) => println!(
            "  Index age: {} (fresh for {} days)",
            format_age(age),
            config.cache.freshness_days
        ),
        None => println!("  Index age: {}", style("no index built yet").dim()),
    }
    if let Some(count) = status.passage_count {
        println!("  Passages: {}", count);
    }
    if let Some(artifact) = &status.artifact {
        println!(
            "  Built: {} with {} ({} dimensions)",
            artifact.built_at.format("%Y-%m-%d %H:%M UTC"),
            artifact.embedding_model,
            artifact.dimension
        );
    }

    println!("{}", style("Ollama:").bold().yellow());
    let health = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .context("Health check task panicked")?;
    match health {
        Ok(()) => println!(
            "  {} {} and {} available",
            style("✓").green(),
            config.ollama.embedding_model,
            config.ollama.chat_model
        ),
        Err(e) => println!("  {} {:#}", style("✗").red(), e),
    }

    Ok(())
}

/// Show the configuration, or write a default config file if none exists
#[inline]
pub fn config(config_dir: Option<&Path>, show: bool) -> Result<()> {
    let config = load_config(config_dir)?;

    if show {
        show_config(&config);
        return Ok(());
    }

    let path = config.config_file_path();
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        println!("Edit it directly, or run `docs-assistant config --show`");
        return Ok(());
    }

    config.save()?;
    println!(
        "{} Wrote default configuration to {}",
        style("✓").green().bold(),
        path.display()
    );
    println!("Add your documentation URLs to `sources` before asking questions");
    Ok(())
}

/// Compact human readable age, e.g. `2d 3h` or `45m`
#[inline]
pub fn format_age(age: Duration) -> String {
    let minutes = age.as_secs() / 60;
    let (days, hours, minutes) = (minutes / (24 * 60), (minutes / 60) % 24, minutes % 60);

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

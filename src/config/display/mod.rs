use console::style;

use super::Config;

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Sources:").bold().yellow());
    if config.sources.is_empty() {
        eprintln!("  {}", style("(none configured)").red());
    }
    for source in &config.sources {
        eprintln!("  - {}", style(source).cyan());
    }

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
    eprintln!("  Temperature: {}", style(config.ollama.temperature).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Minimum Score: {}",
        style(config.retrieval.min_score).cyan()
    );
    eprintln!(
        "  k: {} (+{} up to {}), enough at {} passages",
        config.retrieval.initial_k,
        config.retrieval.k_increment,
        config.retrieval.max_k,
        config.retrieval.min_passages
    );
    eprintln!(
        "  Chunking: {} characters, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );

    eprintln!();
    eprintln!("{}", style("Cache:").bold().yellow());
    eprintln!("  Scope: {}", style(&config.cache.app_name).cyan());
    eprintln!(
        "  Freshness: {} days",
        style(config.cache.freshness_days).cyan()
    );
    eprintln!(
        "  Directory: {}",
        style(config.cache_dir_path().display()).dim()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

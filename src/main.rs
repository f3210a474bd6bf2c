use clap::{Parser, Subcommand};
use docs_assistant::Result;
use docs_assistant::commands::{ask, chat, config, refresh, status};
use std::path::PathBuf;

const DEFAULT_REQUESTER: &str = "console";

#[derive(Debug, Parser)]
#[command(name = "docs-assistant")]
#[command(about = "Answer questions about your product documentation with a local LLM")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to $DOCS_ASSISTANT_DIR or the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,
        /// Conversation the question belongs to
        #[arg(long, default_value = DEFAULT_REQUESTER)]
        requester: String,
    },
    /// Interactive conversation on stdin/stdout
    Chat {
        /// Conversation the questions belong to
        #[arg(long, default_value = DEFAULT_REQUESTER)]
        requester: String,
    },
    /// Fetch every source again and rebuild the index
    Refresh,
    /// Show the cache state and model availability
    Status,
    /// Write the default configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Ask {
            question,
            requester,
        } => {
            ask(config_dir, &question, &requester).await?;
        }
        Commands::Chat { requester } => {
            chat(config_dir, &requester).await?;
        }
        Commands::Refresh => {
            refresh(config_dir).await?;
        }
        Commands::Status => {
            status(config_dir).await?;
        }
        Commands::Config { show } => {
            config(config_dir, show)?;
        }
    }

    Ok(())
}

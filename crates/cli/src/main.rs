//! kazpaGPT CLI: the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP chat server
//! - `ask`     Answer one question through the full pipeline
//! - `search`  Show which knowledge chunks a query retrieves
//! - `doctor`  Diagnose config, API key and knowledge directory
//! - `init`    Write a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "kazpagpt",
    about = "kazpaGPT: support chat server for kazpa.io",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.kazpagpt/config.toml)
    #[arg(short, long, global = true, env = "KAZPA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question and print the reply
    Ask {
        question: String,

        /// Print the assembled system prompt instead of calling the model
        #[arg(long)]
        show_prompt: bool,
    },

    /// Show the knowledge chunks selected for a query (no model call)
    Search {
        query: String,
    },

    /// Diagnose configuration and knowledge
    Doctor,

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            question,
            show_prompt,
        } => commands::ask::run(config_path, &question, show_prompt).await?,
        Commands::Search { query } => commands::search::run(config_path, &query).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Init { force } => commands::init::run(config_path, force).await?,
    }

    Ok(())
}

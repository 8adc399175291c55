// ABOUTME: opco-buddy entry point: config bootstrap, one-shot questions and the interactive session
// ABOUTME: Wires config, file storage and the Gemini backend into a Buddy

mod commands;
mod repl;

use anyhow::{Context, Result};
use buddy_core::{Buddy, Config, FileStore, GeminiBackend, GeminiConfig, SearchMode, SendRequest};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "opco-buddy")]
#[command(about = "OPCO Buddy: document-grounded assistant in the terminal")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,

    /// Open the interactive session (default)
    Chat {
        /// Directory for generated files
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Use web search instead of the file tools
        #[arg(long)]
        web: bool,
    },

    /// Ask one question in a fresh chat and exit
    Ask {
        /// Question text
        text: String,

        /// Documents to use as context
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Directory for generated files
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Use web search instead of the file tools
        #[arg(long)]
        web: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Chat {
        out: None,
        web: false,
    }) {
        Commands::Init => {
            buddy_log::init();
            run_init()
        }
        Commands::Chat { out, web } => {
            // Keep the terminal clean; logs go to a file
            if let Some(path) = buddy_log::init_file("cli") {
                eprintln!("(logs: {})", path.display());
            }
            let buddy = open(cli.config, web)?;
            repl::run(buddy, out_dir(out)).await
        }
        Commands::Ask {
            text,
            file,
            out,
            web,
        } => {
            buddy_log::init();
            let buddy = open(cli.config, web)?;
            buddy.create_chat();
            if !file.is_empty() {
                repl::upload(&buddy, &file).await?;
            }
            let result = repl::run_turn(&buddy, SendRequest::text(text), &out_dir(out)).await;
            buddy.shutdown();
            result
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn run_init() -> Result<()> {
    let path = Config::init().context("failed to initialise configuration")?;
    println!("Config: {}", path.display());
    println!("Set {} (or api.api_key) before chatting.", buddy_core::config::API_KEY_ENV);
    Ok(())
}

fn out_dir(out: Option<PathBuf>) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from("."))
}

/// Load config, open storage and connect the backend
fn open(config_path: Option<PathBuf>, web: bool) -> Result<Arc<Buddy>> {
    let mut config = match config_path {
        Some(path) => Config::load_from(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    if web {
        config.search.mode = SearchMode::Web;
    }

    let storage = FileStore::open(config.storage_path()).with_context(|| {
        format!("failed to open storage at {}", config.storage_path().display())
    })?;
    let backend = GeminiBackend::new(GeminiConfig::from_config(&config)?)
        .context("failed to create backend")?;
    tracing::info!(model = %config.api.model, "Starting session");

    Ok(Arc::new(Buddy::new(
        &config,
        Arc::new(storage),
        Arc::new(backend),
    )))
}

fn print_version() {
    println!("opco-buddy {}", env!("CARGO_PKG_VERSION"));
    println!("  model default: {}", buddy_core::config::ApiConfig::default().model);
}

//! Organic Volume Tracker - multi-timeframe volume and organic trading monitor
//!
//! Tracks pump.fun token trades from PumpPortal, reports volume spikes and
//! scores how organic the trading on each token looks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

// Use the library crate
use organic_volume::cli::commands;
use organic_volume::config::{Config, LoggingConfig};

/// Organic Volume Tracker
#[derive(Parser)]
#[command(name = "organic-volume")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking volume
    Start {
        /// Token mint address to track (repeatable, added to volume.tokens)
        #[arg(short, long = "token")]
        tokens: Vec<String>,

        /// Write a JSON snapshot of tracker state here periodically and on exit
        #[arg(long, env = "ORGANIC_SNAPSHOT_PATH")]
        snapshot: Option<PathBuf>,
    },

    /// Run the organic analyzer over a JSON file of trades
    Analyze {
        /// JSON array of trades
        file: PathBuf,

        /// Token label for the report
        #[arg(long, default_value = "local")]
        token: String,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    // Execute command
    let result = match cli.command {
        Commands::Start { tokens, snapshot } => commands::start(&config, tokens, snapshot).await,
        Commands::Analyze { file, token } => commands::analyze(&config, &file, &token).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing; RUST_LOG overrides the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("organic_volume={}", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

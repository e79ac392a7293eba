//! Fusion CLI - Headless Fusion Player tools
//!
//! Features:
//! - Thumbnail timeline inspection
//! - Keyboard shortcut reference
//! - Scripted headless player sessions
//! - Configuration dump

use anyhow::Context;
use clap::{Parser, Subcommand};
use fusion_core::PlayerConfig;
use std::path::{Path, PathBuf};

mod commands;
mod output;
mod script;

/// Fusion CLI - Video player toolkit
#[derive(Parser)]
#[command(name = "fusion")]
#[command(version)]
#[command(about = "Inspect timelines and drive a headless Fusion Player", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Player configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a thumbnail timeline (URL or file path)
    Timeline {
        /// URL or path to the timeline
        source: String,

        /// Show the cue and hover preview at this time (seconds)
        #[arg(long)]
        at: Option<f64>,

        /// Scrubber width used for the hover preview (pixels)
        #[arg(long, default_value = "800")]
        width: f64,
    },

    /// Print the keyboard shortcut table
    Shortcuts,

    /// Run a headless session from a script of steps
    Simulate {
        /// Steps, e.g. `Space wait:6 Shift+Period KeyL sleep:5 quality:0`
        steps: Vec<String>,

        /// Media duration in seconds
        #[arg(short, long, default_value = "600")]
        duration: f64,

        /// Rendition heights offered by the streaming engine
        #[arg(short, long, value_delimiter = ',', default_value = "1080,720,480,360")]
        levels: Vec<u32>,

        /// Play the source natively instead of through the engine
        #[arg(long)]
        native: bool,
    },

    /// Print the effective player configuration
    Config,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PlayerConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PlayerConfig::from_json(&json).with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(PlayerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    fusion_core::init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Timeline { source, at, width } => {
            commands::timeline(&source, at, width, &cli.format).await?;
        }
        Commands::Shortcuts => {
            commands::shortcuts(&cli.format)?;
        }
        Commands::Simulate { steps, duration, levels, native } => {
            commands::simulate(config, &steps, duration, &levels, native, &cli.format)?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

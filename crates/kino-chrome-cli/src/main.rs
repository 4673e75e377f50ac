//! Kino Chrome CLI - Headless Player Chrome Driver
//!
//! Features:
//! - Fill and responsive layout calculations
//! - Keyboard table listing
//! - Options validation
//! - Scripted player sessions driven by the event loop

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Kino Chrome CLI - Player chrome toolkit
#[derive(Parser)]
#[command(name = "kino-chrome")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Headless player chrome driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the media layout for a stretching mode
    Layout {
        /// Stretching mode (fill, responsive)
        #[arg(short, long, default_value = "fill")]
        mode: String,

        /// Media width in pixels
        #[arg(long, default_value = "480")]
        width: f64,

        /// Media height in pixels
        #[arg(long, default_value = "270")]
        height: f64,

        /// Parent width in pixels
        #[arg(long)]
        parent_width: f64,

        /// Parent height in pixels
        #[arg(long)]
        parent_height: f64,
    },

    /// List the default keyboard actions
    Keys,

    /// Validate player options
    Config {
        /// JSON options file (as in data-mejsoptions)
        path: PathBuf,
    },

    /// Run a scripted session and print the notifications
    Simulate {
        /// JSON options file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Media duration in seconds
        #[arg(short, long, default_value = "60")]
        duration: f64,

        /// How long to run the event loop, in milliseconds
        #[arg(long, default_value = "3000")]
        run_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    kino_chrome::init();

    match cli.command {
        Commands::Layout { mode, width, height, parent_width, parent_height } => {
            commands::layout(&mode, width, height, parent_width, parent_height, &cli.format)?;
        }
        Commands::Keys => {
            commands::keys(&cli.format)?;
        }
        Commands::Config { path } => {
            commands::config(&path, &cli.format)?;
        }
        Commands::Simulate { config, duration, run_ms } => {
            commands::simulate(config, duration, run_ms, &cli.format).await?;
        }
    }

    Ok(())
}

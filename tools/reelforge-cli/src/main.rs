//! Reelforge CLI - Command-line interface for timeline snapshot export.
//!
//! Usage:
//!   reelforge export <SNAPSHOT>     Render a snapshot to a video file
//!   reelforge info <SNAPSHOT>       Show snapshot information
//!   reelforge validate <SNAPSHOT>   Validate a snapshot
//!   reelforge check                 Check encoder tooling

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelforge_common::config::{AppConfig, CaptureBackendKind};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelforge",
    about = "Frame-accurate export of multi-track video timelines",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a snapshot to video
    Export {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,

        /// Output file path (defaults to the snapshot's filename next to it)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Capture backend: live|offline
        #[arg(long)]
        backend: Option<CaptureBackendKind>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// TTF/OTF font for text elements
        #[arg(long)]
        font: Option<PathBuf>,

        /// Write an export report JSON next to the output
        #[arg(long)]
        report: bool,
    },

    /// Show snapshot information
    Info {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,
    },

    /// Validate a snapshot
    Validate {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,
    },

    /// Check encoder tooling and configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    reelforge_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export {
            snapshot,
            output,
            backend,
            fps,
            font,
            report,
        } => {
            let mut defaults = config.export.clone();
            if let Some(backend) = backend {
                defaults.backend = backend;
            }
            if let Some(fps) = fps {
                defaults.fps = fps;
            }
            if font.is_some() {
                defaults.font_path = font;
            }
            commands::export::run(snapshot, output, defaults, report).await
        }
        Commands::Info { snapshot } => commands::info::run(snapshot, config.export.fps),
        Commands::Validate { snapshot } => commands::validate::run(snapshot),
        Commands::Check => commands::check::run(&config),
    }
}

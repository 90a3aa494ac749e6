//! Dolly CLI: inspect and export recordings.
//!
//! Usage:
//!   dolly export <DIR>        Composite cursor and click sounds into a video
//!   dolly inspect <DIR>       Show a recording's timeline summary
//!   dolly init-config <DIR>   Write default post-production settings
//!   dolly check               Check the encoder installation

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dolly_common::config::{AppConfig, CompositorKind};

mod commands;

#[derive(Parser)]
#[command(
    name = "dolly",
    about = "Constant-framerate screencasts with a synthetic cursor",
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

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Render every cursor frame and stream it to the encoder
    Overlay,
    /// Move a single cursor sprite with filter expressions
    Expression,
}

impl From<Backend> for CompositorKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Overlay => CompositorKind::Overlay,
            Backend::Expression => CompositorKind::Expression,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export a recording with the cursor and click sounds composited
    Export {
        /// Path to the recording directory
        path: PathBuf,

        /// Output file path (defaults to output.mp4 in the recording)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compositor backend (defaults to the configured one)
        #[arg(long, value_enum)]
        backend: Option<Backend>,

        /// Output frame rate (defaults to the recording's)
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Show recording information
    Inspect {
        /// Path to the recording directory
        path: PathBuf,
    },

    /// Write a default post-production.json
    InitConfig {
        /// Path to the recording directory
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the encoder installation
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
    dolly_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export {
            path,
            output,
            backend,
            fps,
        } => commands::export::run(&config, path, output, backend.map(Into::into), fps).await,
        Commands::Inspect { path } => commands::inspect::run(path),
        Commands::InitConfig { path, force } => commands::init_config::run(path, force),
        Commands::Check => commands::check::run(&config),
    }
}

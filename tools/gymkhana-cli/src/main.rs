//! Gymkhana CLI: compare a run against a reference run.
//!
//! Usage:
//!   gymkhana check                               Check ffmpeg availability
//!   gymkhana info <VIDEO>                        Show probed video metadata
//!   gymkhana frame <PRIMARY> <SHADOW> --at <S>   Render one composite frame
//!   gymkhana play <PRIMARY> <SHADOW>             Headless paced playback
//!   gymkhana export <PRIMARY> <SHADOW>           Export a composited clip

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gymkhana_common::config::AppConfig;
use gymkhana_sync_model::range::QuickRange;

mod commands;

#[derive(Parser)]
#[command(
    name = "gymkhana",
    about = "Shadow-video comparison for gymkhana runs",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load settings from this file instead of the user config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Sync settings shared by the commands that composite.
#[derive(Args, Debug, Clone, Copy)]
pub struct SyncArgs {
    /// Shadow offset in seconds (positive shows later shadow frames)
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<f64>,

    /// Shadow opacity in [0, 1]
    #[arg(long)]
    pub opacity: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that ffmpeg and ffprobe can be found
    Check,

    /// Show probed metadata for a video
    Info {
        /// Path to the video
        path: PathBuf,
    },

    /// Render one composite frame to PNG
    Frame {
        primary: PathBuf,
        shadow: PathBuf,

        /// Primary time in seconds
        #[arg(long, default_value = "0")]
        at: f64,

        #[command(flatten)]
        sync: SyncArgs,

        /// Output PNG path
        #[arg(short, long, default_value = "composite.png")]
        output: PathBuf,

        /// Also write the unblended primary frame here
        #[arg(long)]
        primary_out: Option<PathBuf>,
    },

    /// Play the comparison headlessly, logging each frame
    Play {
        primary: PathBuf,
        shadow: PathBuf,

        /// Stop after this many seconds of wall-clock playback
        #[arg(long, default_value = "5")]
        seconds: f64,

        /// Speed multiplier: 0.25, 0.5, 1, 1.5 or 2
        #[arg(long)]
        speed: Option<f64>,

        /// Start position in seconds
        #[arg(long, default_value = "0")]
        start: f64,

        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Export a composited clip
    Export {
        primary: PathBuf,
        shadow: PathBuf,

        /// Range start in seconds
        #[arg(long, requires = "end", conflicts_with_all = ["range", "around"])]
        start: Option<f64>,

        /// Range end in seconds
        #[arg(long, requires = "start")]
        end: Option<f64>,

        /// Quick range: 0-10, 10-30 or 30-60
        #[arg(long, conflicts_with = "around")]
        range: Option<QuickRange>,

        /// Export five seconds either side of this time
        #[arg(long)]
        around: Option<f64>,

        #[command(flatten)]
        sync: SyncArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Write a JSON summary next to the output
        #[arg(long)]
        report: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    gymkhana_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Check => commands::check::run(&config),
        Commands::Info { path } => commands::info::run(&config, path),
        Commands::Frame {
            primary,
            shadow,
            at,
            sync,
            output,
            primary_out,
        } => commands::frame::run(&config, primary, shadow, at, sync, output, primary_out),
        Commands::Play {
            primary,
            shadow,
            seconds,
            speed,
            start,
            sync,
        } => commands::play::run(&config, primary, shadow, seconds, speed, start, sync).await,
        Commands::Export {
            primary,
            shadow,
            start,
            end,
            range,
            around,
            sync,
            output,
            report,
        } => {
            let selection = commands::export::RangeSelection::from_args(start, end, range, around)?;
            commands::export::run(&config, primary, shadow, selection, sync, output, report)
        }
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidladder")]
#[command(author, version, about = "Transcode uploaded videos into a resolution ladder with live progress")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the upload server and event socket
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Probe a video file and display what the transcoder will see
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Feed a captured ffmpeg log through the progress tracker and print the
    /// resulting events as JSON lines
    Replay {
        /// Log file (ffmpeg stderr, optionally with script output mixed in)
        #[arg(required = true)]
        log: PathBuf,

        /// Duration of the source video in seconds
        #[arg(long)]
        duration: f64,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (defaults to --config)
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

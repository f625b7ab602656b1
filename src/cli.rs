//! Command-line interface for voxclip
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Acquire voice audio as canonical WAV
#[derive(Parser, Debug)]
#[command(
    name = "voxclip",
    version,
    about = "Acquire voice audio from a microphone, a media file, or a remote URL as canonical WAV"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info logs, -vv: debug logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`), and compound (`1m30s`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record from the microphone (stops on Enter unless --seconds is given)
    Record {
        /// Stop automatically after this long. Examples: 5, 10s, 1m30s
        #[arg(long, short = 's', value_name = "DURATION", value_parser = parse_duration)]
        seconds: Option<Duration>,

        /// Audio input device (e.g., hw:0)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Write the asset here
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Acquire audio from a local audio or video file
    File {
        /// Input file
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Declared kind: audio, video, or a MIME type (default: from extension)
        #[arg(long, value_name = "KIND")]
        kind: Option<String>,

        /// Write the asset here
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Acquire audio from a remote media URL
    Remote {
        /// Media URL (e.g., https://youtu.be/<id>)
        #[arg(value_name = "URL")]
        url: String,

        /// Write the asset here
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// List available audio input devices
    Devices,

    /// Check system dependencies
    Check,

    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Print the effective configuration (API keys redacted)
    Show,

    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

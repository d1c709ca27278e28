//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use live_recorder::domain::RecordMode;
use platforms_resolver::Quality;

/// Monitors live-stream rooms and records them while they broadcast
#[derive(Parser, Debug)]
#[command(name = "live-recorder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "LIVE_RECORDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter directive, e.g. "live_recorder=debug"
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor all saved recordings until interrupted
    Run,

    /// Add a room to the recording list
    Add {
        /// Room URL
        url: String,

        /// Streamer name, used for deduplication and folder names
        #[arg(short, long)]
        name: Option<String>,

        /// auto records when live, manual only reports
        #[arg(short, long, default_value = "auto", value_parser = parse_mode)]
        mode: RecordMode,

        /// OD, UHD, HD, SD or LD
        #[arg(short, long, default_value = "OD", value_parser = parse_quality)]
        quality: Quality,

        /// Add without enabling monitoring
        #[arg(long)]
        paused: bool,
    },

    /// Remove a recording, stopping its monitor first
    Remove {
        /// Recording id
        id: String,
    },

    /// List saved recordings
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Tell whether a URL is already covered by a saved recording
    CheckDuplicate {
        url: String,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Query a room's live status once
    Resolve {
        url: String,

        #[arg(short, long, default_value = "OD", value_parser = parse_quality)]
        quality: Quality,
    },
}

fn parse_mode(s: &str) -> Result<RecordMode, String> {
    s.parse().map_err(|e: live_recorder::Error| e.to_string())
}

fn parse_quality(s: &str) -> Result<Quality, String> {
    Quality::parse(s).ok_or_else(|| format!("unknown quality: {s}"))
}

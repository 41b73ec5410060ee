//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tim_core::EntryId;

/// Tag-based time tracker.
///
/// Start and stop tracked sessions, then review them as a log, a per-tag
/// summary, streaks or a contribution graph.
#[derive(Debug, Parser)]
#[command(name = "tim", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start tracking, stopping the running session first.
    Start {
        /// Comma-separated tags (e.g. work,api).
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// What you are working on.
        #[arg(short, long)]
        description: Option<String>,

        /// Start time (ISO 8601 or relative like '15 minutes ago').
        #[arg(long)]
        at: Option<String>,
    },

    /// Stop the running session.
    Stop {
        /// Stop time (ISO 8601 or relative like '15 minutes ago').
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the running session.
    Status,

    /// List entries, newest first.
    Log {
        /// Only entries carrying any of these comma-separated tags.
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete an entry by id.
    Delete {
        /// Entry id as shown by `tim log`.
        id: EntryId,
    },

    /// Time per tag over recent days.
    Summary {
        /// Number of days to cover (defaults to `summary_days` from config).
        #[arg(long)]
        days: Option<u32>,

        /// Only entries carrying any of these comma-separated tags.
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Current and best daily streak per tag.
    Streaks {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Contribution heatmap of tracked minutes per day.
    Graph {
        /// Number of weeks to show (defaults to `graph_weeks` from config).
        #[arg(long)]
        weeks: Option<u32>,
    },

    /// List every tag in use.
    Tags,

    /// Live status, refreshed every second until Ctrl-C.
    Watch {
        /// Stop after this many refreshes.
        #[arg(long)]
        count: Option<u64>,
    },
}

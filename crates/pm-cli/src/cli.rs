//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::actors::ListArgs;
use crate::commands::events::EventsArgs;

/// Game telemetry ingestion.
///
/// Classifies client events into typed categories, keeps per-player activity
/// records, and answers simple analytics queries over a local `SQLite` store.
#[derive(Debug, Parser)]
#[command(name = "pm", version, about, long_about = None)]
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
    /// Ingest one event payload.
    Ingest {
        /// The JSON payload. Read from stdin when omitted.
        #[arg(long)]
        payload: Option<String>,
    },

    /// Ingest newline-delimited JSON payloads from stdin.
    Import {
        /// Parallel ingestion workers. Defaults to `import_jobs` from config.
        #[arg(long)]
        jobs: Option<usize>,
    },

    /// Inspect actor records.
    Actors {
        #[command(subcommand)]
        action: ActorsAction,
    },

    /// List stored events.
    Events(EventsArgs),

    /// Print the analytics summary as JSON.
    Summary,

    /// Show the database location and event counts.
    Status,

    /// List every accepted event type and its category.
    Types,
}

#[derive(Debug, Subcommand)]
pub enum ActorsAction {
    /// List actors, optionally filtered.
    List(ListArgs),

    /// Show one actor record.
    Show {
        /// The actor id.
        id: String,
    },
}

//! CLI argument definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use agentdex_indexer::Roots;

/// CLI for searching and indexing AI coding-agent session logs
#[derive(Parser, Debug)]
#[command(name = "agentdex")]
#[command(version)]
#[command(about = "Search and index coding-agent session logs")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Custom database path
    #[arg(long, global = true, env = "AGENTDEX_DB")]
    pub db: Option<PathBuf>,

    /// Transcript root directory override
    #[arg(long, global = true, env = "AGENTDEX_TRANSCRIPTS")]
    pub transcripts: Option<PathBuf>,

    /// Hook-event root directory override
    #[arg(long, global = true, env = "AGENTDEX_HOOKS")]
    pub hooks: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "human")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(agentdex_store::default_db_path)
    }

    pub fn roots(&self) -> Roots {
        let mut roots = Roots::default_under_home();
        if let Some(transcripts) = &self.transcripts {
            roots.transcripts = transcripts.clone();
        }
        if let Some(hooks) = &self.hooks {
            roots.hooks = hooks.clone();
        }
        roots
    }
}

/// Output format for commands
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output (one object per line for lists)
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Full-text search across indexed logs
    Search {
        /// Search query
        query: String,

        /// Limit results
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,

        /// Filter to a session (id, slug, or name)
        #[arg(short, long)]
        session: Option<String>,

        /// Filter by line type (user, assistant, system, summary)
        #[arg(short, long, value_delimiter = ',')]
        types: Option<Vec<String>>,

        /// Search hook events instead of transcript lines
        #[arg(long)]
        hooks: bool,

        /// Merge all sources into one newest-first result list
        #[arg(short, long)]
        unified: bool,
    },

    /// View transcript lines for a session
    View {
        /// Session id, slug, or name
        session: String,

        /// Filter by line type
        #[arg(short, long, value_delimiter = ',')]
        types: Option<Vec<String>>,

        /// Show last N lines
        #[arg(long)]
        last: Option<i64>,

        /// Only lines inserted after this row id (for polling)
        #[arg(long)]
        after_id: Option<i64>,
    },

    /// List recent sessions
    List {
        /// Number of sessions to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },

    /// Show session information
    Info {
        /// Session id, slug, or name
        session: String,
    },

    /// Index management subcommands
    #[command(subcommand)]
    Index(IndexCommand),

    /// Stamp transcript lines with turn ids and session names
    Correlate,

    /// Run the indexing daemon: catch up, then watch both roots
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum IndexCommand {
    /// Show index status and statistics
    Status,

    /// First full build; refuses if the index already holds data
    Build,

    /// Index only content appended since the last pass
    Update,

    /// Drop all indexed rows and re-index everything
    Rebuild,
}

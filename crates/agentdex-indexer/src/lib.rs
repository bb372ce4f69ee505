//! agentdex-indexer - the write path of the session-log index
//!
//! Owns every mutation of the store: file discovery, delta (byte-offset
//! resumable) indexing of both JSONL families, turn correlation, the
//! debounced file watcher, and the daemon loop tying them together.

use std::path::PathBuf;
use thiserror::Error;

use agentdex_store::StoreError;

pub mod correlate;
pub mod daemon;
pub mod debounce;
pub mod delta;
pub mod discovery;
pub mod hooks;
mod reader;
pub mod watch;

pub use correlate::{correlate_turns, CorrelationOutcome, SessionNameSource};
pub use daemon::{Daemon, DaemonConfig, DaemonStatus};
pub use debounce::Debouncer;
pub use delta::{index_once, index_transcript_file, rebuild, FamilyOutcome, FileOutcome};
pub use discovery::{scan, Roots, ScanReport};
pub use hooks::index_hook_file;
pub use watch::{start_watch, WatchConfig, WatchHandle};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("index not ready at {0} (run a full build first)")]
    NotReady(PathBuf),
}

//! agentdex-core - record types and JSONL parsing
//!
//! Leaf crate shared by the store (read path) and the indexer (write path).
//! Turns one raw JSONL line into a typed record plus extracted searchable
//! text; knows nothing about SQLite or the filesystem.

pub mod parser;
pub mod text_extract;
pub mod types;

pub use parser::{parse_hook_line, parse_transcript_line, HookRecord, LineRecord};
pub use text_extract::extract_searchable_text;
pub use types::{
    FileFamily, HookEvent, HookKind, LineFilter, LineKind, Order, TranscriptLine,
};

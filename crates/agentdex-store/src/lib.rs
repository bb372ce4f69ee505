//! agentdex-store - SQLite storage engine for the session-log index
//!
//! Owns the on-disk store: schema creation, the numbered migration chain,
//! read queries, and full-text search (single-source and unified). The
//! `Store` handle is passed explicitly into every component that needs it;
//! there is no global connection. The companion `agentdex-indexer` crate is
//! the only writer of row data.

pub mod migrate;
pub mod queries;
pub mod schema;
pub mod search;
pub mod store;

pub use queries::SessionSummary;
pub use schema::SCHEMA_VERSION;
pub use search::{
    default_sources, HookHit, LineHit, SearchOptions, SearchSource, SourceShape, UnifiedHit,
};
pub use store::{default_db_path, Store, StoreError, StoreStats};

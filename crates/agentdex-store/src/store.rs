//! The `Store` handle: one opened connection, passed by reference into
//! every component (no process-wide singleton).

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::{self, SCHEMA_VERSION};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store not found at {0}")]
    NotFound(PathBuf),

    #[error("store not initialized (run a full index build first)")]
    NotInitialized,

    #[error("schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },

    #[error("migration failed: {0}")]
    Migration(String),
}

/// Default store location (`~/.agentdex/index.db`).
pub fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".agentdex").join("index.db")
}

/// Handle to the on-disk index.
///
/// Read-write opens create the file and bring the schema to the current
/// version. Read-only opens refuse to touch an unversioned or stale store.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) read-write at the default path.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&default_db_path())
    }

    /// Open (or create) read-write. Runs pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure(&conn)?;
        schema::initialize(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open read-only. Errors if the file is missing or the version is stale.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        match store.version()? {
            None => Err(StoreError::NotInitialized),
            Some(v) if v != SCHEMA_VERSION => Err(StoreError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found: v,
            }),
            Some(_) => Ok(store),
        }
    }

    /// In-memory store with the full schema; for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        schema::initialize(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stored schema version, `None` when the metadata table is absent
    /// (fresh install) or carries no version row.
    pub fn version(&self) -> Result<Option<i32>, StoreError> {
        schema::stored_version(&self.conn)
    }

    /// Ready means: current schema version and at least one indexed line.
    /// Not-ready is the caller's cue to run a full build, never auto-healed.
    pub fn is_ready(&self) -> Result<bool, StoreError> {
        match self.version()? {
            Some(v) if v == SCHEMA_VERSION => {}
            _ => return Ok(false),
        }
        let lines: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lines", [], |row| row.get(0))?;
        Ok(lines > 0)
    }

    /// Arbitrary metadata value. A missing key is `None`; anything else is
    /// a real error.
    pub fn metadata(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            [key, value],
        )?;
        Ok(())
    }

    /// Record the time of a completed indexing pass.
    pub fn touch_last_indexed(&self) -> Result<(), StoreError> {
        self.set_metadata("last_indexed", &chrono::Utc::now().to_rfc3339())
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let version = self.version()?.unwrap_or(0);
        let line_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lines", [], |row| row.get(0))?;
        let session_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transcript_files",
            [],
            |row| row.get(0),
        )?;
        let hook_event_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM hook_events", [], |row| row.get(0))?;
        let last_indexed = self.metadata("last_indexed")?;
        let size_bytes = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            version,
            line_count,
            session_count,
            hook_event_count,
            last_indexed,
            size_bytes,
        })
    }

    /// Drop all indexed rows and per-file cursors, keeping the schema.
    /// The recovery path behind a full rebuild.
    pub fn clear_indexed_data(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "DELETE FROM lines;
             DELETE FROM hook_events;
             DELETE FROM transcript_files;
             DELETE FROM hook_files;
             DELETE FROM metadata WHERE key = 'last_indexed';",
        )?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<(), StoreError> {
    // WAL gives one-writer/many-readers; queries stay live during indexing.
    // recursive_triggers makes the implicit delete of INSERT OR REPLACE fire
    // the FTS delete triggers, keeping the external-content index in sync.
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = OFF;
         PRAGMA recursive_triggers = ON;",
    )?;
    Ok(())
}

/// Point-in-time counts for `stats()` callers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub version: i32,
    pub line_count: i64,
    pub session_count: i64,
    pub hook_event_count: i64,
    pub last_indexed: Option<String>,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_under_home() {
        let path = default_db_path();
        assert!(path.to_string_lossy().ends_with(".agentdex/index.db"));
    }

    #[test]
    fn fresh_store_is_not_ready_until_lines_exist() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.is_ready().unwrap());

        store
            .conn()
            .execute(
                "INSERT INTO lines (session_id, uuid, line_number, type, timestamp, raw, file_path)
                 VALUES ('s1', 'u1', 1, 'user', 't', '{}', '/f')",
                [],
            )
            .unwrap();
        assert!(store.is_ready().unwrap());
    }

    #[test]
    fn read_only_open_refuses_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Store::open_read_only(&tmp.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn read_only_open_sees_writer_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.db");
        {
            let store = Store::open(&path).unwrap();
            assert_eq!(store.version().unwrap(), Some(SCHEMA_VERSION));
        }
        let ro = Store::open_read_only(&path).unwrap();
        assert_eq!(ro.version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn metadata_round_trip() {
        let store = Store::open_in_memory().unwrap();
        store.set_metadata("probe", "value").unwrap();
        assert_eq!(store.metadata("probe").unwrap().as_deref(), Some("value"));
        assert_eq!(store.metadata("absent").unwrap(), None);
    }
}

//! Schema creation. Migration of older stores lives in `migrate`.

use rusqlite::Connection;

use crate::migrate;
use crate::store::StoreError;

/// Current schema version. Bump together with a new `migrate` step.
pub const SCHEMA_VERSION: i32 = 7;

/// Bring a connection to the current schema.
///
/// A store with no metadata table is a fresh install: the full schema is
/// created directly at the current version and no migration runs. Otherwise
/// the numbered migration chain advances the stored version first, then any
/// objects new to this version are created idempotently.
pub fn initialize(conn: &Connection) -> Result<(), StoreError> {
    if let Some(version) = stored_version(conn)? {
        migrate::run(conn, version)?;
    }
    ensure_schema(conn)?;
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Stored schema version, or `None` when the metadata table does not exist
/// or holds no version row.
pub fn stored_version(conn: &Connection) -> Result<Option<i32>, StoreError> {
    let has_metadata: bool = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'metadata'",
        [],
        |row| row.get::<_, i64>(0).map(|n| n > 0),
    )?;
    if !has_metadata {
        return Ok(None);
    }
    let version = conn
        .query_row(
            "SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .ok();
    Ok(version)
}

/// Create every table, index and trigger if not already present.
pub fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        )",
    )?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            uuid TEXT NOT NULL,
            parent_uuid TEXT,
            line_number INTEGER NOT NULL,
            type TEXT NOT NULL,
            subtype TEXT,
            timestamp TEXT NOT NULL,
            slug TEXT,
            role TEXT,
            model TEXT,
            cwd TEXT,
            content TEXT,
            raw TEXT NOT NULL,
            file_path TEXT NOT NULL,
            turn_id TEXT,
            turn_sequence INTEGER,
            session_name TEXT,
            UNIQUE(session_id, uuid)
        );
        CREATE INDEX IF NOT EXISTS idx_lines_session ON lines(session_id);
        CREATE INDEX IF NOT EXISTS idx_lines_type ON lines(type);
        CREATE INDEX IF NOT EXISTS idx_lines_timestamp ON lines(timestamp);
        CREATE INDEX IF NOT EXISTS idx_lines_turn_id ON lines(turn_id);
        CREATE INDEX IF NOT EXISTS idx_lines_session_name ON lines(session_name);",
    )?;

    // External-content FTS over lines.content; base-table triggers keep it
    // synchronized, callers never write it directly.
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS lines_fts USING fts5(
            content,
            session_id UNINDEXED,
            type UNINDEXED,
            content='lines',
            content_rowid='id'
        )",
    )?;
    conn.execute_batch(
        "CREATE TRIGGER IF NOT EXISTS lines_fts_ai AFTER INSERT ON lines BEGIN
            INSERT INTO lines_fts(rowid, content, session_id, type)
            VALUES (new.id, new.content, new.session_id, new.type);
        END;

        CREATE TRIGGER IF NOT EXISTS lines_fts_ad AFTER DELETE ON lines BEGIN
            INSERT INTO lines_fts(lines_fts, rowid, content, session_id, type)
            VALUES ('delete', old.id, old.content, old.session_id, old.type);
        END;

        CREATE TRIGGER IF NOT EXISTS lines_fts_au AFTER UPDATE ON lines BEGIN
            INSERT INTO lines_fts(lines_fts, rowid, content, session_id, type)
            VALUES ('delete', old.id, old.content, old.session_id, old.type);
            INSERT INTO lines_fts(rowid, content, session_id, type)
            VALUES (new.id, new.content, new.session_id, new.type);
        END;",
    )?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS transcript_files (
            file_path TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            slug TEXT,
            line_count INTEGER NOT NULL,
            last_line INTEGER NOT NULL DEFAULT 0,
            byte_offset INTEGER NOT NULL DEFAULT 0,
            first_timestamp TEXT,
            last_timestamp TEXT,
            indexed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transcript_files_session
            ON transcript_files(session_id);",
    )?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS hook_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            tool_use_id TEXT,
            tool_name TEXT,
            decision TEXT,
            handler_results TEXT,
            input_json TEXT,
            context_json TEXT,
            file_path TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            turn_id TEXT,
            turn_sequence INTEGER,
            session_name TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_hooks_session ON hook_events(session_id);
        CREATE INDEX IF NOT EXISTS idx_hooks_event_type ON hook_events(event_type);
        CREATE INDEX IF NOT EXISTS idx_hooks_timestamp ON hook_events(timestamp);
        CREATE INDEX IF NOT EXISTS idx_hooks_turn_id ON hook_events(turn_id);
        CREATE INDEX IF NOT EXISTS idx_hooks_tool_use ON hook_events(tool_use_id);",
    )?;

    // Standalone FTS for hook events; fed by triggers from the searchable
    // columns rather than mirroring the base table.
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS hook_events_fts USING fts5(content)",
    )?;
    create_hook_fts_triggers(conn)?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS hook_files (
            file_path TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            session_name TEXT,
            event_count INTEGER NOT NULL,
            last_line INTEGER NOT NULL DEFAULT 0,
            byte_offset INTEGER NOT NULL DEFAULT 0,
            first_timestamp TEXT,
            last_timestamp TEXT,
            indexed_at TEXT NOT NULL
        )",
    )?;

    Ok(())
}

/// Searchable projection of a hook event row, shared by the triggers and
/// the migration backfill.
pub(crate) const HOOK_FTS_CONTENT: &str =
    "COALESCE(event_type, '') || ' ' || COALESCE(tool_name, '') || ' ' || COALESCE(input_json, '')";

fn hook_fts_projection(row: &str) -> String {
    format!(
        "COALESCE({row}.event_type, '') || ' ' || COALESCE({row}.tool_name, '') || ' ' || COALESCE({row}.input_json, '')"
    )
}

pub(crate) fn create_hook_fts_triggers(conn: &Connection) -> Result<(), StoreError> {
    let new_content = hook_fts_projection("new");
    let old_content = hook_fts_projection("old");

    conn.execute_batch(&format!(
        "CREATE TRIGGER IF NOT EXISTS hook_events_fts_ai AFTER INSERT ON hook_events BEGIN
            INSERT INTO hook_events_fts(rowid, content) VALUES (new.id, {new_content});
        END;

        CREATE TRIGGER IF NOT EXISTS hook_events_fts_ad AFTER DELETE ON hook_events BEGIN
            INSERT INTO hook_events_fts(hook_events_fts, rowid, content)
            VALUES ('delete', old.id, {old_content});
        END;

        CREATE TRIGGER IF NOT EXISTS hook_events_fts_au AFTER UPDATE ON hook_events BEGIN
            INSERT INTO hook_events_fts(hook_events_fts, rowid, content)
            VALUES ('delete', old.id, {old_content});
            INSERT INTO hook_events_fts(rowid, content) VALUES (new.id, {new_content});
        END;"
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn fresh_schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let tables = table_names(&conn);
        for expected in [
            "metadata",
            "lines",
            "transcript_files",
            "hook_events",
            "hook_files",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(tables.iter().any(|t| t == "lines_fts"));
        assert!(tables.iter().any(|t| t == "hook_events_fts"));
        assert_eq!(stored_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        assert_eq!(stored_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn line_insert_feeds_fts_via_trigger() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        conn.execute(
            "INSERT INTO lines (session_id, uuid, line_number, type, timestamp, content, raw, file_path)
             VALUES ('s1', 'u1', 1, 'user', 't', 'needle in haystack', '{}', '/f')",
            [],
        )
        .unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lines_fts WHERE lines_fts MATCH '\"needle\"'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn line_delete_removes_fts_row() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        conn.execute(
            "INSERT INTO lines (session_id, uuid, line_number, type, timestamp, content, raw, file_path)
             VALUES ('s1', 'u1', 1, 'user', 't', 'ephemeral', '{}', '/f')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM lines WHERE uuid = 'u1'", []).unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lines_fts WHERE lines_fts MATCH '\"ephemeral\"'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 0);
    }

    #[test]
    fn hook_insert_feeds_fts_via_trigger() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        conn.execute(
            "INSERT INTO hook_events (session_id, timestamp, event_type, tool_name, input_json, file_path, line_number)
             VALUES ('s1', 't', 'PreToolUse', 'Bash', '{\"command\":\"cargo test\"}', '/f', 1)",
            [],
        )
        .unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM hook_events_fts WHERE hook_events_fts MATCH '\"Bash\"'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }
}

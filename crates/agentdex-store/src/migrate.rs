//! Numbered linear schema migrations.
//!
//! Stored version N is advanced one step at a time until it reaches
//! `SCHEMA_VERSION`. Every step is safe to re-run: column additions check
//! `PRAGMA table_info` first, and object creation uses IF NOT EXISTS. A
//! later step may repair an earlier one (v7 rebuilds the hook FTS table
//! that shipped broken in v6).

use rusqlite::Connection;
use tracing::info;

use crate::schema::{self, SCHEMA_VERSION};
use crate::store::StoreError;

/// Advance the stored schema from `from` to the current version.
/// Returns the number of steps applied.
pub fn run(conn: &Connection, from: i32) -> Result<usize, StoreError> {
    let mut version = from;
    let mut applied = 0;

    while version < SCHEMA_VERSION {
        let next = version + 1;
        info!(from = version, to = next, "migrating schema");
        match next {
            5 => to_v5(conn)?,
            6 => to_v6(conn)?,
            7 => to_v7(conn)?,
            other => {
                return Err(StoreError::Migration(format!(
                    "no migration step produces version {other}"
                )))
            }
        }
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('version', ?1)",
            [next.to_string()],
        )?;
        version = next;
        applied += 1;
    }

    Ok(applied)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_column(conn: &Connection, table: &str, decl: &str) -> Result<(), StoreError> {
    let column = decl.split_whitespace().next().unwrap_or(decl);
    if !has_column(conn, table, column)? {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {decl}"), [])?;
    }
    Ok(())
}

/// v4 -> v5: turn correlation columns on both row tables.
fn to_v5(conn: &Connection) -> Result<(), StoreError> {
    for table in ["lines", "hook_events"] {
        add_column(conn, table, "turn_id TEXT")?;
        add_column(conn, table, "turn_sequence INTEGER")?;
        add_column(conn, table, "session_name TEXT")?;
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_lines_turn_id ON lines(turn_id);
         CREATE INDEX IF NOT EXISTS idx_lines_session_name ON lines(session_name);
         CREATE INDEX IF NOT EXISTS idx_hooks_turn_id ON hook_events(turn_id);",
    )?;
    Ok(())
}

/// v5 -> v6: the `last_line` cursor column, so resume line numbers no
/// longer have to be derived from the row count (skipped lines consume a
/// line number without producing a row).
fn to_v6(conn: &Connection) -> Result<(), StoreError> {
    add_column(conn, "transcript_files", "last_line INTEGER NOT NULL DEFAULT 0")?;
    add_column(conn, "hook_files", "last_line INTEGER NOT NULL DEFAULT 0")?;
    // Best effort for existing rows: the row count is a lower bound.
    conn.execute_batch(
        "UPDATE transcript_files SET last_line = line_count WHERE last_line = 0;
         UPDATE hook_files SET last_line = event_count WHERE last_line = 0;",
    )?;
    Ok(())
}

/// v6 -> v7: hook_events_fts was created as an external-content table bound
/// to columns that do not exist on hook_events. Drop it wholesale, recreate
/// the standalone shape, and backfill from the base table.
fn to_v7(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "DROP TRIGGER IF EXISTS hook_events_fts_ai;
         DROP TRIGGER IF EXISTS hook_events_fts_ad;
         DROP TRIGGER IF EXISTS hook_events_fts_au;
         DROP TABLE IF EXISTS hook_events_fts;",
    )?;
    conn.execute_batch("CREATE VIRTUAL TABLE hook_events_fts USING fts5(content)")?;
    schema::create_hook_fts_triggers(conn)?;
    conn.execute_batch(&format!(
        "INSERT INTO hook_events_fts(rowid, content)
         SELECT id, {} FROM hook_events",
        schema::HOOK_FTS_CONTENT
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    /// Build a store shaped the way version 4 shipped: no turn columns, no
    /// last_line cursors, hook FTS in the broken external-content form.
    fn seed_v4(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT);
             CREATE TABLE lines (
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
                UNIQUE(session_id, uuid)
             );
             CREATE VIRTUAL TABLE lines_fts USING fts5(
                content, session_id UNINDEXED, type UNINDEXED,
                content='lines', content_rowid='id'
             );
             CREATE TABLE transcript_files (
                file_path TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                slug TEXT,
                line_count INTEGER NOT NULL,
                byte_offset INTEGER NOT NULL DEFAULT 0,
                first_timestamp TEXT,
                last_timestamp TEXT,
                indexed_at TEXT NOT NULL
             );
             CREATE TABLE hook_events (
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
                line_number INTEGER NOT NULL
             );
             CREATE VIRTUAL TABLE hook_events_fts USING fts5(
                content, content='hook_events', content_rowid='id'
             );
             CREATE TABLE hook_files (
                file_path TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                session_name TEXT,
                event_count INTEGER NOT NULL,
                byte_offset INTEGER NOT NULL DEFAULT 0,
                first_timestamp TEXT,
                last_timestamp TEXT,
                indexed_at TEXT NOT NULL
             );
             INSERT INTO metadata (key, value) VALUES ('version', '4');",
        )
        .unwrap();
    }

    #[test]
    fn migrates_v4_to_current_preserving_rows() {
        let conn = Connection::open_in_memory().unwrap();
        seed_v4(&conn);

        let k = 5;
        for i in 0..k {
            conn.execute(
                "INSERT INTO lines (session_id, uuid, line_number, type, timestamp, content, raw, file_path)
                 VALUES ('s1', ?1, ?2, 'user', 't', 'row content', '{}', '/f')",
                rusqlite::params![format!("u{i}"), i + 1],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO hook_events (session_id, timestamp, event_type, tool_name, file_path, line_number)
             VALUES ('s1', 't', 'PreToolUse', 'Bash', '/h', 1)",
            [],
        )
        .unwrap();

        crate::schema::initialize(&conn).unwrap();

        let version = crate::schema::stored_version(&conn).unwrap();
        assert_eq!(version, Some(SCHEMA_VERSION));

        let line_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM lines", [], |row| row.get(0))
            .unwrap();
        assert_eq!(line_count, k);

        // Turn columns exist and are null.
        let nulls: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lines WHERE turn_id IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nulls, k);

        // The rebuilt hook FTS was backfilled from existing events.
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM hook_events_fts WHERE hook_events_fts MATCH '\"Bash\"'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn migration_steps_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        seed_v4(&conn);
        crate::schema::initialize(&conn).unwrap();
        // A second initialize finds the current version and applies nothing.
        crate::schema::initialize(&conn).unwrap();
        assert_eq!(
            crate::schema::stored_version(&conn).unwrap(),
            Some(SCHEMA_VERSION)
        );
    }

    #[test]
    fn column_addition_tolerates_existing_column() {
        let conn = Connection::open_in_memory().unwrap();
        seed_v4(&conn);
        to_v5(&conn).unwrap();
        // Running the same step again must not error.
        to_v5(&conn).unwrap();
        assert!(has_column(&conn, "lines", "turn_id").unwrap());
    }

    #[test]
    fn unknown_target_version_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT);
             INSERT INTO metadata (key, value) VALUES ('version', '1');",
        )
        .unwrap();
        assert!(run(&conn, 1).is_err());
    }
}

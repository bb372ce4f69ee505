//! Delta indexing of hook-event files.
//!
//! Same cursor discipline as the transcript path, but hook events have no
//! natural unique key, so exactly-once insertion rests entirely on the
//! savepoint: rows and the advanced cursor commit together or not at all.

use std::path::Path;
use tracing::debug;

use agentdex_core::parse_hook_line;
use agentdex_store::Store;

use crate::delta::{load_cursor, with_savepoint, FileOutcome};
use crate::reader::read_new_lines;
use crate::IndexError;

/// Index everything `path` gained since the last pass.
pub fn index_hook_file(store: &Store, path: &Path) -> Result<FileOutcome, IndexError> {
    let conn = store.conn();
    let cursor = load_cursor(conn, "hook_files", "event_count", path).unwrap_or_default();

    let Some(read) = read_new_lines(path, cursor.byte_offset, cursor.last_line + 1)? else {
        return Ok(FileOutcome {
            rows: 0,
            byte_offset: cursor.byte_offset,
            session_id: None,
        });
    };

    let file_path = path.to_string_lossy().to_string();
    let mut session_id: Option<String> = None;
    let mut session_name: Option<String> = None;
    let mut first_timestamp: Option<String> = None;
    let mut last_timestamp: Option<String> = None;
    let mut inserted = 0usize;

    with_savepoint(conn, "hook_pass", || {
        let mut insert = conn.prepare_cached(
            "INSERT INTO hook_events
             (session_id, timestamp, event_type, tool_use_id, tool_name, decision,
              handler_results, input_json, context_json, file_path, line_number,
              turn_id, turn_sequence, session_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )?;

        for (line_number, raw) in &read.lines {
            let Some(record) = parse_hook_line(raw) else {
                debug!(file = %file_path, line = line_number, "unparseable hook line skipped");
                continue;
            };
            if let Some(sid) = &record.session_id {
                session_id = Some(sid.clone());
            }
            if let Some(name) = &record.session_name {
                session_name = Some(name.clone());
            }
            if !record.timestamp.is_empty() {
                first_timestamp.get_or_insert_with(|| record.timestamp.clone());
                last_timestamp = Some(record.timestamp.clone());
            }

            insert.execute(rusqlite::params![
                record.session_id.as_deref().unwrap_or(""),
                record.timestamp,
                record.kind.as_str(),
                record.tool_use_id,
                record.tool_name,
                record.decision,
                record.handler_results,
                record.input_json,
                record.context_json,
                file_path,
                line_number,
                record.turn_id,
                record.turn_sequence,
                record.session_name,
            ])?;
            inserted += 1;
        }

        conn.execute(
            "INSERT INTO hook_files
             (file_path, session_id, session_name, event_count, last_line, byte_offset,
              first_timestamp, last_timestamp, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(file_path) DO UPDATE SET
                session_id = CASE WHEN excluded.session_id != 'unknown'
                                  THEN excluded.session_id
                                  ELSE hook_files.session_id END,
                session_name = COALESCE(excluded.session_name, hook_files.session_name),
                event_count = excluded.event_count,
                last_line = excluded.last_line,
                byte_offset = excluded.byte_offset,
                first_timestamp = COALESCE(hook_files.first_timestamp,
                                           excluded.first_timestamp),
                last_timestamp = COALESCE(excluded.last_timestamp,
                                          hook_files.last_timestamp),
                indexed_at = excluded.indexed_at",
            rusqlite::params![
                file_path,
                session_id.as_deref().unwrap_or("unknown"),
                session_name,
                cursor.count + inserted as i64,
                read.last_line,
                read.new_offset as i64,
                first_timestamp,
                last_timestamp,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    })?;

    Ok(FileOutcome {
        rows: inserted,
        byte_offset: read.new_offset,
        session_id,
    })
}

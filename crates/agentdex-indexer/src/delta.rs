//! Delta indexing of transcript files, and the whole-family passes.
//!
//! Each file pass indexes only bytes past the stored cursor and commits
//! rows plus the updated cursor in one savepoint: a crash mid-pass leaves
//! the previous cursor intact, and the `(session_id, uuid)` upsert makes
//! the retry harmless.

use rusqlite::Connection;
use std::path::Path;
use tracing::{info, warn};

use agentdex_core::{parse_transcript_line, FileFamily};
use agentdex_store::Store;

use crate::discovery::{self, Roots};
use crate::reader::read_new_lines;
use crate::IndexError;

/// Transcript line types with no searchable content; indexing them would
/// only inflate raw storage. They still consume a line-number slot.
const SKIP_TYPES: &[&str] = &["progress", "file-history-snapshot", "queue-operation"];

/// Outcome of one file pass.
#[derive(Debug, Default)]
pub struct FileOutcome {
    pub rows: usize,
    pub byte_offset: u64,
    pub session_id: Option<String>,
}

/// Outcome of a whole-family pass.
#[derive(Debug, Default)]
pub struct FamilyOutcome {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub rows: usize,
}

/// Stored per-file resume state.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Cursor {
    pub byte_offset: u64,
    pub last_line: i64,
    pub count: i64,
}

pub(crate) fn load_cursor(
    conn: &Connection,
    table: &str,
    count_column: &str,
    path: &Path,
) -> Option<Cursor> {
    conn.query_row(
        &format!("SELECT byte_offset, last_line, {count_column} FROM {table} WHERE file_path = ?1"),
        [path.to_string_lossy()],
        |row| {
            Ok(Cursor {
                byte_offset: row.get::<_, i64>(0)? as u64,
                last_line: row.get(1)?,
                count: row.get(2)?,
            })
        },
    )
    .ok()
}

/// Run `f` inside a savepoint, rolling back on error.
pub(crate) fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce() -> Result<T, IndexError>,
) -> Result<T, IndexError> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"));
            Err(e)
        }
    }
}

/// Index everything `path` gained since the last pass (everything, for a
/// new file). Idempotent when the file has not grown.
pub fn index_transcript_file(store: &Store, path: &Path) -> Result<FileOutcome, IndexError> {
    let conn = store.conn();
    let cursor = load_cursor(conn, "transcript_files", "line_count", path).unwrap_or_default();

    let Some(read) = read_new_lines(path, cursor.byte_offset, cursor.last_line + 1)? else {
        return Ok(FileOutcome {
            rows: 0,
            byte_offset: cursor.byte_offset,
            session_id: None,
        });
    };

    let file_path = path.to_string_lossy().to_string();
    let mut session_id: Option<String> = None;
    let mut slug: Option<String> = None;
    let mut first_timestamp: Option<String> = None;
    let mut last_timestamp: Option<String> = None;
    let mut inserted = 0usize;

    with_savepoint(conn, "transcript_pass", || {
        let mut insert = conn.prepare_cached(
            "INSERT OR REPLACE INTO lines
             (session_id, uuid, parent_uuid, line_number, type, subtype, timestamp,
              slug, role, model, cwd, content, raw, file_path,
              turn_id, turn_sequence, session_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     NULL, NULL, NULL)",
        )?;

        for (line_number, raw) in &read.lines {
            let Some(record) = parse_transcript_line(raw) else {
                continue; // malformed; the line number was still consumed
            };
            if let Some(sid) = &record.session_id {
                session_id = Some(sid.clone());
            }
            if let Some(s) = &record.slug {
                slug = Some(s.clone());
            }
            if !record.timestamp.is_empty() {
                first_timestamp.get_or_insert_with(|| record.timestamp.clone());
                last_timestamp = Some(record.timestamp.clone());
            }
            if SKIP_TYPES.contains(&record.kind.as_str()) {
                continue;
            }

            let uuid = record
                .uuid
                .clone()
                .unwrap_or_else(|| format!("line-{line_number}"));

            insert.execute(rusqlite::params![
                record.session_id.as_deref().unwrap_or(""),
                uuid,
                record.parent_uuid,
                line_number,
                record.kind.as_str(),
                record.subtype,
                record.timestamp,
                record.slug,
                record.role,
                record.model,
                record.cwd,
                record.content,
                record.raw,
                file_path,
            ])?;
            inserted += 1;
        }

        conn.execute(
            "INSERT INTO transcript_files
             (file_path, session_id, slug, line_count, last_line, byte_offset,
              first_timestamp, last_timestamp, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(file_path) DO UPDATE SET
                session_id = CASE WHEN excluded.session_id != 'unknown'
                                  THEN excluded.session_id
                                  ELSE transcript_files.session_id END,
                slug = COALESCE(excluded.slug, transcript_files.slug),
                line_count = excluded.line_count,
                last_line = excluded.last_line,
                byte_offset = excluded.byte_offset,
                first_timestamp = COALESCE(transcript_files.first_timestamp,
                                           excluded.first_timestamp),
                last_timestamp = COALESCE(excluded.last_timestamp,
                                          transcript_files.last_timestamp),
                indexed_at = excluded.indexed_at",
            rusqlite::params![
                file_path,
                session_id.as_deref().unwrap_or("unknown"),
                slug,
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

/// One pass over every file of a family: delta for known files, full for
/// new ones. Per-file failures are logged and skipped; the pass continues.
pub fn index_once(
    store: &Store,
    roots: &Roots,
    family: FileFamily,
) -> Result<FamilyOutcome, IndexError> {
    let report = discovery::scan(roots.for_family(family), family);
    for scan_err in &report.errors {
        warn!(dir = %scan_err.dir.display(), error = %scan_err.error, "directory skipped");
    }

    let mut outcome = FamilyOutcome {
        files_seen: report.files.len(),
        ..Default::default()
    };

    for file in &report.files {
        let result = match family {
            FileFamily::Transcripts => index_transcript_file(store, file),
            FileFamily::HookEvents => crate::hooks::index_hook_file(store, file),
        };
        match result {
            Ok(r) if r.rows > 0 => {
                outcome.files_indexed += 1;
                outcome.rows += r.rows;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(file = %file.display(), error = %e, "file skipped this pass");
            }
        }
    }

    store.touch_last_indexed()?;
    info!(
        family = ?family,
        files = outcome.files_indexed,
        rows = outcome.rows,
        "indexing pass complete"
    );
    Ok(outcome)
}

/// Drop all indexed rows and re-index both families from byte zero.
/// The recovery path when `is_ready()` fails or the index is suspect.
pub fn rebuild(store: &Store, roots: &Roots) -> Result<(FamilyOutcome, FamilyOutcome), IndexError> {
    store.clear_indexed_data()?;
    let transcripts = index_once(store, roots, FileFamily::Transcripts)?;
    let hooks = index_once(store, roots, FileFamily::HookEvents)?;
    crate::correlate::correlate_turns(store, None)?;
    Ok((transcripts, hooks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdex_store::Store;
    use std::fs;
    use std::io::Write;

    fn line(session: &str, uuid: &str, ts: &str, content: &str) -> String {
        format!(
            r#"{{"sessionId":"{session}","uuid":"{uuid}","type":"user","timestamp":"{ts}","message":{{"role":"user","content":"{content}"}}}}"#
        )
    }

    fn append(path: &Path, text: &str) {
        let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn full_index_writes_rows_and_cursor() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        fs::write(
            &path,
            format!(
                "{}\n{}\n",
                line("s1", "u1", "2024-01-01T00:00:00Z", "hello"),
                line("s1", "u2", "2024-01-01T00:00:01Z", "world"),
            ),
        )
        .unwrap();

        let outcome = index_transcript_file(&store, &path).unwrap();
        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.session_id.as_deref(), Some("s1"));
        assert_eq!(outcome.byte_offset, fs::metadata(&path).unwrap().len());

        let (count, offset): (i64, i64) = store
            .conn()
            .query_row(
                "SELECT line_count, byte_offset FROM transcript_files WHERE session_id = 's1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(offset as u64, outcome.byte_offset);
    }

    #[test]
    fn second_pass_without_growth_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        fs::write(&path, line("s1", "u1", "t", "once") + "\n").unwrap();

        let first = index_transcript_file(&store, &path).unwrap();
        let second = index_transcript_file(&store, &path).unwrap();
        assert_eq!(second.rows, 0);
        assert_eq!(second.byte_offset, first.byte_offset);

        let rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn resume_indexes_exactly_the_appended_lines() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        fs::write(&path, line("s1", "u1", "t1", "first") + "\n").unwrap();
        index_transcript_file(&store, &path).unwrap();

        append(&path, &(line("s1", "u2", "t2", "second") + "\n"));
        append(&path, &(line("s1", "u3", "t3", "third") + "\n"));

        let outcome = index_transcript_file(&store, &path).unwrap();
        assert_eq!(outcome.rows, 2);

        let rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 3);

        // (session_id, uuid) stays unique even if a pass is replayed.
        store
            .conn()
            .execute("DELETE FROM transcript_files", [])
            .unwrap();
        index_transcript_file(&store, &path).unwrap();
        let rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 3);
    }

    #[test]
    fn malformed_line_consumes_a_line_number_slot() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        fs::write(
            &path,
            format!(
                "{}\n{}\nnot valid json\n{}\n",
                line("s1", "u1", "t1", "one"),
                line("s1", "u2", "t2", "two"),
                line("s1", "u3", "t3", "three"),
            ),
        )
        .unwrap();

        let outcome = index_transcript_file(&store, &path).unwrap();
        assert_eq!(outcome.rows, 3);

        let count: i64 = store
            .conn()
            .query_row(
                "SELECT line_count FROM transcript_files WHERE file_path = ?1",
                [path.to_string_lossy()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);

        // The malformed line held slot 4, so the next valid line gets 5.
        append(&path, &(line("s1", "u4", "t4", "four") + "\n"));
        index_transcript_file(&store, &path).unwrap();
        let number: i64 = store
            .conn()
            .query_row(
                "SELECT line_number FROM lines WHERE uuid = 'u4'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(number, 5);
    }

    #[test]
    fn duplicate_uuid_across_files_leaves_one_fts_entry() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.jsonl");
        let b = tmp.path().join("b.jsonl");
        fs::write(&a, line("s1", "u1", "t1", "needle first") + "\n").unwrap();
        fs::write(&b, line("s1", "u1", "t2", "needle second") + "\n").unwrap();

        index_transcript_file(&store, &a).unwrap();
        index_transcript_file(&store, &b).unwrap();

        let rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        // The replaced row must not leave a ghost behind in the FTS index.
        let hits: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM lines_fts WHERE lines_fts MATCH '\"needle\"'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);

        let content: String = store
            .conn()
            .query_row("SELECT content FROM lines WHERE uuid = 'u1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(content, "needle second");
    }

    #[test]
    fn non_searchable_types_are_not_stored() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        fs::write(
            &path,
            format!(
                "{}\n{}\n{}\n",
                line("s1", "u1", "t1", "kept"),
                r#"{"sessionId":"s1","uuid":"u2","type":"progress","timestamp":"t2"}"#,
                r#"{"sessionId":"s1","uuid":"u3","type":"file-history-snapshot","timestamp":"t3"}"#,
            ),
        )
        .unwrap();

        let outcome = index_transcript_file(&store, &path).unwrap();
        assert_eq!(outcome.rows, 1);
        let rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn index_once_walks_the_tree_and_stamps_metadata() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("proj");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("a.jsonl"), line("s1", "u1", "t1", "x") + "\n").unwrap();
        fs::write(project.join("b.jsonl"), line("s2", "u1", "t1", "y") + "\n").unwrap();

        let roots = Roots {
            transcripts: tmp.path().to_path_buf(),
            hooks: tmp.path().join("none"),
        };
        let outcome = index_once(&store, &roots, FileFamily::Transcripts).unwrap();
        assert_eq!(outcome.files_seen, 2);
        assert_eq!(outcome.files_indexed, 2);
        assert_eq!(outcome.rows, 2);
        assert!(store.metadata("last_indexed").unwrap().is_some());
    }

    #[test]
    fn rebuild_drops_and_reindexes() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        fs::write(&path, line("s1", "u1", "t1", "original") + "\n").unwrap();

        let roots = Roots {
            transcripts: tmp.path().to_path_buf(),
            hooks: tmp.path().join("hooks"),
        };
        index_once(&store, &roots, FileFamily::Transcripts).unwrap();
        let (transcripts, _) = rebuild(&store, &roots).unwrap();
        assert_eq!(transcripts.rows, 1);

        let rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}

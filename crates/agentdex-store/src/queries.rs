//! Read queries over indexed rows. All methods are read-only; the indexer
//! crate owns every write.

use agentdex_core::{HookEvent, HookKind, LineFilter, LineKind, Order, TranscriptLine};
use rusqlite::Row;

use crate::store::{Store, StoreError};

const LINE_COLUMNS: &str = "id, session_id, uuid, parent_uuid, line_number, type, subtype, \
     timestamp, slug, role, model, cwd, content, raw, file_path, \
     turn_id, turn_sequence, session_name";

const HOOK_COLUMNS: &str = "id, session_id, timestamp, event_type, tool_use_id, tool_name, \
     decision, handler_results, input_json, context_json, file_path, \
     line_number, turn_id, turn_sequence, session_name";

pub(crate) fn row_to_line(row: &Row) -> rusqlite::Result<TranscriptLine> {
    let type_str: String = row.get(5)?;
    Ok(TranscriptLine {
        id: row.get(0)?,
        session_id: row.get(1)?,
        uuid: row.get(2)?,
        parent_uuid: row.get(3)?,
        line_number: row.get(4)?,
        kind: LineKind::from_type(&type_str),
        subtype: row.get(6)?,
        timestamp: row.get(7)?,
        slug: row.get(8)?,
        role: row.get(9)?,
        model: row.get(10)?,
        cwd: row.get(11)?,
        content: row.get(12)?,
        raw: row.get(13)?,
        file_path: row.get(14)?,
        turn_id: row.get(15)?,
        turn_sequence: row.get(16)?,
        session_name: row.get(17)?,
    })
}

pub(crate) fn row_to_hook_event(row: &Row) -> rusqlite::Result<HookEvent> {
    let event_type: String = row.get(3)?;
    Ok(HookEvent {
        id: row.get(0)?,
        session_id: row.get(1)?,
        timestamp: row.get(2)?,
        kind: HookKind::from_event_type(&event_type),
        tool_use_id: row.get(4)?,
        tool_name: row.get(5)?,
        decision: row.get(6)?,
        handler_results: row.get(7)?,
        input_json: row.get(8)?,
        context_json: row.get(9)?,
        file_path: row.get(10)?,
        line_number: row.get(11)?,
        turn_id: row.get(12)?,
        turn_sequence: row.get(13)?,
        session_name: row.get(14)?,
    })
}

/// One source file's worth of session state, from `transcript_files`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub slug: Option<String>,
    pub session_name: Option<String>,
    pub file_path: String,
    pub line_count: i64,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub indexed_at: String,
}

impl Store {
    /// Lines matching a filter, ordered by line number.
    pub fn get_lines(&self, filter: &LineFilter) -> Result<Vec<TranscriptLine>, StoreError> {
        let mut sql = format!("SELECT {LINE_COLUMNS} FROM lines WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(session_id) = &filter.session_id {
            sql.push_str(" AND session_id = ?");
            params.push(Box::new(session_id.clone()));
        }
        if let Some(types) = &filter.types {
            if !types.is_empty() {
                let placeholders = vec!["?"; types.len()].join(",");
                sql.push_str(&format!(" AND type IN ({placeholders})"));
                for t in types {
                    params.push(Box::new(t.clone()));
                }
            }
        }
        if let Some(from_time) = &filter.from_time {
            sql.push_str(" AND timestamp >= ?");
            params.push(Box::new(from_time.clone()));
        }
        if let Some(to_time) = &filter.to_time {
            sql.push_str(" AND timestamp <= ?");
            params.push(Box::new(to_time.clone()));
        }

        sql.push_str(match filter.order {
            Order::Asc => " ORDER BY line_number ASC",
            Order::Desc => " ORDER BY line_number DESC",
        });
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit));
        } else if filter.offset.is_some() {
            // SQLite rejects OFFSET without LIMIT; -1 means unbounded.
            sql.push_str(" LIMIT -1");
        }
        if let Some(offset) = filter.offset {
            sql.push_str(" OFFSET ?");
            params.push(Box::new(offset));
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_line)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Lines inserted after a known row id; the tail/poll primitive for
    /// live-view callers.
    pub fn get_lines_after_id(
        &self,
        after_id: i64,
        session_id: Option<&str>,
    ) -> Result<Vec<TranscriptLine>, StoreError> {
        let mut sql = format!("SELECT {LINE_COLUMNS} FROM lines WHERE id > ?1");
        if session_id.is_some() {
            sql.push_str(" AND session_id = ?2");
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = match session_id {
            Some(sid) => stmt.query_map(rusqlite::params![after_id, sid], row_to_line)?,
            None => stmt.query_map(rusqlite::params![after_id], row_to_line)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Hook events for a session, append order.
    pub fn get_hook_events(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<HookEvent>, StoreError> {
        let mut sql = format!(
            "SELECT {HOOK_COLUMNS} FROM hook_events WHERE session_id = ?1 ORDER BY id ASC"
        );
        if limit.is_some() {
            sql.push_str(" LIMIT ?2");
        }
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = match limit {
            Some(n) => stmt.query_map(rusqlite::params![session_id, n], row_to_hook_event)?,
            None => stmt.query_map(rusqlite::params![session_id], row_to_hook_event)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recently active sessions, one row per source file.
    pub fn list_sessions(&self, limit: i64) -> Result<Vec<SessionSummary>, StoreError> {
        let mut stmt = self.conn().prepare(
            "SELECT tf.session_id, tf.slug, tf.file_path, tf.line_count,
                    tf.first_timestamp, tf.last_timestamp, tf.indexed_at,
                    (SELECT session_name FROM hook_events he
                     WHERE he.session_id = tf.session_id
                       AND he.session_name IS NOT NULL
                     ORDER BY he.timestamp DESC LIMIT 1) AS session_name
             FROM transcript_files tf
             ORDER BY tf.last_timestamp DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(SessionSummary {
                session_id: row.get(0)?,
                slug: row.get(1)?,
                session_name: row.get(7)?,
                file_path: row.get(2)?,
                line_count: row.get(3)?,
                first_timestamp: row.get(4)?,
                last_timestamp: row.get(5)?,
                indexed_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Look a session up by id, slug, or assigned name.
    pub fn get_session(&self, id_or_slug: &str) -> Result<Option<SessionSummary>, StoreError> {
        let mut stmt = self.conn().prepare(
            "SELECT tf.session_id, tf.slug, tf.file_path, tf.line_count,
                    tf.first_timestamp, tf.last_timestamp, tf.indexed_at
             FROM transcript_files tf
             WHERE tf.session_id = ?1 OR tf.slug = ?1
             ORDER BY tf.last_timestamp DESC
             LIMIT 1",
        )?;

        let mut summary = stmt
            .query_row([id_or_slug], |row| {
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    slug: row.get(1)?,
                    session_name: None,
                    file_path: row.get(2)?,
                    line_count: row.get(3)?,
                    first_timestamp: row.get(4)?,
                    last_timestamp: row.get(5)?,
                    indexed_at: row.get(6)?,
                })
            })
            .ok();

        // A name assigned by hook handlers also resolves the session.
        if summary.is_none() {
            let by_name: Option<String> = self
                .conn()
                .query_row(
                    "SELECT session_id FROM hook_events
                     WHERE session_name = ?1
                     ORDER BY timestamp DESC LIMIT 1",
                    [id_or_slug],
                    |row| row.get(0),
                )
                .ok();
            if let Some(sid) = by_name {
                return self.get_session(&sid);
            }
            return Ok(None);
        }

        if let Some(s) = summary.as_mut() {
            s.session_name = self
                .conn()
                .query_row(
                    "SELECT session_name FROM hook_events
                     WHERE session_id = ?1 AND session_name IS NOT NULL
                     ORDER BY timestamp DESC LIMIT 1",
                    [&s.session_id],
                    |row| row.get(0),
                )
                .ok();
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdex_core::LineFilter;

    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn();
        for (uuid, number, kind, ts, content) in [
            ("u1", 1, "user", "2024-01-01T00:00:00Z", "first"),
            ("u2", 2, "assistant", "2024-01-01T00:00:01Z", "second"),
            ("u3", 3, "user", "2024-01-01T00:00:02Z", "third"),
        ] {
            conn.execute(
                "INSERT INTO lines (session_id, uuid, line_number, type, timestamp, content, raw, file_path)
                 VALUES ('s1', ?1, ?2, ?3, ?4, ?5, '{}', '/f')",
                rusqlite::params![uuid, number, kind, ts, content],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO transcript_files (file_path, session_id, slug, line_count, last_line, byte_offset, indexed_at)
             VALUES ('/f', 's1', 'fix-parser', 3, 3, 100, 'now')",
            [],
        )
        .unwrap();
        store
    }

    #[test]
    fn filter_by_type_and_limit() {
        let store = seeded_store();
        let filter = LineFilter {
            types: Some(vec!["user".into()]),
            ..LineFilter::for_session("s1")
        };
        let lines = store.get_lines(&filter).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].uuid, "u1");

        let lines = store.get_lines(&LineFilter::for_session("s1").with_limit(1)).unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn offset_without_limit_is_valid() {
        let store = seeded_store();
        let filter = LineFilter {
            offset: Some(1),
            ..Default::default()
        };
        let lines = store.get_lines(&filter).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].uuid, "u2");

        let none_skipped = store
            .get_lines(&LineFilter {
                offset: Some(0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(none_skipped.len(), 3);
    }

    #[test]
    fn lines_after_id_returns_only_newer_rows() {
        let store = seeded_store();
        let all = store.get_lines(&LineFilter::default()).unwrap();
        let first_id = all[0].id;
        let newer = store.get_lines_after_id(first_id, Some("s1")).unwrap();
        assert_eq!(newer.len(), 2);
        assert!(newer.iter().all(|l| l.id > first_id));
    }

    #[test]
    fn session_lookup_by_id_and_slug() {
        let store = seeded_store();
        let by_id = store.get_session("s1").unwrap().unwrap();
        assert_eq!(by_id.line_count, 3);
        let by_slug = store.get_session("fix-parser").unwrap().unwrap();
        assert_eq!(by_slug.session_id, "s1");
        assert!(store.get_session("nope").unwrap().is_none());
    }

    #[test]
    fn list_sessions_newest_first() {
        let store = seeded_store();
        store
            .conn()
            .execute(
                "INSERT INTO transcript_files (file_path, session_id, line_count, last_line, byte_offset, last_timestamp, indexed_at)
                 VALUES ('/g', 's2', 1, 1, 10, '2024-06-01T00:00:00Z', 'now')",
                [],
            )
            .unwrap();
        store
            .conn()
            .execute(
                "UPDATE transcript_files SET last_timestamp = '2024-01-01T00:00:02Z' WHERE file_path = '/f'",
                [],
            )
            .unwrap();

        let sessions = store.list_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "s2");
        assert_eq!(store.list_sessions(1).unwrap().len(), 1);
    }

    #[test]
    fn session_lookup_by_hook_assigned_name() {
        let store = seeded_store();
        store
            .conn()
            .execute(
                "INSERT INTO hook_events (session_id, timestamp, event_type, file_path, line_number, session_name)
                 VALUES ('s1', 't', 'SessionStart', '/h', 1, 'brave-otter')",
                [],
            )
            .unwrap();
        let found = store.get_session("brave-otter").unwrap().unwrap();
        assert_eq!(found.session_id, "s1");
        assert_eq!(found.session_name.as_deref(), Some("brave-otter"));
    }
}

//! Turn correlation: stamp transcript lines with the turn ids and session
//! names recorded by hook events.
//!
//! The pass only ever fills NULL columns, so it is idempotent and safe to
//! run after every delta pass. Three strategies, best first:
//!
//! 1. `Stop` events carry a turn id and mark the end of a turn; every
//!    unstamped line at or before the stop timestamp belongs to that turn.
//! 2. Without stops, tool events (`PreToolUse`/`PostToolUse`) grouped by
//!    turn give approximate time windows.
//! 3. With no turn data at all, at least the session name is backfilled.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use agentdex_store::Store;

use crate::IndexError;

/// External provider of display names for sessions the hook log never named.
pub trait SessionNameSource {
    fn name_for(&self, session_id: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct CorrelationOutcome {
    pub sessions: usize,
    pub lines_updated: usize,
}

/// Correlate every session that still has unstamped lines.
pub fn correlate_turns(
    store: &Store,
    names: Option<&dyn SessionNameSource>,
) -> Result<CorrelationOutcome, IndexError> {
    let conn = store.conn();

    let sessions: Vec<String> = conn
        .prepare(
            "SELECT DISTINCT session_id FROM lines
             WHERE turn_id IS NULL AND session_id != ''",
        )?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    let mut outcome = CorrelationOutcome::default();
    for session_id in &sessions {
        outcome.sessions += 1;
        outcome.lines_updated += correlate_session(conn, session_id, names)?;
    }

    debug!(
        sessions = outcome.sessions,
        lines = outcome.lines_updated,
        "correlation pass complete"
    );
    Ok(outcome)
}

fn correlate_session(
    conn: &Connection,
    session_id: &str,
    names: Option<&dyn SessionNameSource>,
) -> Result<usize, IndexError> {
    let session_name = hook_session_name(conn, session_id)?
        .or_else(|| names.and_then(|n| n.name_for(session_id)));

    let stops: Vec<(String, String, Option<i64>)> = conn
        .prepare(
            "SELECT timestamp, turn_id, turn_sequence FROM hook_events
             WHERE session_id = ?1 AND event_type = 'Stop' AND turn_id IS NOT NULL
             ORDER BY timestamp ASC",
        )?
        .query_map([session_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<_, _>>()?;

    if !stops.is_empty() {
        return correlate_by_stops(conn, session_id, &stops, session_name.as_deref());
    }

    let windows: Vec<(String, Option<i64>, String)> = conn
        .prepare(
            "SELECT turn_id, turn_sequence, MIN(timestamp) FROM hook_events
             WHERE session_id = ?1
               AND event_type IN ('PreToolUse', 'PostToolUse')
               AND turn_id IS NOT NULL
             GROUP BY turn_id, turn_sequence
             ORDER BY MIN(timestamp) ASC",
        )?
        .query_map([session_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<_, _>>()?;

    if !windows.is_empty() {
        return correlate_by_tool_windows(conn, session_id, &windows, session_name.as_deref());
    }

    // No turn data; backfill the name so session listings stay usable.
    let Some(name) = session_name else {
        return Ok(0);
    };
    let updated = conn.execute(
        "UPDATE lines SET session_name = ?1
         WHERE session_id = ?2 AND session_name IS NULL",
        params![name, session_id],
    )?;
    Ok(updated)
}

/// The hook log's own name for a session, from its latest SessionStart.
fn hook_session_name(
    conn: &Connection,
    session_id: &str,
) -> Result<Option<String>, IndexError> {
    let name = conn
        .query_row(
            "SELECT session_name FROM hook_events
             WHERE session_id = ?1 AND event_type = 'SessionStart'
               AND session_name IS NOT NULL
             ORDER BY timestamp DESC LIMIT 1",
            [session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}

/// Each stop closes the turn containing every unstamped line since the
/// previous stop. Lines after the final stop get the name only; their turn
/// is still open.
fn correlate_by_stops(
    conn: &Connection,
    session_id: &str,
    stops: &[(String, String, Option<i64>)],
    session_name: Option<&str>,
) -> Result<usize, IndexError> {
    let mut updated = 0;
    let mut prev_ts: Option<&str> = None;

    for (stop_ts, turn_id, turn_sequence) in stops {
        updated += match prev_ts {
            None => conn.execute(
                "UPDATE lines
                 SET turn_id = ?1, turn_sequence = ?2,
                     session_name = COALESCE(session_name, ?3)
                 WHERE session_id = ?4 AND turn_id IS NULL AND timestamp <= ?5",
                params![turn_id, turn_sequence, session_name, session_id, stop_ts],
            )?,
            Some(prev) => conn.execute(
                "UPDATE lines
                 SET turn_id = ?1, turn_sequence = ?2,
                     session_name = COALESCE(session_name, ?3)
                 WHERE session_id = ?4 AND turn_id IS NULL
                   AND timestamp > ?5 AND timestamp <= ?6",
                params![turn_id, turn_sequence, session_name, session_id, prev, stop_ts],
            )?,
        };
        prev_ts = Some(stop_ts);
    }

    if let (Some(name), Some(last)) = (session_name, prev_ts) {
        updated += conn.execute(
            "UPDATE lines SET session_name = ?1
             WHERE session_id = ?2 AND timestamp > ?3 AND session_name IS NULL",
            params![name, session_id, last],
        )?;
    }
    Ok(updated)
}

/// Assign each turn the window from its first tool event to the next turn's
/// first tool event. The windows can under-cover lines before the first tool
/// call of a session; stops are the accurate source when present.
fn correlate_by_tool_windows(
    conn: &Connection,
    session_id: &str,
    windows: &[(String, Option<i64>, String)],
    session_name: Option<&str>,
) -> Result<usize, IndexError> {
    let mut updated = 0;

    for (i, (turn_id, turn_sequence, start)) in windows.iter().enumerate() {
        let next_start = windows.get(i + 1).map(|w| w.2.as_str());
        updated += match next_start {
            Some(next) => conn.execute(
                "UPDATE lines
                 SET turn_id = ?1, turn_sequence = ?2,
                     session_name = COALESCE(session_name, ?3)
                 WHERE session_id = ?4 AND turn_id IS NULL
                   AND timestamp >= ?5 AND timestamp < ?6",
                params![turn_id, turn_sequence, session_name, session_id, start, next],
            )?,
            None => conn.execute(
                "UPDATE lines
                 SET turn_id = ?1, turn_sequence = ?2,
                     session_name = COALESCE(session_name, ?3)
                 WHERE session_id = ?4 AND turn_id IS NULL AND timestamp >= ?5",
                params![turn_id, turn_sequence, session_name, session_id, start],
            )?,
        };
    }

    if let Some(name) = session_name {
        updated += conn.execute(
            "UPDATE lines SET session_name = ?1
             WHERE session_id = ?2 AND session_name IS NULL",
            params![name, session_id],
        )?;
    }
    Ok(updated)
}

//! Ranked full-text search: single-source and unified multi-source.

use agentdex_core::{HookEvent, TranscriptLine};
use tracing::debug;

use crate::queries::{row_to_hook_event, row_to_line};
use crate::store::{Store, StoreError};

/// Search behavior knobs. The highlight markers wrap matched terms inside
/// snippets.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: i64,
    pub types: Option<Vec<String>>,
    pub session_ids: Option<Vec<String>>,
    pub highlight_start: String,
    pub highlight_end: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            types: None,
            session_ids: None,
            highlight_start: "[".to_string(),
            highlight_end: "]".to_string(),
        }
    }
}

/// A ranked transcript-line hit. Lower rank is better (bm25).
#[derive(Debug, Clone)]
pub struct LineHit {
    pub line: TranscriptLine,
    pub rank: f64,
    pub snippet: String,
}

/// A ranked hook-event hit.
#[derive(Debug, Clone)]
pub struct HookHit {
    pub event: HookEvent,
    pub rank: f64,
    pub snippet: String,
}

/// Row shape of a unified-search source; decides how base-table rows are
/// normalized into `UnifiedHit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    TranscriptLines,
    HookEvents,
}

/// One independently-registered searchable table.
#[derive(Debug, Clone)]
pub struct SearchSource {
    pub name: String,
    pub icon: String,
    pub fts_table: String,
    pub base_table: String,
    pub join_column: String,
    pub shape: SourceShape,
}

/// The two built-in sources.
pub fn default_sources() -> Vec<SearchSource> {
    vec![
        SearchSource {
            name: "transcript".to_string(),
            icon: "💬".to_string(),
            fts_table: "lines_fts".to_string(),
            base_table: "lines".to_string(),
            join_column: "id".to_string(),
            shape: SourceShape::TranscriptLines,
        },
        SearchSource {
            name: "hooks".to_string(),
            icon: "🪝".to_string(),
            fts_table: "hook_events_fts".to_string(),
            base_table: "hook_events".to_string(),
            join_column: "id".to_string(),
            shape: SourceShape::HookEvents,
        },
    ]
}

/// One normalized row of a unified search, regardless of source shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnifiedHit {
    pub source: String,
    pub icon: String,
    pub session_id: String,
    pub session_name: Option<String>,
    pub timestamp: String,
    pub entry_type: String,
    pub matched: String,
    pub content: String,
    pub rank: f64,
}

/// Tokenize on whitespace, strip quote characters, OR-combine quoted terms.
/// `None` when the query has no usable tokens.
fn build_match_expr(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|w| w.replace('"', ""))
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{w}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

impl Store {
    /// Ranked search over transcript lines (bm25 ascending, best first).
    pub fn search_lines(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<LineHit>, StoreError> {
        let Some(match_expr) = build_match_expr(query) else {
            return Ok(Vec::new());
        };

        let mut sql = String::from(
            "SELECT l.id, l.session_id, l.uuid, l.parent_uuid, l.line_number, l.type,
                    l.subtype, l.timestamp, l.slug, l.role, l.model, l.cwd, l.content,
                    l.raw, l.file_path, l.turn_id, l.turn_sequence, l.session_name,
                    bm25(lines_fts) AS rank,
                    snippet(lines_fts, 0, ?1, ?2, '…', 12) AS snip
             FROM lines_fts
             JOIN lines l ON lines_fts.rowid = l.id
             WHERE lines_fts MATCH ?3",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(options.highlight_start.clone()),
            Box::new(options.highlight_end.clone()),
            Box::new(match_expr),
        ];

        append_in_clause(&mut sql, &mut params, "l.type", options.types.as_deref());
        append_in_clause(
            &mut sql,
            &mut params,
            "l.session_id",
            options.session_ids.as_deref(),
        );

        sql.push_str(" ORDER BY rank LIMIT ?");
        params.push(Box::new(options.limit));

        let mut stmt = self.conn().prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(LineHit {
                line: row_to_line(row)?,
                rank: row.get(18)?,
                snippet: row.get(19)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Ranked search over hook events.
    pub fn search_hook_events(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<HookHit>, StoreError> {
        let Some(match_expr) = build_match_expr(query) else {
            return Ok(Vec::new());
        };

        let mut sql = String::from(
            "SELECT h.id, h.session_id, h.timestamp, h.event_type, h.tool_use_id,
                    h.tool_name, h.decision, h.handler_results, h.input_json,
                    h.context_json, h.file_path, h.line_number, h.turn_id,
                    h.turn_sequence, h.session_name,
                    bm25(hook_events_fts) AS rank,
                    snippet(hook_events_fts, 0, ?1, ?2, '…', 12) AS snip
             FROM hook_events_fts
             JOIN hook_events h ON hook_events_fts.rowid = h.id
             WHERE hook_events_fts MATCH ?3",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(options.highlight_start.clone()),
            Box::new(options.highlight_end.clone()),
            Box::new(match_expr),
        ];

        append_in_clause(&mut sql, &mut params, "h.event_type", options.types.as_deref());
        append_in_clause(
            &mut sql,
            &mut params,
            "h.session_id",
            options.session_ids.as_deref(),
        );

        sql.push_str(" ORDER BY rank LIMIT ?");
        params.push(Box::new(options.limit));

        let mut stmt = self.conn().prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(HookHit {
                event: row_to_hook_event(row)?,
                rank: row.get(15)?,
                snippet: row.get(16)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Search every registered source and merge into one list sorted by
    /// timestamp descending (most recent first), not per-source relevance.
    ///
    /// A source whose fts table is absent (an optional adapter that never
    /// indexed anything) contributes zero results instead of failing the
    /// whole query. Per-source cap is `ceil(limit / source_count)`.
    pub fn search_unified(
        &self,
        query: &str,
        sources: &[SearchSource],
        options: &SearchOptions,
    ) -> Result<Vec<UnifiedHit>, StoreError> {
        let Some(match_expr) = build_match_expr(query) else {
            return Ok(Vec::new());
        };
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let per_source = (options.limit + sources.len() as i64 - 1) / sources.len() as i64;
        let mut hits: Vec<UnifiedHit> = Vec::new();

        for source in sources {
            match self.search_one_source(source, &match_expr, per_source, options) {
                Ok(mut source_hits) => hits.append(&mut source_hits),
                Err(e) => {
                    debug!(source = %source.name, error = %e, "unified search source skipped");
                }
            }
        }

        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(options.limit.max(0) as usize);
        Ok(hits)
    }

    fn search_one_source(
        &self,
        source: &SearchSource,
        match_expr: &str,
        limit: i64,
        options: &SearchOptions,
    ) -> Result<Vec<UnifiedHit>, StoreError> {
        let (entry_type_col, content_expr) = match source.shape {
            SourceShape::TranscriptLines => ("b.type", "COALESCE(b.content, '')".to_string()),
            SourceShape::HookEvents => (
                "b.event_type",
                "COALESCE(b.tool_name, '') || ' ' || b.event_type".to_string(),
            ),
        };

        let sql = format!(
            "SELECT b.session_id, b.session_name, b.timestamp, {entry_type_col},
                    {content_expr},
                    snippet({fts}, 0, ?1, ?2, '…', 12),
                    bm25({fts})
             FROM {fts}
             JOIN {base} b ON {fts}.rowid = b.{join}
             WHERE {fts} MATCH ?3
             ORDER BY bm25({fts})
             LIMIT ?4",
            fts = source.fts_table,
            base = source.base_table,
            join = source.join_column,
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![
                options.highlight_start,
                options.highlight_end,
                match_expr,
                limit
            ],
            |row| {
                Ok(UnifiedHit {
                    source: source.name.clone(),
                    icon: source.icon.clone(),
                    session_id: row.get(0)?,
                    session_name: row.get(1)?,
                    timestamp: row.get(2)?,
                    entry_type: row.get(3)?,
                    content: row.get(4)?,
                    matched: row.get(5)?,
                    rank: row.get(6)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn append_in_clause(
    sql: &mut String,
    params: &mut Vec<Box<dyn rusqlite::ToSql>>,
    column: &str,
    values: Option<&[String]>,
) {
    if let Some(values) = values {
        if !values.is_empty() {
            let placeholders = vec!["?"; values.len()].join(",");
            sql.push_str(&format!(" AND {column} IN ({placeholders})"));
            for v in values {
                params.push(Box::new(v.clone()));
            }
        }
    }
}

//! Per-line JSONL parsing for both log families.
//!
//! A line parses to a typed record, or to `None` when it is malformed or
//! not a JSON object. Skipped lines still consume a line-number slot in the
//! indexer, so resume logic stays position-accurate; deciding that is the
//! caller's job, not this module's.

use serde_json::Value;

use crate::text_extract::extract_searchable_text;
use crate::types::{HookKind, LineKind};

/// Handler-result keys are suffixed by event type, so matching is by prefix.
const TURN_TRACKER_PREFIX: &str = "turn-tracker";
const SESSION_NAMING_PREFIX: &str = "session-naming";

/// A parsed transcript line ready for insertion.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub kind: LineKind,
    pub session_id: Option<String>,
    pub uuid: Option<String>,
    pub parent_uuid: Option<String>,
    pub subtype: Option<String>,
    pub timestamp: String,
    pub slug: Option<String>,
    pub role: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub content: String,
    pub raw: String,
}

/// A parsed hook event ready for insertion.
#[derive(Debug, Clone)]
pub struct HookRecord {
    pub kind: HookKind,
    pub session_id: Option<String>,
    pub timestamp: String,
    pub tool_use_id: Option<String>,
    pub tool_name: Option<String>,
    pub decision: Option<String>,
    pub handler_results: Option<String>,
    pub input_json: Option<String>,
    pub context_json: Option<String>,
    pub turn_id: Option<String>,
    pub turn_sequence: Option<i64>,
    pub session_name: Option<String>,
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).map(|v| v.to_string())
}

/// Parse one transcript line. `None` means skip (malformed or non-object).
pub fn parse_transcript_line(raw: &str) -> Option<LineRecord> {
    let trimmed = raw.trim();
    let parsed: Value = serde_json::from_str(trimmed).ok()?;
    if !parsed.is_object() {
        return None;
    }

    let kind = LineKind::from_type(
        parsed.get("type").and_then(Value::as_str).unwrap_or("unknown"),
    );
    let content = extract_searchable_text(&parsed);

    Some(LineRecord {
        kind,
        session_id: str_field(&parsed, "sessionId"),
        uuid: str_field(&parsed, "uuid"),
        parent_uuid: str_field(&parsed, "parentUuid"),
        subtype: str_field(&parsed, "subtype"),
        timestamp: str_field(&parsed, "timestamp").unwrap_or_default(),
        slug: str_field(&parsed, "slug"),
        role: parsed
            .get("message")
            .and_then(|m| str_field(m, "role")),
        model: parsed
            .get("message")
            .and_then(|m| str_field(m, "model")),
        cwd: str_field(&parsed, "cwd"),
        content,
        raw: trimmed.to_string(),
    })
}

/// Parse one hook-event line. `None` means skip.
pub fn parse_hook_line(raw: &str) -> Option<HookRecord> {
    let trimmed = raw.trim();
    let parsed: Value = serde_json::from_str(trimmed).ok()?;
    if !parsed.is_object() {
        return None;
    }

    let kind = HookKind::from_event_type(
        parsed.get("eventType").and_then(Value::as_str).unwrap_or(""),
    );

    let handler_results = parsed.get("handlerResults");
    let (mut turn_id, mut turn_sequence, mut session_name) =
        extract_handler_turn_data(handler_results);

    // Top-level fields win only when the handlers said nothing.
    if turn_id.is_none() {
        turn_id = str_field(&parsed, "turnId");
    }
    if turn_sequence.is_none() {
        turn_sequence = parsed.get("turnSequence").and_then(Value::as_i64);
    }
    if session_name.is_none() {
        session_name = str_field(&parsed, "sessionName");
    }

    Some(HookRecord {
        kind,
        session_id: str_field(&parsed, "sessionId"),
        timestamp: str_field(&parsed, "timestamp").unwrap_or_default(),
        tool_use_id: str_field(&parsed, "toolUseId"),
        tool_name: str_field(&parsed, "toolName"),
        decision: str_field(&parsed, "decision"),
        handler_results: handler_results.map(|v| v.to_string()),
        input_json: json_field(&parsed, "input"),
        context_json: json_field(&parsed, "context"),
        turn_id,
        turn_sequence,
        session_name,
    })
}

/// Pull turn id/sequence and session name out of nested handler payloads.
fn extract_handler_turn_data(
    handler_results: Option<&Value>,
) -> (Option<String>, Option<i64>, Option<String>) {
    let mut turn_id = None;
    let mut turn_sequence = None;
    let mut session_name = None;

    let Some(results) = handler_results.and_then(Value::as_object) else {
        return (turn_id, turn_sequence, session_name);
    };

    for (key, value) in results {
        let Some(data) = value.get("data") else {
            continue;
        };
        if key.starts_with(TURN_TRACKER_PREFIX) {
            if let Some(tid) = data.get("turnId").and_then(Value::as_str) {
                turn_id = Some(tid.to_string());
            }
            if let Some(seq) = data
                .get("sequence")
                .or_else(|| data.get("turnSequence"))
                .and_then(Value::as_i64)
            {
                turn_sequence = Some(seq);
            }
        }
        if key.starts_with(SESSION_NAMING_PREFIX) {
            if let Some(name) = data.get("sessionName").and_then(Value::as_str) {
                session_name = Some(name.to_string());
            }
        }
    }

    (turn_id, turn_sequence, session_name)
}

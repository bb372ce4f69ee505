//! Shared record and filter types.

use serde::Serialize;

/// The two JSONL log families the index consumes.
///
/// Transcript files end in `.jsonl`; hook-event files end in `.hooks.jsonl`.
/// The hook suffix is checked first since it is a suffix of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFamily {
    Transcripts,
    HookEvents,
}

impl FileFamily {
    pub const TRANSCRIPT_SUFFIX: &'static str = ".jsonl";
    pub const HOOK_SUFFIX: &'static str = ".hooks.jsonl";

    /// Classify a file name, or `None` if it belongs to neither family.
    pub fn of_file_name(name: &str) -> Option<FileFamily> {
        if name.ends_with(Self::HOOK_SUFFIX) {
            Some(FileFamily::HookEvents)
        } else if name.ends_with(Self::TRANSCRIPT_SUFFIX) {
            Some(FileFamily::Transcripts)
        } else {
            None
        }
    }

    /// True if `name` belongs to this family.
    pub fn matches(&self, name: &str) -> bool {
        FileFamily::of_file_name(name) == Some(*self)
    }
}

/// Discriminant for a transcript line's `type` field.
///
/// Unknown but well-formed types are preserved, not dropped: the original
/// tag travels in the `Unknown` variant so nothing is lost on round trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LineKind {
    User,
    Assistant,
    System,
    Summary,
    Unknown(String),
}

impl LineKind {
    pub fn from_type(s: &str) -> LineKind {
        match s {
            "user" => LineKind::User,
            "assistant" => LineKind::Assistant,
            "system" => LineKind::System,
            "summary" => LineKind::Summary,
            other => LineKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LineKind::User => "user",
            LineKind::Assistant => "assistant",
            LineKind::System => "system",
            LineKind::Summary => "summary",
            LineKind::Unknown(s) => s,
        }
    }
}

/// Discriminant for a hook event's `eventType` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HookKind {
    SessionStart,
    PreToolUse,
    PostToolUse,
    Stop,
    Other(String),
}

impl HookKind {
    pub fn from_event_type(s: &str) -> HookKind {
        match s {
            "SessionStart" => HookKind::SessionStart,
            "PreToolUse" => HookKind::PreToolUse,
            "PostToolUse" => HookKind::PostToolUse,
            "Stop" => HookKind::Stop,
            other => HookKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HookKind::SessionStart => "SessionStart",
            HookKind::PreToolUse => "PreToolUse",
            HookKind::PostToolUse => "PostToolUse",
            HookKind::Stop => "Stop",
            HookKind::Other(s) => s,
        }
    }
}

/// One indexed transcript line, as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptLine {
    pub id: i64,
    pub session_id: String,
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub line_number: i64,
    pub kind: LineKind,
    pub subtype: Option<String>,
    pub timestamp: String,
    pub slug: Option<String>,
    pub role: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub content: Option<String>,
    pub raw: String,
    pub file_path: String,
    pub turn_id: Option<String>,
    pub turn_sequence: Option<i64>,
    pub session_name: Option<String>,
}

/// One indexed hook event, as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct HookEvent {
    pub id: i64,
    pub session_id: String,
    pub timestamp: String,
    pub kind: HookKind,
    pub tool_use_id: Option<String>,
    pub tool_name: Option<String>,
    pub decision: Option<String>,
    pub handler_results: Option<String>,
    pub input_json: Option<String>,
    pub context_json: Option<String>,
    pub file_path: String,
    pub line_number: i64,
    pub turn_id: Option<String>,
    pub turn_sequence: Option<i64>,
    pub session_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Filter for line queries. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    pub session_id: Option<String>,
    pub types: Option<Vec<String>>,
    pub from_time: Option<String>,
    pub to_time: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order: Order,
}

impl LineFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

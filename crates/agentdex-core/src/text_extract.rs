//! Searchable-text extraction from parsed transcript JSON.

use serde_json::Value;

/// Inputs of a tool_use block longer than this are not worth indexing.
const MAX_TOOL_INPUT_LEN: usize = 500;
/// Tool results are truncated to keep huge outputs from bloating the index.
const MAX_TOOL_RESULT_BYTES: usize = 1000;

/// Extract the searchable text of one parsed transcript entry.
///
/// Collected, in order: `message.content` (plain string, or text /
/// tool_use / tool_result blocks), the `summary` field, and `data.text`.
pub fn extract_searchable_text(parsed: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();

    match parsed.get("message").and_then(|m| m.get("content")) {
        Some(Value::String(s)) => parts.push(s.clone()),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                collect_block(block, &mut parts);
            }
        }
        _ => {}
    }

    if let Some(summary) = parsed.get("summary").and_then(Value::as_str) {
        parts.push(summary.to_string());
    }
    if let Some(text) = parsed
        .get("data")
        .and_then(|d| d.get("text"))
        .and_then(Value::as_str)
    {
        parts.push(text.to_string());
    }

    parts.join("\n")
}

fn collect_block(block: &Value, parts: &mut Vec<String>) {
    let Some(obj) = block.as_object() else {
        return;
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = obj.get("text").and_then(Value::as_str) {
                parts.push(text.to_string());
            }
        }
        Some("tool_use") => {
            if let Some(name) = obj.get("name").and_then(Value::as_str) {
                parts.push(format!("[Tool: {name}]"));
            }
            // Short string-valued inputs make tool arguments searchable.
            if let Some(input) = obj.get("input").and_then(Value::as_object) {
                for (key, value) in input {
                    if let Some(s) = value.as_str() {
                        if s.len() < MAX_TOOL_INPUT_LEN {
                            parts.push(format!("{key}: {s}"));
                        }
                    }
                }
            }
        }
        Some("tool_result") => {
            if let Some(content) = obj.get("content").and_then(Value::as_str) {
                parts.push(truncate_chars(content, MAX_TOOL_RESULT_BYTES).to_string());
            }
        }
        _ => {}
    }
}

/// Truncate at the nearest char boundary at or before `max_bytes`.
fn truncate_chars(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

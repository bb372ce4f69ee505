//! ANSI color helpers for terminal output

use colored::Colorize;
use agentdex_core::LineKind;

/// Get colored line type indicator
pub fn colored_type(kind: &LineKind) -> String {
    match kind {
        LineKind::User => "user".cyan().to_string(),
        LineKind::Assistant => "assistant".green().to_string(),
        LineKind::System => "system".yellow().to_string(),
        LineKind::Summary => "summary".magenta().to_string(),
        LineKind::Unknown(s) => s.white().dimmed().to_string(),
    }
}

/// Get colored timestamp (time portion of an ISO timestamp)
pub fn colored_time(timestamp: &str) -> String {
    let time = if let Some(t_pos) = timestamp.find('T') {
        let time_part = &timestamp[t_pos + 1..];
        time_part.split('.').next().unwrap_or(time_part)
    } else {
        timestamp
    };
    time.white().dimmed().to_string()
}

/// Get colored session name
pub fn colored_session(name: &str) -> String {
    name.cyan().bold().to_string()
}

/// Get colored header
pub fn header(text: &str) -> String {
    text.bold().underline().to_string()
}

/// Get colored label
pub fn label(text: &str) -> String {
    text.white().dimmed().to_string()
}

/// Get colored value
pub fn value(text: &str) -> String {
    text.white().to_string()
}

/// Get colored success message
pub fn success(text: &str) -> String {
    format!("{} {}", "✓".green(), text)
}

/// Get colored error message
pub fn error(text: &str) -> String {
    format!("{} {}", "✗".red(), text)
}

/// Format a count with thousands separators
pub fn format_count(count: i64) -> String {
    let raw = count.to_string();
    let mut out = String::new();
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a byte count as a human-readable size
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

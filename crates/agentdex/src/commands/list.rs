//! List command - recent sessions

use anyhow::Result;

use agentdex_store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::output;

pub fn run(cli: &Cli, store: &Store, limit: i64) -> Result<()> {
    let sessions = store.list_sessions(limit)?;

    match cli.format {
        OutputFormat::Human => {
            if sessions.is_empty() {
                println!("No indexed sessions.");
                return Ok(());
            }
            for s in &sessions {
                let display = s
                    .session_name
                    .as_deref()
                    .or(s.slug.as_deref())
                    .unwrap_or(&s.session_id);
                println!(
                    "{} {} {} lines",
                    output::colored_session(display),
                    output::label(s.last_timestamp.as_deref().unwrap_or("-")),
                    output::format_count(s.line_count),
                );
            }
        }
        OutputFormat::Json => {
            for s in &sessions {
                println!("{}", serde_json::to_string(s)?);
            }
        }
    }
    Ok(())
}

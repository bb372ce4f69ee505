//! Info command - session details

use anyhow::Result;

use agentdex_store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::output;

pub fn run(cli: &Cli, store: &Store, session: &str) -> Result<()> {
    let Some(info) = store.get_session(session)? else {
        println!("{}", output::error(&format!("Unknown session: {session}")));
        return Ok(());
    };

    match cli.format {
        OutputFormat::Human => {
            println!(
                "{}",
                output::header(
                    info.session_name
                        .as_deref()
                        .or(info.slug.as_deref())
                        .unwrap_or(&info.session_id)
                )
            );
            println!();
            println!("  {}: {}", output::label("Session ID"), info.session_id);
            if let Some(slug) = &info.slug {
                println!("  {}: {}", output::label("Slug"), slug);
            }
            if let Some(name) = &info.session_name {
                println!("  {}: {}", output::label("Name"), name);
            }
            println!("  {}: {}", output::label("File"), info.file_path);
            println!(
                "  {}: {}",
                output::label("Lines"),
                output::format_count(info.line_count)
            );
            if let (Some(first), Some(last)) = (&info.first_timestamp, &info.last_timestamp) {
                println!("  {}: {} .. {}", output::label("Span"), first, last);
            }
            println!("  {}: {}", output::label("Indexed at"), info.indexed_at);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }
    Ok(())
}

//! Search command - full-text search across transcripts and hook events

use anyhow::Result;
use colored::Colorize;

use agentdex_store::{default_sources, SearchOptions, Store};

use crate::cli::{Cli, OutputFormat};
use crate::output;

#[allow(clippy::too_many_arguments)]
pub fn run(
    cli: &Cli,
    store: &Store,
    query: &str,
    limit: i64,
    session: Option<&str>,
    types: Option<Vec<String>>,
    hooks: bool,
    unified: bool,
) -> Result<()> {
    // A session filter accepts slug or name too.
    let session_ids = match session {
        Some(s) => {
            let resolved = store.get_session(s)?;
            match resolved {
                Some(info) => Some(vec![info.session_id]),
                None => {
                    println!("{}", output::error(&format!("Unknown session: {s}")));
                    return Ok(());
                }
            }
        }
        None => None,
    };

    let options = SearchOptions {
        limit,
        types,
        session_ids,
        ..SearchOptions::default()
    };

    if unified {
        return run_unified(cli, store, query, &options);
    }
    if hooks {
        return run_hooks(cli, store, query, &options);
    }

    let hits = store.search_lines(query, &options)?;
    match cli.format {
        OutputFormat::Human => {
            if hits.is_empty() {
                println!("No results found for: {}", query.cyan());
                return Ok(());
            }
            println!(
                "{}",
                output::header(&format!("Search results for '{}' ({})", query, hits.len()))
            );
            println!();
            for hit in &hits {
                let session = hit
                    .line
                    .session_name
                    .as_deref()
                    .or(hit.line.slug.as_deref())
                    .unwrap_or(&hit.line.session_id);
                println!(
                    "{} {} {} {}",
                    output::colored_session(session),
                    output::colored_time(&hit.line.timestamp),
                    output::colored_type(&hit.line.kind),
                    hit.snippet.replace('\n', " "),
                );
            }
        }
        OutputFormat::Json => {
            for hit in &hits {
                let out = serde_json::json!({
                    "session_id": hit.line.session_id,
                    "session_name": hit.line.session_name,
                    "timestamp": hit.line.timestamp,
                    "type": hit.line.kind.as_str(),
                    "line_number": hit.line.line_number,
                    "rank": hit.rank,
                    "snippet": hit.snippet,
                    "content": hit.line.content,
                });
                println!("{}", serde_json::to_string(&out)?);
            }
        }
    }
    Ok(())
}

fn run_hooks(cli: &Cli, store: &Store, query: &str, options: &SearchOptions) -> Result<()> {
    let hits = store.search_hook_events(query, options)?;
    match cli.format {
        OutputFormat::Human => {
            if hits.is_empty() {
                println!("No results found for: {}", query.cyan());
                return Ok(());
            }
            for hit in &hits {
                println!(
                    "{} {} {} {}",
                    output::colored_session(&hit.event.session_id),
                    output::colored_time(&hit.event.timestamp),
                    hit.event.kind.as_str().yellow(),
                    hit.event.tool_name.as_deref().unwrap_or("-"),
                );
            }
        }
        OutputFormat::Json => {
            for hit in &hits {
                let out = serde_json::json!({
                    "session_id": hit.event.session_id,
                    "timestamp": hit.event.timestamp,
                    "event_type": hit.event.kind.as_str(),
                    "tool_name": hit.event.tool_name,
                    "rank": hit.rank,
                    "snippet": hit.snippet,
                });
                println!("{}", serde_json::to_string(&out)?);
            }
        }
    }
    Ok(())
}

fn run_unified(cli: &Cli, store: &Store, query: &str, options: &SearchOptions) -> Result<()> {
    let hits = store.search_unified(query, &default_sources(), options)?;
    match cli.format {
        OutputFormat::Human => {
            if hits.is_empty() {
                println!("No results found for: {}", query.cyan());
                return Ok(());
            }
            for hit in &hits {
                let session = hit.session_name.as_deref().unwrap_or(&hit.session_id);
                println!(
                    "{} {} {} {} {}",
                    hit.icon,
                    output::colored_session(session),
                    output::colored_time(&hit.timestamp),
                    hit.entry_type.yellow(),
                    hit.matched.replace('\n', " "),
                );
            }
        }
        OutputFormat::Json => {
            for hit in &hits {
                println!("{}", serde_json::to_string(hit)?);
            }
        }
    }
    Ok(())
}

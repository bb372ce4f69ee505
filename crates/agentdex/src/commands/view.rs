//! View command - transcript lines for one session

use anyhow::Result;

use agentdex_core::{LineFilter, Order};
use agentdex_store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::output;

pub fn run(
    cli: &Cli,
    store: &Store,
    session: &str,
    types: Option<Vec<String>>,
    last: Option<i64>,
    after_id: Option<i64>,
) -> Result<()> {
    let Some(info) = store.get_session(session)? else {
        println!("{}", output::error(&format!("Unknown session: {session}")));
        return Ok(());
    };

    let mut lines = if let Some(after_id) = after_id {
        store.get_lines_after_id(after_id, Some(&info.session_id))?
    } else {
        let filter = LineFilter {
            types,
            // "last N" reads newest-first, then flips back to reading order.
            order: if last.is_some() { Order::Desc } else { Order::Asc },
            limit: last,
            ..LineFilter::for_session(info.session_id.as_str())
        };
        store.get_lines(&filter)?
    };
    if last.is_some() {
        lines.reverse();
    }

    match cli.format {
        OutputFormat::Human => {
            for line in &lines {
                let content = line.content.as_deref().unwrap_or("");
                println!(
                    "{:>5} {} {} {}",
                    line.line_number,
                    output::colored_time(&line.timestamp),
                    output::colored_type(&line.kind),
                    content.replace('\n', " "),
                );
            }
        }
        OutputFormat::Json => {
            for line in &lines {
                println!("{}", serde_json::to_string(line)?);
            }
        }
    }
    Ok(())
}

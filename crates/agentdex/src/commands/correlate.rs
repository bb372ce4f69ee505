//! Correlate command - stamp lines with turn and session-name data

use anyhow::Result;

use agentdex_indexer::correlate_turns;
use agentdex_store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::output;

pub fn run(cli: &Cli) -> Result<()> {
    let store = Store::open(&cli.db_path())?;
    let outcome = correlate_turns(&store, None)?;

    match cli.format {
        OutputFormat::Human => {
            println!(
                "{}",
                output::success(&format!(
                    "Correlated {} lines across {} sessions",
                    output::format_count(outcome.lines_updated as i64),
                    outcome.sessions,
                ))
            );
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "sessions": outcome.sessions,
                "lines_updated": outcome.lines_updated,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

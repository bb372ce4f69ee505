//! Index command - build, update, rebuild, status

use anyhow::Result;

use agentdex_core::FileFamily;
use agentdex_indexer::{correlate_turns, index_once, FamilyOutcome};
use agentdex_store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::output;

pub fn status(cli: &Cli) -> Result<()> {
    let path = cli.db_path();
    let store = match Store::open_read_only(&path) {
        Ok(store) => store,
        Err(e) => {
            match cli.format {
                OutputFormat::Human => {
                    println!("{}", output::error(&format!("No usable index: {e}")));
                    println!();
                    println!("Create one with:");
                    println!("  agentdex index build");
                }
                OutputFormat::Json => {
                    let out = serde_json::json!({
                        "status": "unavailable",
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
            return Ok(());
        }
    };

    let stats = store.stats()?;
    match cli.format {
        OutputFormat::Human => {
            println!("{}", output::header("Index Status"));
            println!();
            println!("  {}: {}", output::label("Database"), path.display());
            println!(
                "  {}: {}",
                output::label("Size"),
                output::format_size(stats.size_bytes)
            );
            println!(
                "  {}: {}",
                output::label("Schema version"),
                output::value(&stats.version.to_string())
            );
            println!();
            println!(
                "  {}: {}",
                output::label("Sessions"),
                output::format_count(stats.session_count)
            );
            println!(
                "  {}: {}",
                output::label("Transcript lines"),
                output::format_count(stats.line_count)
            );
            println!(
                "  {}: {}",
                output::label("Hook events"),
                output::format_count(stats.hook_event_count)
            );
            if let Some(last) = &stats.last_indexed {
                println!();
                println!("  {}: {}", output::label("Last indexed"), output::value(last));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

/// First full build. Refuses an already-built index so a stale one is
/// replaced deliberately (`rebuild`) rather than by accident.
pub fn build(cli: &Cli) -> Result<()> {
    let store = Store::open(&cli.db_path())?;
    if store.is_ready()? {
        anyhow::bail!(
            "index at {} is already built; run `agentdex index update` for new \
             content or `agentdex index rebuild` to start over",
            cli.db_path().display()
        );
    }
    let (transcripts, hooks) = agentdex_indexer::rebuild(&store, &cli.roots())?;
    report_pass(cli, &transcripts, &hooks)
}

/// Delta pass: only content appended since the stored cursors.
pub fn update(cli: &Cli) -> Result<()> {
    let store = Store::open(&cli.db_path())?;
    let roots = cli.roots();
    let transcripts = index_once(&store, &roots, FileFamily::Transcripts)?;
    let hooks = index_once(&store, &roots, FileFamily::HookEvents)?;
    correlate_turns(&store, None)?;
    report_pass(cli, &transcripts, &hooks)
}

/// Drop everything and re-index from byte zero.
pub fn rebuild(cli: &Cli) -> Result<()> {
    let store = Store::open(&cli.db_path())?;
    let (transcripts, hooks) = agentdex_indexer::rebuild(&store, &cli.roots())?;
    report_pass(cli, &transcripts, &hooks)
}

fn report_pass(cli: &Cli, transcripts: &FamilyOutcome, hooks: &FamilyOutcome) -> Result<()> {
    match cli.format {
        OutputFormat::Human => {
            println!(
                "{}",
                output::success(&format!(
                    "Indexed {} transcript lines from {} files, {} hook events from {} files",
                    output::format_count(transcripts.rows as i64),
                    transcripts.files_indexed,
                    output::format_count(hooks.rows as i64),
                    hooks.files_indexed,
                ))
            );
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "transcripts": {
                    "files_seen": transcripts.files_seen,
                    "files_indexed": transcripts.files_indexed,
                    "rows": transcripts.rows,
                },
                "hooks": {
                    "files_seen": hooks.files_seen,
                    "files_indexed": hooks.files_indexed,
                    "rows": hooks.rows,
                },
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

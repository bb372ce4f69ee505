//! Watch command - run the indexing daemon in the foreground

use anyhow::Result;

use agentdex_indexer::{Daemon, DaemonConfig, IndexError};

use crate::cli::{Cli, OutputFormat};
use crate::output;

pub fn run(cli: &Cli) -> Result<()> {
    let config = DaemonConfig {
        db_path: cli.db_path(),
        roots: cli.roots(),
        ..DaemonConfig::default()
    };

    let daemon = match Daemon::start(config) {
        Ok(daemon) => daemon,
        Err(IndexError::NotReady(path)) => {
            println!(
                "{}",
                output::error(&format!("Index at {} is empty", path.display()))
            );
            println!();
            println!("Run a full build first:");
            println!("  agentdex index build");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let status = daemon.status()?;
    match cli.format {
        OutputFormat::Human => {
            println!(
                "{}",
                output::success(&format!(
                    "Watching; {} lines and {} hook events indexed",
                    output::format_count(status.stats.line_count),
                    output::format_count(status.stats.hook_event_count),
                ))
            );
            println!("Press Enter to stop.");
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "status": "watching",
                "db_path": status.db_path.to_string_lossy(),
                "line_count": status.stats.line_count,
                "hook_event_count": status.stats.hook_event_count,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    // Foreground until Enter or stdin EOF; under a supervisor with stdin
    // closed, park until the process is signalled.
    let mut buf = String::new();
    if let Ok(0) = std::io::stdin().read_line(&mut buf) {
        loop {
            std::thread::park();
        }
    }

    daemon.stop();
    Ok(())
}

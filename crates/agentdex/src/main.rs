//! agentdex - CLI for searching and indexing coding-agent session logs

mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentdex_store::Store;
use cli::{Cli, Command, IndexCommand};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Write-path commands open (and create) the store themselves.
    match &cli.command {
        Command::Index(IndexCommand::Status) => return commands::index::status(&cli),
        Command::Index(IndexCommand::Build) => return commands::index::build(&cli),
        Command::Index(IndexCommand::Update) => return commands::index::update(&cli),
        Command::Index(IndexCommand::Rebuild) => return commands::index::rebuild(&cli),
        Command::Correlate => return commands::correlate::run(&cli),
        Command::Watch => return commands::watch::run(&cli),
        _ => {}
    }

    // Query commands require an existing, current-version store.
    let store = Store::open_read_only(&cli.db_path())
        .with_context(|| format!("cannot open index at {}", cli.db_path().display()))?;

    match &cli.command {
        Command::Search {
            query,
            limit,
            session,
            types,
            hooks,
            unified,
        } => commands::search::run(
            &cli,
            &store,
            query,
            *limit,
            session.as_deref(),
            types.clone(),
            *hooks,
            *unified,
        ),

        Command::View {
            session,
            types,
            last,
            after_id,
        } => commands::view::run(&cli, &store, session, types.clone(), *last, *after_id),

        Command::List { limit } => commands::list::run(&cli, &store, *limit),

        Command::Info { session } => commands::info::run(&cli, &store, session),

        // All other commands handled above
        _ => unreachable!(),
    }
}

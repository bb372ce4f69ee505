//! The long-running indexing daemon: one catch-up pass over both families,
//! then debounced watching of both roots, with a correlation pass after
//! every batch of new rows.
//!
//! The daemon refuses to start against a store that is not ready; recovery
//! is an explicit rebuild, never a silent one from inside the daemon.

use std::path::PathBuf;
use tracing::{info, warn};

use agentdex_core::FileFamily;
use agentdex_store::{Store, StoreStats};

use crate::correlate;
use crate::delta;
use crate::discovery::Roots;
use crate::watch::{start_watch_multi, WatchConfig, WatchHandle};
use crate::IndexError;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub roots: Roots,
    pub watch: WatchConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            db_path: agentdex_store::default_db_path(),
            roots: Roots::default_under_home(),
            watch: WatchConfig::default(),
        }
    }
}

/// Point-in-time view of a running daemon.
#[derive(Debug, Clone)]
pub struct DaemonStatus {
    pub db_path: PathBuf,
    pub stats: StoreStats,
}

#[derive(Debug)]
pub struct Daemon {
    config: DaemonConfig,
    handle: Option<WatchHandle>,
}

impl Daemon {
    /// Catch up on both families, correlate, then start watching.
    pub fn start(config: DaemonConfig) -> Result<Self, IndexError> {
        let store = Store::open(&config.db_path)?;
        if !store.is_ready()? {
            return Err(IndexError::NotReady(config.db_path.clone()));
        }

        let transcripts = delta::index_once(&store, &config.roots, FileFamily::Transcripts)?;
        let hooks = delta::index_once(&store, &config.roots, FileFamily::HookEvents)?;
        correlate::correlate_turns(&store, None)?;
        info!(
            transcript_rows = transcripts.rows,
            hook_rows = hooks.rows,
            "catch-up pass complete, watching"
        );

        let routes = [
            (config.roots.transcripts.clone(), FileFamily::Transcripts),
            (config.roots.hooks.clone(), FileFamily::HookEvents),
        ];
        let handle = start_watch_multi(
            store,
            &routes,
            config.watch.clone(),
            Box::new(|store, _, _, _| {
                if let Err(e) = correlate::correlate_turns(store, None) {
                    warn!(error = %e, "correlation pass failed");
                }
            }),
        )?;

        Ok(Self {
            config,
            handle: Some(handle),
        })
    }

    /// Current store counts, read through a separate read-only handle so the
    /// watcher's connection stays private to its thread.
    pub fn status(&self) -> Result<DaemonStatus, IndexError> {
        let store = Store::open_read_only(&self.config.db_path)?;
        Ok(DaemonStatus {
            db_path: self.config.db_path.clone(),
            stats: store.stats()?,
        })
    }

    /// Stop watching and wait for any in-flight pass to commit.
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn transcript_line(uuid: &str, ts: &str) -> String {
        format!(
            r#"{{"sessionId":"s1","uuid":"{uuid}","type":"user","timestamp":"{ts}","message":{{"role":"user","content":"daemon test"}}}}"#
        )
    }

    fn test_config(base: &std::path::Path) -> DaemonConfig {
        DaemonConfig {
            db_path: base.join("index.db"),
            roots: Roots {
                transcripts: base.join("projects"),
                hooks: base.join("hooks"),
            },
            watch: WatchConfig {
                debounce: Duration::from_millis(50),
                poll_interval: Duration::from_millis(50),
                ..WatchConfig::default()
            },
        }
    }

    #[test]
    fn refuses_to_start_on_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Daemon::start(test_config(tmp.path())).unwrap_err();
        assert!(matches!(err, IndexError::NotReady(_)));
    }

    #[test]
    fn catches_up_then_reports_status() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        let project = config.roots.transcripts.join("proj");
        fs::create_dir_all(&project).unwrap();
        fs::write(
            project.join("a.jsonl"),
            transcript_line("u1", "2024-01-01T00:00:00Z") + "\n",
        )
        .unwrap();

        // A prior full build makes the store ready.
        {
            let store = Store::open(&config.db_path).unwrap();
            delta::rebuild(&store, &config.roots).unwrap();
        }

        // New content appears while the daemon was down.
        fs::write(
            project.join("b.jsonl"),
            transcript_line("u2", "2024-01-01T00:01:00Z") + "\n",
        )
        .unwrap();

        let daemon = Daemon::start(config).unwrap();
        let status = daemon.status().unwrap();
        assert_eq!(status.stats.line_count, 2);
        daemon.stop();
    }
}

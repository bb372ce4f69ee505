//! Debounced filesystem watching.
//!
//! One worker thread owns the store connection and drains a channel fed by
//! raw notify events; `Debouncer` decides when a path has gone quiet enough
//! to index. Stopping is deterministic: the handle drops the watcher, sends
//! a stop message and joins the worker.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use agentdex_core::FileFamily;
use agentdex_store::Store;

use crate::debounce::Debouncer;
use crate::{delta, hooks, IndexError};

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period a file must hold before it is re-indexed.
    pub debounce: Duration,
    /// Worker wake-up interval when nothing is pending.
    pub poll_interval: Duration,
    /// Full-scan interval backing up native events that never arrive.
    pub sweep_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

pub(crate) enum WorkerMsg {
    Fs(notify::Result<notify::Event>),
    Stop,
}

/// Running watcher; dropping it without `stop()` still shuts the worker
/// down, just without surfacing join errors.
#[derive(Debug)]
pub struct WatchHandle {
    tx: Sender<WorkerMsg>,
    watchers: Vec<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop watching and wait for the in-flight pass to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the watchers first stops the event flow.
        self.watchers.clear();
        let _ = self.tx.send(WorkerMsg::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Watch one family's root and re-index files as they grow. `on_update`
/// fires only for passes that indexed at least one row.
pub fn start_watch(
    store: Store,
    root: &Path,
    family: FileFamily,
    config: WatchConfig,
    on_update: impl Fn(&Path, usize) + Send + 'static,
) -> Result<WatchHandle, IndexError> {
    start_watch_multi(
        store,
        &[(root.to_path_buf(), family)],
        config,
        Box::new(move |_, _, path, rows| on_update(path, rows)),
    )
}

/// Shared implementation: one worker, any number of watched roots.
pub(crate) type UpdateCallback = Box<dyn Fn(&Store, FileFamily, &Path, usize) + Send>;

pub(crate) fn start_watch_multi(
    store: Store,
    routes: &[(PathBuf, FileFamily)],
    config: WatchConfig,
    on_update: UpdateCallback,
) -> Result<WatchHandle, IndexError> {
    let (tx, rx) = mpsc::channel();
    let routes: Vec<(PathBuf, FileFamily)> = routes.to_vec();

    let mut watchers = Vec::with_capacity(routes.len());
    for (root, _) in &routes {
        if !root.exists() {
            std::fs::create_dir_all(root)?;
        }
        let event_tx = tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res| {
                let _ = event_tx.send(WorkerMsg::Fs(res));
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        watchers.push(watcher);
    }

    let worker = std::thread::Builder::new()
        .name("agentdex-watch".to_string())
        .spawn(move || worker_loop(store, routes, config, rx, on_update))?;

    Ok(WatchHandle {
        tx,
        watchers,
        worker: Some(worker),
    })
}

fn worker_loop(
    store: Store,
    routes: Vec<(PathBuf, FileFamily)>,
    config: WatchConfig,
    rx: Receiver<WorkerMsg>,
    on_update: UpdateCallback,
) {
    let families: Vec<FileFamily> = routes.iter().map(|(_, f)| *f).collect();
    let mut debouncer = Debouncer::new(config.debounce);
    let mut last_sweep = Instant::now();

    loop {
        let timeout = debouncer
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(config.poll_interval);

        match rx.recv_timeout(timeout) {
            Ok(WorkerMsg::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(WorkerMsg::Fs(Ok(event))) => {
                let now = Instant::now();
                for path in event.paths {
                    if family_of(&path).is_some_and(|f| families.contains(&f)) {
                        debouncer.note(path, now);
                    }
                }
            }
            Ok(WorkerMsg::Fs(Err(e))) => {
                warn!(error = %e, "watch backend error");
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        for path in debouncer.take_due(Instant::now()) {
            if let Some(family) = family_of(&path) {
                index_path(&store, family, &path, &on_update);
            }
        }

        // Safety net for events the native backend dropped; every file is a
        // cheap no-op unless it actually grew.
        if last_sweep.elapsed() >= config.sweep_interval {
            for (root, family) in &routes {
                for path in crate::discovery::scan(root, *family).files {
                    index_path(&store, *family, &path, &on_update);
                }
            }
            last_sweep = Instant::now();
        }
    }
}

fn index_path(store: &Store, family: FileFamily, path: &Path, on_update: &UpdateCallback) {
    let result = match family {
        FileFamily::Transcripts => delta::index_transcript_file(store, path),
        FileFamily::HookEvents => hooks::index_hook_file(store, path),
    };
    match result {
        Ok(outcome) if outcome.rows > 0 => {
            debug!(file = %path.display(), rows = outcome.rows, "re-indexed");
            on_update(store, family, path, outcome.rows);
        }
        Ok(_) => {}
        Err(e) => {
            warn!(file = %path.display(), error = %e, "watch pass failed");
        }
    }
}

fn family_of(path: &Path) -> Option<FileFamily> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(FileFamily::of_file_name)
}

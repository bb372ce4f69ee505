//! Per-path event debouncing.
//!
//! A pure state machine over injected `Instant`s; the watch loop owns the
//! clock and the sleeping. Each path is idle or pending with a deadline, and
//! every new event pushes the deadline out, so a file being appended in a
//! burst indexes once at the end of the burst.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub struct Debouncer {
    quiet: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    /// Record an event for `path`; its deadline moves to `now + quiet`.
    pub fn note(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.quiet);
    }

    /// Earliest pending deadline, for the caller to sleep until.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every path whose quiet period has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        due.sort();
        for path in &due {
            self.pending.remove(path);
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(100);

    #[test]
    fn burst_of_events_collapses_to_one_due_path() {
        let mut d = Debouncer::new(QUIET);
        let t0 = Instant::now();
        let path = PathBuf::from("/a.jsonl");

        d.note(path.clone(), t0);
        d.note(path.clone(), t0 + Duration::from_millis(10));
        d.note(path.clone(), t0 + Duration::from_millis(20));

        // Still inside the quiet window of the last event.
        assert!(d.take_due(t0 + Duration::from_millis(110)).is_empty());

        let due = d.take_due(t0 + Duration::from_millis(121));
        assert_eq!(due, vec![path]);
        assert!(d.is_empty());
    }

    #[test]
    fn paths_fire_independently() {
        let mut d = Debouncer::new(QUIET);
        let t0 = Instant::now();
        d.note(PathBuf::from("/a.jsonl"), t0);
        d.note(PathBuf::from("/b.jsonl"), t0 + Duration::from_millis(50));

        let due = d.take_due(t0 + Duration::from_millis(101));
        assert_eq!(due, vec![PathBuf::from("/a.jsonl")]);
        assert!(!d.is_empty());

        let due = d.take_due(t0 + Duration::from_millis(151));
        assert_eq!(due, vec![PathBuf::from("/b.jsonl")]);
    }

    #[test]
    fn next_deadline_tracks_the_earliest_path() {
        let mut d = Debouncer::new(QUIET);
        assert!(d.next_deadline().is_none());

        let t0 = Instant::now();
        d.note(PathBuf::from("/b.jsonl"), t0 + Duration::from_millis(30));
        d.note(PathBuf::from("/a.jsonl"), t0);
        assert_eq!(d.next_deadline(), Some(t0 + QUIET));
    }
}

//! Source-file discovery.
//!
//! Iterative worklist over directories rather than a recursive walk, so an
//! unreadable directory surfaces as an explicit error entry instead of being
//! silently swallowed; callers can tell "empty" from "inaccessible".

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use agentdex_core::FileFamily;

/// The two directory trees the indexer consumes.
#[derive(Debug, Clone)]
pub struct Roots {
    pub transcripts: PathBuf,
    pub hooks: PathBuf,
}

impl Roots {
    /// Conventional layout under `$HOME/.claude`.
    pub fn default_under_home() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let base = PathBuf::from(home).join(".claude");
        Self {
            transcripts: base.join("projects"),
            hooks: base.join("hooks"),
        }
    }

    pub fn for_family(&self, family: FileFamily) -> &Path {
        match family {
            FileFamily::Transcripts => &self.transcripts,
            FileFamily::HookEvents => &self.hooks,
        }
    }
}

/// One directory that could not be read during a scan.
#[derive(Debug)]
pub struct ScanError {
    pub dir: PathBuf,
    pub error: std::io::Error,
}

/// Files found for one family, plus the directories that failed.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<PathBuf>,
    pub errors: Vec<ScanError>,
}

/// Enumerate all files of `family` under `root`. A missing root is an empty
/// report, not an error; the watcher may create it later.
pub fn scan(root: &Path, family: FileFamily) -> ScanReport {
    let mut report = ScanReport::default();
    if !root.exists() {
        return report;
    }

    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) => {
                report.errors.push(ScanError { dir, error });
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(error) => {
                    report.errors.push(ScanError {
                        dir: dir.clone(),
                        error,
                    });
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                queue.push_back(path);
            } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if family.matches(name) {
                    report.files.push(path);
                }
            }
        }
    }

    report.files.sort();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_root_gives_empty_report_without_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let report = scan(tmp.path(), FileFamily::Transcripts);
        assert!(report.files.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn missing_root_is_empty_not_an_error() {
        let report = scan(Path::new("/definitely/not/here"), FileFamily::Transcripts);
        assert!(report.files.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn transcripts_exclude_hook_files() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("project-a");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("session.jsonl"), "{}").unwrap();
        fs::write(nested.join("session.hooks.jsonl"), "{}").unwrap();
        fs::write(nested.join("notes.txt"), "x").unwrap();

        let transcripts = scan(tmp.path(), FileFamily::Transcripts);
        assert_eq!(transcripts.files.len(), 1);
        assert!(transcripts.files[0].ends_with("project-a/session.jsonl"));

        let hooks = scan(tmp.path(), FileFamily::HookEvents);
        assert_eq!(hooks.files.len(), 1);
        assert!(hooks.files[0].ends_with("project-a/session.hooks.jsonl"));
    }

    #[test]
    fn results_are_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.jsonl"), "{}").unwrap();
        fs::write(tmp.path().join("a.jsonl"), "{}").unwrap();
        let report = scan(tmp.path(), FileFamily::Transcripts);
        assert!(report.files[0].ends_with("a.jsonl"));
        assert!(report.files[1].ends_with("b.jsonl"));
    }
}

//! Byte-offset-resumable line reading, shared by both family indexers.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Numbered lines appended since the previous pass.
pub(crate) struct NewLines {
    /// `(line_number, raw_text)` for every numbered line. Skipped-but-counted
    /// lines (the discarded partial prefix on resume) are not included but
    /// still advanced the counter.
    pub lines: Vec<(i64, String)>,
    /// The file's total size at read time; the next pass resumes here.
    pub new_offset: u64,
    /// Last line number consumed, including counted-but-dropped lines.
    pub last_line: i64,
}

/// Read `[from_offset, size)` of `path`, numbering lines from `start_line`.
///
/// Returns `None` when the stored offset already covers the file (no-op).
/// The read is capped at the size observed up front, so bytes appended
/// mid-read are left for the next pass and the offset stays on a line
/// boundary. When resuming mid-file, the first chunk is dropped unless it
/// starts with `{`: it is the tail of a line the previous pass already
/// numbered as incomplete.
pub(crate) fn read_new_lines(
    path: &Path,
    from_offset: u64,
    start_line: i64,
) -> std::io::Result<Option<NewLines>> {
    let size = std::fs::metadata(path)?.len();
    if from_offset >= size {
        return Ok(None);
    }

    let mut file = File::open(path)?;
    if from_offset > 0 {
        file.seek(SeekFrom::Start(from_offset))?;
    }
    let reader = BufReader::new(file.take(size - from_offset));

    let mut lines = Vec::new();
    let mut next_line = start_line;
    let mut first_chunk = from_offset > 0;

    for line in reader.lines() {
        let raw = match line {
            Ok(l) => l,
            Err(_) => {
                next_line += 1;
                continue;
            }
        };

        if first_chunk {
            first_chunk = false;
            if !raw.starts_with('{') {
                next_line += 1;
                continue;
            }
        }

        if raw.trim().is_empty() {
            continue;
        }

        lines.push((next_line, raw));
        next_line += 1;
    }

    Ok(Some(NewLines {
        lines,
        new_offset: size,
        last_line: next_line - 1,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[test]
    fn full_read_numbers_from_one() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        fs::write(&path, "{\"a\":1}\n{\"b\":2}\n").unwrap();

        let read = read_new_lines(&path, 0, 1).unwrap().unwrap();
        assert_eq!(read.lines.len(), 2);
        assert_eq!(read.lines[0].0, 1);
        assert_eq!(read.lines[1].0, 2);
        assert_eq!(read.last_line, 2);
        assert_eq!(read.new_offset, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn covered_offset_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        fs::write(&path, "{\"a\":1}\n").unwrap();
        let size = fs::metadata(&path).unwrap().len();
        assert!(read_new_lines(&path, size, 2).unwrap().is_none());
    }

    #[test]
    fn resume_reads_only_appended_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        fs::write(&path, "{\"a\":1}\n").unwrap();
        let offset = fs::metadata(&path).unwrap().len();

        let mut f = fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"b\":2}\n").unwrap();

        let read = read_new_lines(&path, offset, 2).unwrap().unwrap();
        assert_eq!(read.lines.len(), 1);
        assert_eq!(read.lines[0], (2, "{\"b\":2}".to_string()));
    }

    #[test]
    fn partial_prefix_on_resume_is_counted_but_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        // A previous pass stopped mid-line: offset points inside line 1.
        fs::write(&path, "{\"a\":1}\n{\"b\":2}\n").unwrap();
        let read = read_new_lines(&path, 3, 2).unwrap().unwrap();
        assert_eq!(read.lines.len(), 1);
        assert_eq!(read.lines[0], (3, "{\"b\":2}".to_string()));
        assert_eq!(read.last_line, 3);
    }

    #[test]
    fn trailing_newline_produces_no_phantom_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jsonl");
        fs::write(&path, "{\"a\":1}\n\n{\"b\":2}\n").unwrap();
        let read = read_new_lines(&path, 0, 1).unwrap().unwrap();
        // The blank interior line is dropped without consuming a number.
        assert_eq!(read.lines.len(), 2);
        assert_eq!(read.lines[1].0, 2);
    }
}

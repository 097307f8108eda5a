/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/tail.rs
 * Responsibility: Bounded-memory tail reader for error logs and crash reports.
 */

//! Reading the trailing lines of a file without loading it whole.
//!
//! Files below the threshold are read in one go. Larger files are read from a
//! window at the end. The default window is `max_lines * bytes_per_line`, which
//! is a guess: when the real lines are longer than the estimate, fewer than
//! `max_lines` lines come back. That under-read is accepted behavior of the
//! heuristic strategy. Callers that need an exact count use [`tail_exact`] (or
//! [`TailStrategy::Exact`]), which doubles the window until enough line breaks
//! are in view.
//!
//! Line breaks are the full Unicode set: `\n`, `\r`, `\r\n`, vertical tab, form
//! feed, the file/group/record separators, NEL, U+2028 and U+2029. A log written
//! with bare `\r` terminators therefore still splits into lines.

use crate::config::{TailConfig, TailStrategy};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub const DEFAULT_THRESHOLD_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_BYTES_PER_LINE: u64 = 200;
pub const DEFAULT_MAX_LINES: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("Log file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Path {} is not a file.", .0.display())]
    NotAFile(PathBuf),

    #[error("Failed to read file: {0}")]
    ReadError(#[from] io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct TailOptions {
    pub threshold_bytes: u64,
    pub bytes_per_line: u64,
    pub strategy: TailStrategy,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            strategy: TailStrategy::Heuristic,
        }
    }
}

impl From<&TailConfig> for TailOptions {
    fn from(config: &TailConfig) -> Self {
        Self {
            threshold_bytes: config.threshold_bytes,
            bytes_per_line: config.bytes_per_line.max(1),
            strategy: config.strategy,
        }
    }
}

/// Last `max_lines` lines of `path`, heuristic strategy, default limits.
pub fn tail(path: &Path, max_lines: usize) -> Result<Vec<String>, TailError> {
    tail_with(path, max_lines, &TailOptions::default())
}

/// Last `max_lines` lines of `path`, always exactly `min(max_lines, total)`.
pub fn tail_exact(path: &Path, max_lines: usize) -> Result<Vec<String>, TailError> {
    let options = TailOptions {
        strategy: TailStrategy::Exact,
        ..TailOptions::default()
    };
    tail_with(path, max_lines, &options)
}

pub fn tail_with(path: &Path, max_lines: usize, options: &TailOptions) -> Result<Vec<String>, TailError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TailError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(TailError::ReadError(e)),
    };
    if !meta.is_file() {
        return Err(TailError::NotAFile(path.to_path_buf()));
    }
    if max_lines == 0 {
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    if meta.len() < options.threshold_bytes {
        let mut buf = Vec::with_capacity(meta.len() as usize);
        file.read_to_end(&mut buf)?;
        return Ok(last_lines(&buf, false, max_lines));
    }

    let window = (max_lines as u64).saturating_mul(options.bytes_per_line.max(1));
    match options.strategy {
        TailStrategy::Heuristic => read_heuristic(&mut file, window, max_lines),
        TailStrategy::Exact => read_exact(&mut file, window, max_lines),
    }
}

fn read_heuristic(file: &mut File, window: u64, max_lines: usize) -> Result<Vec<String>, TailError> {
    let file_end = file.seek(SeekFrom::End(0))?;
    let start = file_end.saturating_sub(window);
    let buf = read_range(file, start, file_end)?;
    Ok(last_lines(&buf, start > 0, max_lines))
}

fn read_exact(file: &mut File, initial_window: u64, max_lines: usize) -> Result<Vec<String>, TailError> {
    let file_end = file.seek(SeekFrom::End(0))?;
    let mut window = initial_window.max(1);
    loop {
        let start = file_end.saturating_sub(window);
        let buf = read_range(file, start, file_end)?;
        let text = String::from_utf8_lossy(&buf);
        let mut lines = split_lines(&text);
        // The segment before the first break may be partial.
        if start > 0 && !lines.is_empty() {
            lines.remove(0);
        }
        if start == 0 || lines.len() >= max_lines {
            return Ok(keep_last(lines, max_lines));
        }
        window = window.saturating_mul(2);
    }
}

fn read_range(file: &mut File, start: u64, end: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let len = end - start;
    let mut buf = Vec::with_capacity(len as usize);
    // Bounded even if the file grows while we read.
    file.by_ref().take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

fn last_lines(buf: &[u8], drop_first: bool, max_lines: usize) -> Vec<String> {
    let text = String::from_utf8_lossy(buf);
    let mut lines = split_lines(&text);
    if drop_first && !lines.is_empty() {
        lines.remove(0);
    }
    keep_last(lines, max_lines)
}

fn keep_last(lines: Vec<&str>, max_lines: usize) -> Vec<String> {
    let skip = lines.len().saturating_sub(max_lines);
    lines[skip..].iter().map(|line| line.to_string()).collect()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split on every Unicode line break, `\r\n` counting as one. A trailing
/// break does not produce an empty last line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[line_start..i]);
        line_start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                line_start = j + 1;
            }
        }
    }
    if line_start < text.len() {
        lines.push(&text[line_start..]);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn numbered_file(count: usize, width: usize) -> (NamedTempFile, Vec<String>) {
        let mut file = NamedTempFile::new().unwrap();
        let lines: Vec<String> = (0..count)
            .map(|i| format!("{:0>width$}", format!("line-{}", i), width = width))
            .collect();
        for line in &lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        (file, lines)
    }

    fn assert_contiguous_suffix(got: &[String], all: &[String]) {
        let start = all.len() - got.len();
        assert_eq!(got, &all[start..]);
    }

    #[test]
    fn test_small_file_returns_last_k_lines_in_order() {
        let (file, lines) = numbered_file(50, 10);
        let got = tail(file.path(), 5).unwrap();
        assert_eq!(got, lines[45..].to_vec());
    }

    #[test]
    fn test_small_file_with_fewer_lines_is_not_padded() {
        let (file, lines) = numbered_file(3, 10);
        let got = tail(file.path(), 100).unwrap();
        assert_eq!(got, lines);
    }

    #[test]
    fn test_zero_max_lines_returns_nothing() {
        let (file, _) = numbered_file(3, 10);
        assert!(tail(file.path(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_failed() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ok\n\xff\xfe bad\r\nend").unwrap();
        let got = tail(file.path(), 10).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], "ok");
        assert!(got[1].contains('\u{FFFD}'));
        assert!(got[1].ends_with(" bad"));
        assert_eq!(got[2], "end");
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = tempdir().unwrap();
        let err = tail(&dir.path().join("nope.log"), 10).unwrap_err();
        assert!(matches!(err, TailError::NotFound(_)));
        assert!(err.to_string().starts_with("Log file not found at"));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempdir().unwrap();
        let err = tail(dir.path(), 10).unwrap_err();
        assert!(matches!(err, TailError::NotAFile(_)));
    }

    #[test]
    fn test_large_file_returns_contiguous_suffix() {
        // 20_000 * 61 bytes is above the 1 MiB threshold.
        let (file, lines) = numbered_file(20_000, 60);
        assert!(fs::metadata(file.path()).unwrap().len() >= DEFAULT_THRESHOLD_BYTES);

        let got = tail(file.path(), 10).unwrap();
        assert_eq!(got.len(), 10);
        assert_contiguous_suffix(&got, &lines);
    }

    #[test]
    fn test_large_file_with_long_lines_under_reads() {
        let (file, lines) = numbered_file(3_000, 500);
        assert!(fs::metadata(file.path()).unwrap().len() >= DEFAULT_THRESHOLD_BYTES);

        let got = tail(file.path(), 10).unwrap();
        assert!(got.len() < 10);
        assert!(!got.is_empty());
        assert_contiguous_suffix(&got, &lines);
    }

    #[test]
    fn test_exact_strategy_recovers_full_count_for_long_lines() {
        let (file, lines) = numbered_file(3_000, 500);
        let got = tail_exact(file.path(), 10).unwrap();
        assert_eq!(got, lines[2_990..].to_vec());
    }

    #[test]
    fn test_exact_strategy_with_request_larger_than_file() {
        let (file, lines) = numbered_file(40, 30);
        let options = TailOptions {
            threshold_bytes: 16,
            bytes_per_line: 1,
            strategy: TailStrategy::Exact,
        };
        let got = tail_with(file.path(), 1_000, &options).unwrap();
        assert_eq!(got, lines);
    }

    #[test]
    fn test_low_threshold_drops_partial_first_line() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"aaaaaaaaaa\nbbbbbbbbbb\ncccccccccc\n").unwrap();
        let options = TailOptions {
            threshold_bytes: 8,
            bytes_per_line: 8,
            strategy: TailStrategy::Heuristic,
        };
        // Window of 16 bytes starts mid-way through "bbbbbbbbbb".
        let got = tail_with(file.path(), 2, &options).unwrap();
        assert_eq!(got, vec!["cccccccccc".to_string()]);
    }

    #[test]
    fn test_window_covering_whole_file_keeps_first_line() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"first\nsecond\nthird\n").unwrap();
        let options = TailOptions {
            threshold_bytes: 8,
            bytes_per_line: 10,
            strategy: TailStrategy::Heuristic,
        };
        // 19 bytes is above the threshold; the 50-byte window reaches offset 0.
        let got = tail_with(file.path(), 5, &options).unwrap();
        assert_eq!(got, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_split_lines_breaks_on_every_terminator() {
        assert_eq!(split_lines("a\rb\rc"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("a\r\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(
            split_lines("a\x0bb\x0cc\x1cd\u{85}e\u{2028}f\u{2029}g"),
            vec!["a", "b", "c", "d", "e", "f", "g"]
        );
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_carriage_return_log_is_split_into_lines() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"one\rtwo\rthree").unwrap();
        assert_eq!(tail(file.path(), 10).unwrap(), vec!["one", "two", "three"]);

        let content: String = (0..50).map(|i| format!("progress {:02}\r", i)).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let options = TailOptions {
            threshold_bytes: 64,
            bytes_per_line: 20,
            strategy: TailStrategy::Heuristic,
        };
        let got = tail_with(file.path(), 3, &options).unwrap();
        assert_eq!(got, vec!["progress 47", "progress 48", "progress 49"]);

        let exact = TailOptions {
            strategy: TailStrategy::Exact,
            bytes_per_line: 1,
            ..options
        };
        let got = tail_with(file.path(), 3, &exact).unwrap();
        assert_eq!(got, vec!["progress 47", "progress 48", "progress 49"]);
    }
}

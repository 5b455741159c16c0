//! Indexed line store backed by the file on disk
//!
//! LineStore scans a file exactly once to build its LineIndex, then serves lines
//! with positioned reads against the bound file handle. Nothing but the index
//! (16 bytes per line) stays in memory, so files far larger than RAM can be
//! opened. Positioned reads carry their own offset, so any number of threads may
//! call `get_line` at the same time without sharing a cursor.

use crate::config::EngineConfig;
use crate::error::{LogsiftError, Result};
use crate::file_handler::line_index::{LineIndex, LineSplitter, LineSpan, LongestLine};
use crate::file_handler::validation::validate_file_path;
use bstr::ByteVec;
use log::{debug, warn};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Result of a load that ran to completion or was cancelled
#[derive(Debug)]
pub struct LoadOutcome {
    pub store: LineStore,
    pub cancelled: bool,
}

/// Random-access view over the lines of one file
#[derive(Debug)]
pub struct LineStore {
    path: PathBuf,

    /// Bound file handle, owned for the life of the binding
    file: File,

    /// File size in bytes when the load started
    file_size: u64,

    index: LineIndex,

    longest: Option<LongestLine>,

    /// Block size for sequential reads (search, export)
    block_size: usize,
}

impl LineStore {
    /// Scan `path` and build its line index
    ///
    /// # Arguments
    /// * `token` - checked once per chunk; a cancelled load keeps the lines
    ///   completed so far
    /// * `progress` - called with percent-of-bytes-consumed, only when the value
    ///   increases, so at most 101 times per load
    ///
    /// # Errors
    /// * Missing file, permission problems, not a regular file
    /// * Read failures, or the file shrinking below its size at open
    pub fn load<F>(
        path: &Path,
        token: &CancellationToken,
        config: &EngineConfig,
        mut progress: F,
    ) -> Result<LoadOutcome>
    where
        F: FnMut(u8),
    {
        validate_file_path(path)?;

        let mut file = File::open(path).map_err(|e| LogsiftError::from_io(path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| LogsiftError::file_error("Failed to get file metadata", e))?
            .len();

        let mut buffer = vec![0u8; config.read_chunk_size.max(1)];
        let mut splitter = LineSplitter::new();
        let mut last_percent: Option<u8> = None;
        let mut cancelled = false;

        loop {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(LogsiftError::file_error(
                        format!("Failed to read {}", path.display()),
                        e,
                    ))
                }
            };
            splitter.feed(&buffer[..read]);

            let percent = percent_of(splitter.consumed(), file_size);
            if last_percent.map_or(true, |last| percent > last) {
                progress(percent);
                last_percent = Some(percent);
            }
        }

        if !cancelled && splitter.consumed() < file_size {
            return Err(LogsiftError::file_error(
                format!(
                    "File was truncated while loading: {} ({} of {} bytes read)",
                    path.display(),
                    splitter.consumed(),
                    file_size
                ),
                io::Error::new(io::ErrorKind::UnexpectedEof, "file truncated"),
            ));
        }

        let (index, longest) = if cancelled {
            // The tail may be half a line; keep only lines whose terminator was seen.
            splitter.finish_terminated()
        } else {
            splitter.finish()
        };

        debug!(
            "indexed {} lines ({} bytes) from {}{}",
            index.line_count(),
            file_size,
            path.display(),
            if cancelled { ", cancelled" } else { "" }
        );

        Ok(LoadOutcome {
            store: Self {
                path: path.to_path_buf(),
                file,
                file_size,
                index,
                longest,
                block_size: config.read_chunk_size.max(1),
            },
            cancelled,
        })
    }

    /// Number of indexed lines
    pub fn line_count(&self) -> u64 {
        self.index.line_count()
    }

    /// The line with the most characters, None for an empty file
    pub fn longest_line(&self) -> Option<LongestLine> {
        self.longest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes at load time
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Byte range of a line
    pub fn span(&self, line_number: u64) -> Result<LineSpan> {
        self.index
            .get(line_number)
            .ok_or(LogsiftError::LineOutOfRange {
                line: line_number,
                count: self.line_count(),
            })
    }

    /// Raw bytes of a line, terminator stripped, in the file's own encoding
    pub fn read_raw(&self, line_number: u64) -> Result<Vec<u8>> {
        let span = self.span(line_number)?;
        let len = usize::try_from(span.len)
            .map_err(|_| LogsiftError::other(format!("Line {} is too long", line_number)))?;

        let mut buf = vec![0u8; len];
        read_exact_at(&self.file, &mut buf, span.offset).map_err(|e| {
            LogsiftError::file_error(
                format!("Failed to read line {} of {}", line_number, self.path.display()),
                e,
            )
        })?;
        Ok(buf)
    }

    /// Text of a line; invalid UTF-8 is replaced with U+FFFD
    pub fn get_line(&self, line_number: u64) -> Result<String> {
        Ok(self.read_raw(line_number)?.into_string_lossy())
    }

    /// Sequential reader starting at `start`, reading whole blocks of lines at a time
    pub fn lines_from(&self, start: u64) -> LineReader<'_> {
        LineReader {
            store: self,
            next_line: start,
            buffer: Vec::new(),
            buffer_offset: 0,
        }
    }
}

/// Buffered sequential reader over a LineStore
///
/// Each refill is one positioned read of up to a block of bytes, so scanning
/// the whole file costs roughly `file_size / block_size` reads regardless of
/// how short the lines are.
pub struct LineReader<'a> {
    store: &'a LineStore,
    next_line: u64,
    buffer: Vec<u8>,

    /// File offset of buffer[0]
    buffer_offset: u64,
}

impl<'a> LineReader<'a> {
    /// Next line number this reader will return
    pub fn position(&self) -> u64 {
        self.next_line
    }

    /// Read the next line, or None past the last indexed line
    pub fn next_line(&mut self) -> Result<Option<(u64, &[u8])>> {
        let line_number = self.next_line;
        let Some(span) = self.store.index.get(line_number) else {
            return Ok(None);
        };

        let buffer_end = self.buffer_offset + self.buffer.len() as u64;
        if span.offset < self.buffer_offset || span.end() > buffer_end {
            self.fill(span)?;
        }

        self.next_line += 1;
        let start = (span.offset - self.buffer_offset) as usize;
        let end = start + span.len as usize;
        Ok(Some((line_number, &self.buffer[start..end])))
    }

    fn fill(&mut self, span: LineSpan) -> Result<()> {
        let remaining = self.store.index.end_offset() - span.offset;
        let want = (self.store.block_size as u64).max(span.len).min(remaining);
        let want = usize::try_from(want)
            .map_err(|_| LogsiftError::other("Line does not fit in memory"))?;

        self.buffer.resize(want, 0);
        read_exact_at(&self.store.file, &mut self.buffer, span.offset).map_err(|e| {
            warn!("read failed at byte {} of {}: {}", span.offset, self.store.path.display(), e);
            LogsiftError::file_error(
                format!("Failed to read {}", self.store.path.display()),
                e,
            )
        })?;
        self.buffer_offset = span.offset;
        Ok(())
    }
}

fn percent_of(consumed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (consumed.saturating_mul(100) / total).min(100) as u8
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    /// Create a temporary test file with known content
    fn create_test_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content).expect("Failed to write test data");
        file.flush().expect("Failed to flush test data");
        file
    }

    fn load(path: &Path) -> LineStore {
        let token = CancellationToken::new();
        LineStore::load(path, &token, &EngineConfig::default(), |_| {})
            .expect("load")
            .store
    }

    fn small_chunks() -> EngineConfig {
        EngineConfig {
            read_chunk_size: 7,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_load_and_read_lines() {
        let file = create_test_file(b"line1\nline2\r\nline3\rline4");
        let store = load(file.path());

        assert_eq!(store.line_count(), 4);
        assert_eq!(store.get_line(0).unwrap(), "line1");
        assert_eq!(store.get_line(1).unwrap(), "line2");
        assert_eq!(store.get_line(2).unwrap(), "line3");
        assert_eq!(store.get_line(3).unwrap(), "line4");
    }

    #[test]
    fn test_get_line_out_of_range() {
        let file = create_test_file(b"only\n");
        let store = load(file.path());

        match store.get_line(1) {
            Err(LogsiftError::LineOutOfRange { line, count }) => {
                assert_eq!(line, 1);
                assert_eq!(count, 1);
            }
            other => panic!("expected LineOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_has_no_lines() {
        let file = create_test_file(b"");
        let store = load(file.path());
        assert_eq!(store.line_count(), 0);
        assert!(store.longest_line().is_none());
        assert!(store.get_line(0).is_err());
    }

    #[test]
    fn test_longest_line_ties_keep_first() {
        let file = create_test_file(b"ab\nxyz\nabc\nq\n");
        let store = load(file.path());
        let longest = store.longest_line().unwrap();
        assert_eq!(longest.line_number, 1);
        assert_eq!(longest.char_count, 3);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let file = create_test_file(b"ok\n\xffbad\n");
        let store = load(file.path());
        assert_eq!(store.get_line(1).unwrap(), "\u{FFFD}bad");
        assert_eq!(store.read_raw(1).unwrap(), b"\xffbad");
    }

    #[test]
    fn test_progress_is_non_decreasing_and_ends_at_100() {
        let content = "some log line\n".repeat(50);
        let file = create_test_file(content.as_bytes());
        let token = CancellationToken::new();
        let mut seen = Vec::new();

        LineStore::load(file.path(), &token, &small_chunks(), |p| seen.push(p)).unwrap();

        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.len() <= 101);
    }

    #[test]
    fn test_cancelled_before_start_keeps_empty_index() {
        let file = create_test_file(b"a\nb\n");
        let token = CancellationToken::new();
        token.cancel();

        let outcome = LineStore::load(file.path(), &token, &EngineConfig::default(), |_| {})
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.store.line_count(), 0);
    }

    #[test]
    fn test_cancel_mid_load_keeps_complete_lines_only() {
        let file = create_test_file(b"alpha\nbravo\ncharlie\ndelta\n");
        let token = CancellationToken::new();
        let config = small_chunks();

        let cancel = token.clone();
        let outcome = LineStore::load(file.path(), &token, &config, |_| cancel.cancel()).unwrap();

        assert!(outcome.cancelled);
        // One 7-byte chunk covers "alpha\nb": only "alpha" is complete
        assert_eq!(outcome.store.line_count(), 1);
        assert_eq!(outcome.store.get_line(0).unwrap(), "alpha");
    }

    #[test]
    fn test_file_shrinking_during_load_is_an_error() {
        let file = create_test_file("0123456789\n".repeat(20).as_bytes());
        let token = CancellationToken::new();
        let mut truncated = false;

        let result = LineStore::load(file.path(), &token, &small_chunks(), |_| {
            if !truncated {
                file.as_file().set_len(11).expect("truncate");
                truncated = true;
            }
        });

        match result {
            Err(LogsiftError::FileError { message, .. }) => {
                assert!(message.contains("truncated"), "{message}")
            }
            other => panic!("expected FileError, got {other:?}"),
        }
    }

    #[test]
    fn test_reads_fail_once_the_file_is_truncated() {
        let file = create_test_file(b"first\nsecond\nthird\n");
        let store = load(file.path());
        file.as_file().set_len(0).expect("truncate");

        assert!(matches!(
            store.get_line(1),
            Err(LogsiftError::FileError { .. })
        ));
        let mut reader = store.lines_from(0);
        assert!(reader.next_line().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let token = CancellationToken::new();
        let result = LineStore::load(
            Path::new("/this/file/does/not/exist.log"),
            &token,
            &EngineConfig::default(),
            |_| {},
        );
        assert!(matches!(result, Err(LogsiftError::FileNotFound { .. })));
    }

    #[test]
    fn test_sequential_reader_matches_random_access() {
        let mut content = String::new();
        for i in 0..200 {
            content.push_str(&format!("entry {} {}\r\n", i, "x".repeat(i % 13)));
        }
        content.push_str("\n\nlast");
        let file = create_test_file(content.as_bytes());
        let token = CancellationToken::new();
        let store = LineStore::load(file.path(), &token, &small_chunks(), |_| {})
            .unwrap()
            .store;

        let mut reader = store.lines_from(0);
        let mut count = 0;
        while let Some((n, bytes)) = reader.next_line().unwrap() {
            assert_eq!(bytes, store.read_raw(n).unwrap().as_slice());
            count += 1;
        }
        assert_eq!(count, store.line_count());
        assert_eq!(reader.position(), store.line_count());
    }

    #[test]
    fn test_line_longer_than_block() {
        let long = "z".repeat(100);
        let content = format!("a\n{}\nb\n", long);
        let file = create_test_file(content.as_bytes());
        let token = CancellationToken::new();
        let store = LineStore::load(file.path(), &token, &small_chunks(), |_| {})
            .unwrap()
            .store;

        let mut reader = store.lines_from(1);
        let (n, bytes) = reader.next_line().unwrap().unwrap();
        assert_eq!(n, 1);
        assert_eq!(bytes, long.as_bytes());
        assert_eq!(reader.next_line().unwrap().unwrap().1, b"b");
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_access() {
        let content: String = (0..64).map(|i| format!("line{}\n", i)).collect();
        let file = create_test_file(content.as_bytes());
        let store = Arc::new(load(file.path()));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for round in 0..64u64 {
                        let i = (round * 7 + t) % 64;
                        assert_eq!(store.get_line(i).unwrap(), format!("line{}", i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

//! Streaming export of lines to a new file.
//!
//! Lines are copied as raw bytes, so the output keeps the source encoding;
//! each line is followed by the platform terminator. An export that is
//! cancelled or fails part-way removes its output instead of leaving a
//! truncated file behind.

use crate::error::{LogsiftError, Result};
use crate::file_handler::LineStore;
use log::{debug, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Line terminator written after every exported line
#[cfg(windows)]
pub const LINE_ENDING: &[u8] = b"\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &[u8] = b"\n";

/// How an export ended
#[derive(Debug)]
pub struct ExportOutcome {
    pub duration: Duration,
    /// True only when every requested line was written and flushed
    pub success: bool,
    pub cancelled: bool,
    pub lines_written: u64,
    pub error: Option<LogsiftError>,
}

struct WriteStatus {
    written: u64,
    cancelled: bool,
}

/// Writes all lines, or a chosen subset, of a LineStore to disk
#[derive(Debug, Clone)]
pub struct ExportEngine {
    write_buffer_size: usize,
    cancel_check_interval: u64,
}

impl ExportEngine {
    pub fn new(write_buffer_size: usize, cancel_check_interval: usize) -> Self {
        Self {
            write_buffer_size: write_buffer_size.max(1),
            cancel_check_interval: cancel_check_interval.max(1) as u64,
        }
    }

    /// Write every line in line-number order
    pub fn export_all(
        &self,
        store: &LineStore,
        path: &Path,
        token: &CancellationToken,
    ) -> ExportOutcome {
        self.run(path, |writer| {
            let mut reader = store.lines_from(0);
            let mut written = 0u64;
            loop {
                if self.should_stop(written, token) {
                    return Ok(WriteStatus {
                        written,
                        cancelled: true,
                    });
                }
                let Some((_, bytes)) = reader.next_line()? else {
                    break;
                };
                write_line(writer, bytes, path)?;
                written += 1;
            }
            Ok(WriteStatus {
                written,
                cancelled: false,
            })
        })
    }

    /// Write the given lines, in the order given
    ///
    /// Used for exporting a filtered view or a selection; a line number past
    /// the end of the store fails the export.
    pub fn export_subset(
        &self,
        store: &LineStore,
        lines: &[u64],
        path: &Path,
        token: &CancellationToken,
    ) -> ExportOutcome {
        self.run(path, |writer| {
            let mut written = 0u64;
            for &line_number in lines {
                if self.should_stop(written, token) {
                    return Ok(WriteStatus {
                        written,
                        cancelled: true,
                    });
                }
                let bytes = store.read_raw(line_number)?;
                write_line(writer, &bytes, path)?;
                written += 1;
            }
            Ok(WriteStatus {
                written,
                cancelled: false,
            })
        })
    }

    fn should_stop(&self, written: u64, token: &CancellationToken) -> bool {
        written % self.cancel_check_interval == 0 && token.is_cancelled()
    }

    fn run<F>(&self, path: &Path, write: F) -> ExportOutcome
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<WriteStatus>,
    {
        let started = Instant::now();

        let file = match File::create(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("cannot create {}: {}", path.display(), e);
                return ExportOutcome {
                    duration: started.elapsed(),
                    success: false,
                    cancelled: false,
                    lines_written: 0,
                    error: Some(LogsiftError::from_io(path, e)),
                };
            }
        };

        // The writer is dropped (file closed) before any cleanup below
        let result = {
            let mut writer = BufWriter::with_capacity(self.write_buffer_size, file);
            write(&mut writer).and_then(|status| {
                if !status.cancelled {
                    writer.flush().map_err(|e| {
                        LogsiftError::file_error(format!("Failed to write {}", path.display()), e)
                    })?;
                }
                Ok(status)
            })
        };

        match result {
            Ok(status) if !status.cancelled => {
                debug!("exported {} lines to {}", status.written, path.display());
                ExportOutcome {
                    duration: started.elapsed(),
                    success: true,
                    cancelled: false,
                    lines_written: status.written,
                    error: None,
                }
            }
            Ok(status) => {
                debug!(
                    "export to {} cancelled after {} lines",
                    path.display(),
                    status.written
                );
                remove_partial(path);
                ExportOutcome {
                    duration: started.elapsed(),
                    success: false,
                    cancelled: true,
                    lines_written: status.written,
                    error: None,
                }
            }
            Err(e) => {
                warn!("export to {} failed: {}", path.display(), e);
                remove_partial(path);
                ExportOutcome {
                    duration: started.elapsed(),
                    success: false,
                    cancelled: false,
                    lines_written: 0,
                    error: Some(e),
                }
            }
        }
    }
}

impl Default for ExportEngine {
    fn default() -> Self {
        let config = crate::config::EngineConfig::default();
        Self::new(config.write_buffer_size, config.cancel_check_interval)
    }
}

fn write_line(writer: &mut BufWriter<File>, bytes: &[u8], path: &Path) -> Result<()> {
    writer
        .write_all(bytes)
        .and_then(|_| writer.write_all(LINE_ENDING))
        .map_err(|e| LogsiftError::file_error(format!("Failed to write {}", path.display()), e))
}

fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("could not remove partial export {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use tempfile::TempDir;

    fn store_with(dir: &TempDir, content: &[u8]) -> LineStore {
        let path = dir.path().join("source.log");
        std::fs::write(&path, content).unwrap();
        LineStore::load(&path, &CancellationToken::new(), &EngineConfig::default(), |_| {})
            .unwrap()
            .store
    }

    fn expected(lines: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in lines {
            out.extend_from_slice(line.as_bytes());
            out.extend_from_slice(LINE_ENDING);
        }
        out
    }

    #[test]
    fn test_export_all_normalizes_terminators() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, b"one\r\ntwo\rthree");
        let out = dir.path().join("out.log");

        let outcome = ExportEngine::default().export_all(&store, &out, &CancellationToken::new());

        assert!(outcome.success);
        assert_eq!(outcome.lines_written, 3);
        assert_eq!(std::fs::read(&out).unwrap(), expected(&["one", "two", "three"]));
    }

    #[test]
    fn test_export_preserves_raw_bytes() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, b"caf\xe9\n");
        let out = dir.path().join("out.log");

        let outcome = ExportEngine::default().export_all(&store, &out, &CancellationToken::new());

        assert!(outcome.success);
        let mut want = b"caf\xe9".to_vec();
        want.extend_from_slice(LINE_ENDING);
        assert_eq!(std::fs::read(&out).unwrap(), want);
    }

    #[test]
    fn test_export_subset_keeps_given_order() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, b"l0\nl1\nl2\nl3\n");
        let out = dir.path().join("subset.log");

        let outcome = ExportEngine::default().export_subset(
            &store,
            &[3, 1],
            &out,
            &CancellationToken::new(),
        );

        assert!(outcome.success);
        assert_eq!(std::fs::read(&out).unwrap(), expected(&["l3", "l1"]));
    }

    #[test]
    fn test_cancelled_export_removes_output() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, b"a\nb\nc\n");
        let out = dir.path().join("cancelled.log");
        let token = CancellationToken::new();
        token.cancel();

        let outcome = ExportEngine::default().export_all(&store, &out, &token);

        assert!(!outcome.success);
        assert!(outcome.cancelled);
        assert!(outcome.error.is_none());
        assert!(!out.exists());
    }

    #[test]
    fn test_out_of_range_subset_fails_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, b"a\nb\n");
        let out = dir.path().join("bad.log");

        let outcome = ExportEngine::default().export_subset(
            &store,
            &[0, 9],
            &out,
            &CancellationToken::new(),
        );

        assert!(!outcome.success);
        assert!(!outcome.cancelled);
        assert!(matches!(
            outcome.error,
            Some(LogsiftError::LineOutOfRange { line: 9, .. })
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_unwritable_target_reports_error() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, b"a\n");
        let out = dir.path().join("missing-dir").join("out.log");

        let outcome = ExportEngine::default().export_all(&store, &out, &CancellationToken::new());

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}

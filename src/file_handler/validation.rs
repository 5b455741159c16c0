//! File validation utilities for ensuring files are suitable for processing.
//!
//! This module provides validation functions to check that files can be safely
//! indexed by logsift before attempting to open them for reading, and that an
//! export target does not clobber the file being read.

use crate::error::{LogsiftError, Result};
use std::fs::File;
use std::path::Path;

/// Validate that a file path is accessible and suitable for indexing
///
/// # Validations Performed
/// - Path exists and is a regular file (not a directory)
/// - File is readable by the current process
///
/// Empty files are accepted and index to zero lines. There is no size cap:
/// only the line index is held in memory.
pub fn validate_file_path(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| LogsiftError::from_io(path, e))?;

    if !metadata.is_file() {
        return Err(LogsiftError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    // Try to open the file to verify read permissions
    File::open(path).map_err(|e| LogsiftError::from_io(path, e))?;

    Ok(())
}

/// Reject an export target that is the bound source file itself
///
/// Creating the output truncates it, which would destroy the bytes the export
/// is about to read.
pub fn validate_export_target(source: &Path, target: &Path) -> Result<()> {
    if target.as_os_str().is_empty() {
        return Err(LogsiftError::invalid_argument("Export path is empty"));
    }

    let same = match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => source == target,
    };
    if same {
        return Err(LogsiftError::invalid_argument(format!(
            "Cannot export onto the loaded file: {}",
            target.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    /// Create a test file with specific content
    fn create_test_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content)
            .expect("Failed to write test content");
        file.flush().expect("Failed to flush test file");
        file
    }

    #[test]
    fn test_validate_valid_file() {
        let test_file = create_test_file(b"This is valid log content\nLine 2\nLine 3\n");
        assert!(validate_file_path(test_file.path()).is_ok());
    }

    #[test]
    fn test_validate_empty_file_is_accepted() {
        let empty_file = create_test_file(&[]);
        assert!(validate_file_path(empty_file.path()).is_ok());
    }

    #[test]
    fn test_validate_nonexistent_file() {
        let non_existent = Path::new("/this/file/does/not/exist.log");
        match validate_file_path(non_existent) {
            Err(LogsiftError::FileNotFound { path }) => assert_eq!(path, non_existent),
            other => panic!("Expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert!(matches!(
            validate_file_path(temp_dir.path()),
            Err(LogsiftError::NotAFile { .. })
        ));
    }

    #[test]
    fn test_export_target_cannot_be_source() {
        let source = create_test_file(b"data\n");
        assert!(validate_export_target(source.path(), source.path()).is_err());

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.log");
        assert!(validate_export_target(source.path(), &target).is_ok());
    }
}

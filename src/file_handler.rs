//! File handling: line indexing and random access without loading the file.
//!
//! This module provides the core file access functionality for logsift. A file
//! is scanned once into a [`LineIndex`] of byte ranges; afterwards every line is
//! read straight from disk with a positioned read, so memory use is
//! proportional to the line count, not the file size.

pub mod line_index;
pub mod store;
pub mod validation;

pub use line_index::{LineIndex, LineSpan, LineSplitter, LongestLine};
pub use store::{LineReader, LineStore, LoadOutcome};
pub use validation::{validate_export_target, validate_file_path};

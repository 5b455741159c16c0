//! # logsift - Log Engine for Very Large Files
//!
//! Open arbitrarily large plain-text logs, search them with layered
//! (cumulative) or multi-term searches, and export all or part of them, without
//! ever holding the file content in memory.
//!
//! ## Features
//!
//! - **Line Index**: one streaming pass splits on CR, LF and CRLF; lines are then
//!   read from disk on demand with positioned reads
//! - **Layered Search**: plain text, wildcard and regex terms, each with a
//!   16-bit id recorded on the lines it matches, plus context-line marking
//! - **Cancellable Operations**: load, search and export run in the background
//!   and stop promptly when their token is cancelled
//! - **Consistent Snapshots**: annotations are published as whole generations
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - Engine tuning settings
//! - [`file_handler`] - Line indexing and random access
//! - [`search`] - Search terms, registry, annotations and search passes
//! - [`export`] - Streaming export to a new file
//! - [`app`] - The [`LogEngine`] orchestrator and its event protocol

// Core modules
pub mod config;
pub mod error;
pub mod file_handler;

// Engine components
pub mod app;
pub mod export;
pub mod search;

// Re-export commonly used types for convenience
pub use error::{LogsiftError, Result};

// Public API surface for external usage
pub use app::protocol::{EngineEvent, EventSink, FnSink, RequestId};
pub use app::LogEngine;
pub use config::EngineConfig;
pub use file_handler::{LineStore, LongestLine};
pub use search::{AnnotationTable, LogLine, SearchCriteria, SearchId, SearchType};
pub use tokio_util::sync::CancellationToken;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

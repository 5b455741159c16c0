//! Pattern search over indexed lines.
//!
//! - [`criteria`] - search terms, ids and compiled matchers
//! - [`registry`] - the ordered, duplicate-free set of terms for a file
//! - [`annotations`] - per-line match ids and context flags
//! - [`engine`] - single and multi-pattern passes over a
//!   [`LineStore`](crate::file_handler::LineStore)

pub mod annotations;
pub mod criteria;
pub mod engine;
pub mod registry;

pub use annotations::{AnnotationTable, LogLine};
pub use criteria::{LineMatcher, SearchCriteria, SearchId, SearchType};
pub use engine::{SearchEngine, SearchRun, SearchSummary};
pub use registry::SearchRegistry;

//! Search terms and their compiled matchers.
//!
//! Patterns are compiled with the ripgrep regex engine (`grep-regex`) and run
//! directly against the raw line bytes, so lines never need to be decoded to
//! be searched.

use crate::error::{LogsiftError, Result};
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use std::fmt;
use std::str::FromStr;

/// Identifier tying a line's matches back to the search that produced them
///
/// Valid ids are 1..=65535 and are scoped to one loaded file. `0` is the
/// [`SearchId::REJECTED`] sentinel returned for duplicates and once the id space
/// is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchId(u16);

impl SearchId {
    /// Sentinel for "not registered" (duplicate pattern or id space exhausted)
    pub const REJECTED: SearchId = SearchId(0);

    /// Wrap a raw value; None for the reserved 0
    pub fn new(raw: u16) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn is_rejected(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a pattern is interpreted
///
/// The discriminants are the positional selector indices callers use and must
/// stay stable: 0 = PlainText, 1 = Wildcard, 2 = Regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchType {
    /// Case-insensitive substring
    PlainText = 0,
    /// Case-insensitive glob: `*` any run of characters, `?` exactly one
    Wildcard = 1,
    /// Regular expression, used as written
    Regex = 2,
}

impl SearchType {
    pub const ALL: [SearchType; 3] = [
        SearchType::PlainText,
        SearchType::Wildcard,
        SearchType::Regex,
    ];

    /// Map a selector position to a type
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Selector position of this type
    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for SearchType {
    type Err = LogsiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "plaintext" | "text" => Ok(SearchType::PlainText),
            "wildcard" | "glob" => Ok(SearchType::Wildcard),
            "regex" | "re" => Ok(SearchType::Regex),
            other => Err(LogsiftError::invalid_argument(format!(
                "Unknown search type '{}' (expected plain, wildcard or regex)",
                other
            ))),
        }
    }
}

/// One user-specified search term
///
/// Type and pattern are fixed at construction; the id is assigned when the
/// registry accepts the term, and `enabled` is toggled through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    id: SearchId,
    search_type: SearchType,
    pattern: String,
    enabled: bool,
}

impl SearchCriteria {
    /// New, not yet registered, enabled term
    pub fn new(search_type: SearchType, pattern: impl Into<String>) -> Self {
        Self {
            id: SearchId::REJECTED,
            search_type,
            pattern: pattern.into(),
            enabled: true,
        }
    }

    pub fn id(&self) -> SearchId {
        self.id
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn assign_id(&mut self, id: SearchId) {
        self.id = id;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Compile the pattern into a matcher tagged with this term's id
    ///
    /// # Errors
    /// * `InvalidPattern` for an empty pattern or a malformed regex
    pub fn compile(&self) -> Result<LineMatcher> {
        if self.pattern.is_empty() {
            return Err(LogsiftError::invalid_pattern(
                &self.pattern,
                "pattern is empty",
            ));
        }

        let mut builder = RegexMatcherBuilder::new();
        let source = match self.search_type {
            SearchType::PlainText => {
                builder.case_insensitive(true);
                regex::escape(&self.pattern)
            }
            SearchType::Wildcard => {
                builder.case_insensitive(true);
                wildcard_to_regex(&self.pattern)
            }
            SearchType::Regex => self.pattern.clone(),
        };

        let matcher = builder
            .build(&source)
            .map_err(|e| LogsiftError::invalid_pattern(&self.pattern, e.to_string()))?;

        Ok(LineMatcher {
            id: self.id,
            matcher,
        })
    }
}

/// A compiled search term
#[derive(Debug, Clone)]
pub struct LineMatcher {
    id: SearchId,
    matcher: RegexMatcher,
}

impl LineMatcher {
    pub fn id(&self) -> SearchId {
        self.id
    }

    /// Whether the pattern occurs anywhere in the line
    pub fn is_match(&self, line: &[u8]) -> bool {
        // RegexMatcher's error type is uninhabited
        self.matcher.is_match(line).unwrap_or(false)
    }
}

/// Translate a glob into an unanchored regex, escaping everything but `*` and `?`
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut literal = String::new();

    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

//! Full-file search passes.
//!
//! A pass reads every line once through the store's sequential reader and
//! tests it against one or more compiled matchers, building a fresh
//! annotation generation on the side. The caller publishes the returned table;
//! nothing here touches shared state.

use crate::error::Result;
use crate::file_handler::LineStore;
use crate::search::annotations::AnnotationTable;
use crate::search::criteria::LineMatcher;
use log::debug;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Totals reported when a search pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSummary {
    /// Lines carrying at least one match id after the pass
    pub matches: u64,
    /// Patterns evaluated by the pass
    pub num_terms: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

/// A finished (or cancelled) pass: the table to publish and its totals
#[derive(Debug)]
pub struct SearchRun {
    pub table: AnnotationTable,
    pub summary: SearchSummary,
}

/// Runs search passes over a LineStore
#[derive(Debug, Clone)]
pub struct SearchEngine {
    /// Lines scanned between cancellation checks
    cancel_check_interval: usize,
}

impl SearchEngine {
    pub fn new(cancel_check_interval: usize) -> Self {
        Self {
            cancel_check_interval: cancel_check_interval.max(1),
        }
    }

    /// Single-pattern search
    ///
    /// Non-cumulative searches start from blank annotations; cumulative ones
    /// start from a copy of `prior` and add this pattern's id alongside the
    /// existing ones. On cancellation the matches found so far are kept and
    /// their context lines marked.
    pub fn search(
        &self,
        store: &LineStore,
        prior: &AnnotationTable,
        matcher: &LineMatcher,
        cumulative: bool,
        token: &CancellationToken,
        context_span: usize,
    ) -> Result<SearchRun> {
        let generation = prior.next_generation();
        let table = if cumulative && prior.len() == store.line_count() {
            let mut table = prior.clone();
            table.set_generation(generation);
            table
        } else {
            AnnotationTable::new(store.line_count(), generation)
        };

        self.run_pass(store, table, std::slice::from_ref(matcher), token, context_span)
    }

    /// Multi-pattern search in one pass; always starts from blank annotations
    pub fn search_multi(
        &self,
        store: &LineStore,
        prior: &AnnotationTable,
        matchers: &[LineMatcher],
        token: &CancellationToken,
        context_span: usize,
    ) -> Result<SearchRun> {
        let table = AnnotationTable::new(store.line_count(), prior.next_generation());
        self.run_pass(store, table, matchers, token, context_span)
    }

    fn run_pass(
        &self,
        store: &LineStore,
        mut table: AnnotationTable,
        matchers: &[LineMatcher],
        token: &CancellationToken,
        context_span: usize,
    ) -> Result<SearchRun> {
        let started = Instant::now();
        let mut matched = Vec::new();
        let mut cancelled = false;
        let mut reader = store.lines_from(0);
        let mut since_check = 0usize;

        loop {
            if since_check == 0 && token.is_cancelled() {
                cancelled = true;
                break;
            }
            since_check = (since_check + 1) % self.cancel_check_interval;

            let Some((line_number, bytes)) = reader.next_line()? else {
                break;
            };

            let mut hit = false;
            for matcher in matchers {
                if matcher.is_match(bytes) {
                    table.add_match(line_number, matcher.id());
                    hit = true;
                }
            }
            if hit {
                matched.push(line_number);
            }
        }

        table.mark_context(&matched, context_span);

        let summary = SearchSummary {
            matches: table.matched_line_count(),
            num_terms: matchers.len(),
            cancelled,
            duration: started.elapsed(),
        };
        debug!(
            "search pass: {} terms, {} new matching lines, {} total, stopped at line {}{}",
            summary.num_terms,
            matched.len(),
            summary.matches,
            reader.position(),
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(SearchRun { table, summary })
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::DEFAULT_CANCEL_CHECK_INTERVAL)
    }
}

//! Per-line search annotations.
//!
//! Every line of the bound file carries the ids of the searches that matched
//! it and a context flag. The whole table is published as an immutable,
//! generation-stamped snapshot: a search works on its own copy and swaps it in
//! when it finishes, so the display side always sees one consistent
//! generation and never a half-applied search.

use crate::search::criteria::SearchId;

/// Mutable annotation state for one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LineMarks {
    /// Sorted, without duplicates
    match_ids: Vec<SearchId>,
    is_context_line: bool,
}

impl LineMarks {
    fn has_match(&self) -> bool {
        !self.match_ids.is_empty()
    }

    fn insert(&mut self, id: SearchId) {
        if let Err(pos) = self.match_ids.binary_search(&id) {
            self.match_ids.insert(pos, id);
        }
    }
}

/// Read-only view of one line record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLine<'a> {
    pub line_number: u64,
    pub match_ids: &'a [SearchId],
    pub is_context_line: bool,
}

impl LogLine<'_> {
    pub fn has_match(&self) -> bool {
        !self.match_ids.is_empty()
    }

    /// Whether any id in `active` matched this line
    pub fn is_highlighted(&self, active: &[SearchId]) -> bool {
        self.match_ids.iter().any(|id| active.contains(id))
    }
}

/// Annotations for every line of the bound file, one generation
#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    generation: u64,
    marks: Vec<LineMarks>,
}

impl AnnotationTable {
    /// Blank annotations for `line_count` lines
    pub fn new(line_count: u64, generation: u64) -> Self {
        Self {
            generation,
            marks: vec![LineMarks::default(); line_count as usize],
        }
    }

    /// Table for an unbound engine
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            marks: Vec::new(),
        }
    }

    /// Incremented each time a new table is published
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> u64 {
        self.marks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn line(&self, line_number: u64) -> Option<LogLine<'_>> {
        let marks = self.marks.get(usize::try_from(line_number).ok()?)?;
        Some(LogLine {
            line_number,
            match_ids: &marks.match_ids,
            is_context_line: marks.is_context_line,
        })
    }

    /// Every line record in line-number order
    pub fn iter(&self) -> impl Iterator<Item = LogLine<'_>> + '_ {
        self.marks.iter().enumerate().map(|(n, marks)| LogLine {
            line_number: n as u64,
            match_ids: &marks.match_ids,
            is_context_line: marks.is_context_line,
        })
    }

    /// Lines carrying at least one match id
    pub fn matched_line_count(&self) -> u64 {
        self.marks.iter().filter(|m| m.has_match()).count() as u64
    }

    /// Line numbers highlighted by `active`, in order
    pub fn highlighted_lines<'a>(
        &'a self,
        active: &'a [SearchId],
    ) -> impl Iterator<Item = u64> + 'a {
        self.iter()
            .filter(move |line| line.is_highlighted(active))
            .map(|line| line.line_number)
    }

    pub(crate) fn next_generation(&self) -> u64 {
        self.generation + 1
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub(crate) fn add_match(&mut self, line_number: u64, id: SearchId) {
        if let Some(marks) = self.marks.get_mut(line_number as usize) {
            marks.insert(id);
        }
    }

    /// Flag the `span` lines around each of `matched` (ascending) as context
    ///
    /// Lines that carry any match id are never context lines. Overlapping
    /// windows are walked once, so the cost is linear in the lines touched.
    pub(crate) fn mark_context(&mut self, matched: &[u64], span: usize) {
        let Some(last) = self.len().checked_sub(1) else {
            return;
        };
        let span = span as u64;

        if span > 0 {
            let mut next_unvisited = 0u64;
            for &line in matched {
                let start = line.saturating_sub(span).max(next_unvisited);
                let end = line.saturating_add(span).min(last);
                for n in start..=end {
                    let marks = &mut self.marks[n as usize];
                    if !marks.has_match() {
                        marks.is_context_line = true;
                    }
                }
                next_unvisited = next_unvisited.max(end + 1);
            }
        }

        // A line that was context for an earlier layer may have matched now
        for &line in matched {
            if let Some(marks) = self.marks.get_mut(line as usize) {
                marks.is_context_line = false;
            }
        }
    }
}

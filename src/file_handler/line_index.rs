//! SIMD-optimized line boundary index
//!
//! This module provides the LineIndex structure that records the byte range of
//! every line in a file, plus the LineSplitter that builds it from a stream of
//! chunks. Line terminators are CR, LF or CRLF; memchr2 finds either byte with
//! SIMD acceleration, so the scan cost is dominated by I/O rather than by
//! per-byte work.

use memchr::memchr2;

/// Byte range of one line, terminator excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    /// Byte position where the line starts in the file
    pub offset: u64,

    /// Number of content bytes (terminator not included)
    pub len: u64,
}

impl LineSpan {
    /// Byte position just past the last content byte
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// The line holding the most characters, first occurrence on ties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongestLine {
    pub line_number: u64,
    pub char_count: u64,
}

/// Ordered byte ranges for every line of a file
///
/// - spans[n] describes line n (0-based)
/// - offsets are strictly increasing
/// - built once per load and never mutated afterwards
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    spans: Vec<LineSpan>,
}

impl LineIndex {
    /// Number of indexed lines
    pub fn line_count(&self) -> u64 {
        self.spans.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Byte range of a line, or None past the end of the index
    pub fn get(&self, line_number: u64) -> Option<LineSpan> {
        usize::try_from(line_number)
            .ok()
            .and_then(|idx| self.spans.get(idx).copied())
    }

    /// Byte position just past the last indexed line's content
    pub fn end_offset(&self) -> u64 {
        self.spans.last().map_or(0, LineSpan::end)
    }

    pub fn spans(&self) -> &[LineSpan] {
        &self.spans
    }

    fn push(&mut self, span: LineSpan) {
        debug_assert!(
            self.spans.last().map_or(true, |last| last.offset < span.offset),
            "line offsets must be strictly increasing"
        );
        self.spans.push(span);
    }
}

/// Incremental builder that turns a chunked byte stream into a LineIndex
///
/// Chunks may split a line, or a CRLF pair, anywhere; the resulting index is
/// the same as if the whole stream had been fed at once.
#[derive(Debug, Default)]
pub struct LineSplitter {
    index: LineIndex,

    /// Byte position where the current (unterminated) line begins
    line_start: u64,

    /// Characters seen so far in the current line
    line_chars: u64,

    /// The previous chunk ended with a CR, so a leading LF belongs to it
    pending_cr: bool,

    /// Total bytes fed so far
    consumed: u64,

    longest: Option<LongestLine>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes fed so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Lines completed so far (the trailing unterminated line is not counted)
    pub fn line_count(&self) -> u64 {
        self.index.line_count()
    }

    /// Scan the next chunk of the stream
    pub fn feed(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }

        let base = self.consumed;
        let mut pos = 0usize;

        if self.pending_cr {
            self.pending_cr = false;
            if chunk[0] == b'\n' {
                pos = 1;
                self.line_start = base + 1;
            }
        }

        while pos < chunk.len() {
            match memchr2(b'\r', b'\n', &chunk[pos..]) {
                Some(rel) => {
                    let term = pos + rel;
                    self.line_chars += count_chars(&chunk[pos..term]);
                    self.finish_line(base + term as u64);

                    pos = term + 1;
                    if chunk[term] == b'\r' {
                        if pos == chunk.len() {
                            self.pending_cr = true;
                        } else if chunk[pos] == b'\n' {
                            pos += 1;
                        }
                    }
                    self.line_start = base + pos as u64;
                }
                None => {
                    self.line_chars += count_chars(&chunk[pos..]);
                    pos = chunk.len();
                }
            }
        }

        self.consumed += chunk.len() as u64;
    }

    /// Close the stream, indexing a final line that has no terminator
    pub fn finish(mut self) -> (LineIndex, Option<LongestLine>) {
        if self.consumed > self.line_start {
            self.finish_line(self.consumed);
        }
        (self.index, self.longest)
    }

    /// Close an interrupted stream, dropping a trailing line whose terminator
    /// was never seen
    pub fn finish_terminated(self) -> (LineIndex, Option<LongestLine>) {
        (self.index, self.longest)
    }

    fn finish_line(&mut self, end: u64) {
        let line_number = self.index.line_count();
        self.index.push(LineSpan {
            offset: self.line_start,
            len: end - self.line_start,
        });

        let longer = self
            .longest
            .map_or(true, |current| self.line_chars > current.char_count);
        if longer {
            self.longest = Some(LongestLine {
                line_number,
                char_count: self.line_chars,
            });
        }
        self.line_chars = 0;
    }
}

/// Count UTF-8 characters by skipping continuation bytes
///
/// Works on arbitrary slices of a stream, so a multi-byte character split
/// across two chunks is still counted once.
fn count_chars(bytes: &[u8]) -> u64 {
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count() as u64
}

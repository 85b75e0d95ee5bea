//! Recursive separator splitter with overlapping windows.
//!
//! Works on byte spans of the input so callers can map every chunk back to
//! its position in the source text.

use super::ChunkError;
use std::collections::VecDeque;
use std::sync::Arc;

/// Length function used to size pieces (tokens, characters, ...)
pub type LengthFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Half-open byte range `[start, end)` into the split text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits text on a prioritized separator list, then greedily merges the
/// pieces into windows of at most `chunk_size` with `chunk_overlap` carried
/// over between consecutive windows.
///
/// Separators stay attached to the start of the piece that follows them, so
/// the emitted spans tile the input without gaps. The empty separator means
/// "split per character" and is the only way a piece gets cut mid-word; a
/// piece that is still too large once the separator list is exhausted is
/// emitted whole.
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    length_fn: LengthFn,
}

impl RecursiveSplitter {
    /// Create a splitter measuring length in characters
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: &[&str],
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidProfile(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::InvalidProfile(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: separators.iter().map(|s| s.to_string()).collect(),
            length_fn: Arc::new(|s: &str| s.chars().count()),
        })
    }

    /// Replace the length function (e.g. with a token counter)
    pub fn with_length_fn<F>(mut self, length_fn: F) -> Self
    where
        F: Fn(&str) -> usize + Send + Sync + 'static,
    {
        self.length_fn = Arc::new(length_fn);
        self
    }

    /// Share an existing length function
    pub fn with_shared_length_fn(mut self, length_fn: LengthFn) -> Self {
        self.length_fn = length_fn;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunk spans, in document order.
    ///
    /// Whitespace-only spans are never emitted: trailing ones extend the
    /// previous span and leading ones are absorbed by the next, so the spans
    /// still tile the input. Text that is all whitespace yields no spans.
    pub fn split(&self, text: &str) -> Vec<Span> {
        let mut raw = Vec::new();
        if text.is_empty() {
            return raw;
        }
        self.split_span(text, Span::new(0, text.len()), &self.separators, &mut raw);
        fold_blank_spans(text, raw)
    }

    /// Split `text` and return the chunk strings
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split(text)
            .into_iter()
            .map(|span| span.slice(text).to_string())
            .collect()
    }

    fn measure(&self, text: &str, span: Span) -> usize {
        (self.length_fn)(span.slice(text))
    }

    fn split_span(&self, text: &str, span: Span, separators: &[String], out: &mut Vec<Span>) {
        let (separator, remaining) = pick_separator(span.slice(text), separators);
        let pieces = split_keep_start(text, span, separator);

        let mut good: Vec<(Span, usize)> = Vec::new();
        for piece in pieces {
            let len = self.measure(text, piece);
            if len < self.chunk_size {
                good.push((piece, len));
                continue;
            }

            if !good.is_empty() {
                self.merge(&good, out);
                good.clear();
            }

            if remaining.is_empty() {
                out.push(piece);
            } else {
                self.split_span(text, piece, remaining, out);
            }
        }

        if !good.is_empty() {
            self.merge(&good, out);
        }
    }

    /// Merge consecutive small pieces into windows.
    ///
    /// The running total is the sum of piece lengths, not the length of the
    /// joined window, so token-sized windows may slightly exceed the bound.
    fn merge(&self, pieces: &[(Span, usize)], out: &mut Vec<Span>) {
        let mut window: VecDeque<(Span, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &(piece, len) in pieces {
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }

                if let Some(joined) = join_window(&window) {
                    out.push(joined);
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some((_, front_len)) => total -= front_len,
                            None => break,
                        }
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if let Some(joined) = join_window(&window) {
            out.push(joined);
        }
    }
}

fn fold_blank_spans(text: &str, spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    let mut leading: Option<usize> = None;

    for span in spans {
        if !span.slice(text).trim().is_empty() {
            let start = leading.take().map_or(span.start, |s| s.min(span.start));
            out.push(Span::new(start, span.end));
            continue;
        }

        match out.last_mut() {
            Some(last) => last.end = last.end.max(span.end),
            None => {
                leading.get_or_insert(span.start);
            }
        }
    }
    out
}

fn join_window(window: &VecDeque<(Span, usize)>) -> Option<Span> {
    let first = window.front()?;
    let last = window.back()?;
    Some(Span::new(first.0.start, last.0.end))
}

/// First separator present in `text`; the empty separator always matches.
/// Falls back to the last separator with nothing left to recurse into.
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return ("", &[]);
        }
        if text.contains(sep.as_str()) {
            return (sep.as_str(), &separators[i + 1..]);
        }
    }
    (separators.last().map(String::as_str).unwrap_or(""), &[])
}

/// Split `span` on `separator`, keeping each separator at the start of the
/// following piece. Empty pieces are dropped.
fn split_keep_start(text: &str, span: Span, separator: &str) -> Vec<Span> {
    let slice = span.slice(text);

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| Span::new(span.start + i, span.start + i + c.len_utf8()))
            .collect();
    }

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for (pos, _) in slice.match_indices(separator) {
        if pos > cursor {
            pieces.push(Span::new(span.start + cursor, span.start + pos));
        }
        cursor = pos;
    }
    if slice.len() > cursor {
        pieces.push(Span::new(span.start + cursor, span.end));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_windows_with_overlap() {
        let splitter = RecursiveSplitter::new(1000, 200, &[""]).unwrap();
        let text = "x".repeat(2000);

        let spans = splitter.split(&text);
        assert_eq!(
            spans,
            vec![
                Span::new(0, 1000),
                Span::new(800, 1800),
                Span::new(1600, 2000)
            ]
        );
    }

    #[test]
    fn test_separator_kept_at_start() {
        let text = "alpha beta gamma";
        let pieces = split_keep_start(text, Span::new(0, text.len()), " ");
        let strings: Vec<&str> = pieces.iter().map(|p| p.slice(text)).collect();
        assert_eq!(strings, vec!["alpha", " beta", " gamma"]);
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let splitter = RecursiveSplitter::new(20, 0, &["\n\n", "\n", " ", ""]).unwrap();
        let text = "first paragraph\n\nsecond paragraph";

        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["first paragraph", "\n\nsecond paragraph"]);
    }

    #[test]
    fn test_oversized_piece_without_separator_is_kept_whole() {
        let splitter = RecursiveSplitter::new(10, 2, &["\n\n", " "]).unwrap();
        let text = "short\n\nanextremelylongwordwithoutanyspaces";

        let chunks = splitter.split_text(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "\n\nanextremelylongwordwithoutanyspaces");
    }

    #[test]
    fn test_multibyte_characters() {
        let splitter = RecursiveSplitter::new(4, 1, &[""]).unwrap();
        let text = "Prämie für Ärzte";

        let spans = splitter.split(text);
        assert!(!spans.is_empty());
        for span in &spans {
            assert!(text.is_char_boundary(span.start));
            assert!(text.is_char_boundary(span.end));
        }
        assert_eq!(spans.last().unwrap().end, text.len());
    }

    #[test]
    fn test_invalid_profile() {
        assert!(RecursiveSplitter::new(0, 0, &[" "]).is_err());
        assert!(RecursiveSplitter::new(100, 100, &[" "]).is_err());
    }

    #[test]
    fn test_trailing_blank_piece_joins_previous_chunk() {
        let splitter = RecursiveSplitter::new(512, 50, &["\n\n", "\n", ". ", " ", ""]).unwrap();
        let text = format!("{}\n\n", "a".repeat(600));

        let spans = splitter.split(&text);
        assert!(spans.iter().all(|s| !s.slice(&text).trim().is_empty()));
        assert_eq!(spans.first().unwrap().start, 0);
        assert_eq!(spans.last().unwrap().end, text.len());
        assert!(spans.last().unwrap().slice(&text).ends_with("a\n\n"));
    }

    #[test]
    fn test_leading_blank_piece_joins_next_chunk() {
        let splitter = RecursiveSplitter::new(5, 0, &[" ", ""]).unwrap();
        let text = "      abc";

        let spans = splitter.split(text);
        assert!(spans.iter().all(|s| !s.slice(text).trim().is_empty()));
        assert_eq!(spans.first().unwrap().start, 0);
        assert_eq!(spans.last().unwrap().end, text.len());
    }

    #[test]
    fn test_whitespace_only_text() {
        let splitter = RecursiveSplitter::new(10, 2, &["\n\n", " ", ""]).unwrap();
        assert!(splitter.split("\n\n").is_empty());
        assert!(splitter.split("   \n  ").is_empty());
    }

    #[test]
    fn test_empty_text() {
        let splitter = RecursiveSplitter::new(10, 2, &[" "]).unwrap();
        assert!(splitter.split("").is_empty());
    }
}

//! Scored chunks and the citations derived from them

use crate::chunking::TextChunk;
use serde::{Deserialize, Serialize};

/// Characters of chunk text kept in a citation snippet
pub const SNIPPET_CHARS: usize = 200;

/// A chunk with a strategy-dependent relevance score
///
/// The score is cosine similarity, normalized BM25, a fused weighted sum or
/// reranker relevance depending on the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: TextChunk,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl SearchResult {
    pub fn new(chunk: TextChunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            distance: None,
        }
    }

    pub fn with_distance(chunk: TextChunk, score: f32, distance: f32) -> Self {
        Self {
            chunk,
            score,
            distance: Some(distance),
        }
    }

    /// First `max_chars` characters of the chunk, with `...` if cut
    pub fn preview(&self, max_chars: usize) -> String {
        let text = &self.chunk.text;
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.clone(),
        }
    }

    pub fn to_citation(&self) -> Citation {
        Citation {
            chunk_id: self.chunk.id.clone(),
            page_number: self.chunk.page,
            snippet: self.preview(SNIPPET_CHARS),
            relevance_score: self.score,
        }
    }
}

/// Source reference attached to a generated answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    pub page_number: u32,
    pub snippet: String,
    pub relevance_score: f32,
}

//! Document chunking
//!
//! Pages are joined into one buffer with a `"\n\n"` sentinel, split with the
//! selected strategy profile, and every chunk is attributed back to the page
//! its content starts on.

mod splitter;
mod tokenizer;

pub use splitter::{LengthFn, RecursiveSplitter, Span};
pub use tokenizer::{is_supported_encoding, TokenCounter, SUPPORTED_ENCODINGS};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Joins page texts in the chunking buffer
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Unknown chunking strategy '{name}'. Available: {available}")]
    UnknownStrategy { name: String, available: String },

    #[error("Unknown tokenizer encoding '{name}'. Available: {available}")]
    UnknownEncoding { name: String, available: String },

    #[error("Tokenizer initialization failed: {0}")]
    Tokenizer(String),

    #[error("Invalid chunking profile: {0}")]
    InvalidProfile(String),
}

/// Text of one extracted page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// An immutable unit of retrievable text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// `{doc_id}_{strategy}_{chunk_index}`
    pub id: String,
    pub text: String,
    /// Page containing the first non-whitespace character of the chunk
    pub page: u32,
    /// 0-based position within the document under the chosen strategy
    pub chunk_index: usize,
    pub token_count: usize,
    /// Byte offset of the chunk in the joined document buffer
    #[serde(default)]
    pub start_char: Option<usize>,
    #[serde(default)]
    pub end_char: Option<usize>,
}

/// Size and separator profile of a chunking strategy
#[derive(Debug, Clone, Copy)]
pub struct StrategyProfile {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: &'static [&'static str],
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// 512-token windows, 50 overlap, falls back to character cuts
    #[serde(alias = "semantic")]
    SizeBased,
    /// 1000-token windows, 100 overlap, favors paragraph and sentence ends
    #[serde(alias = "paragraph")]
    ParagraphBased,
}

impl ChunkingStrategy {
    pub const ALL: [ChunkingStrategy; 2] =
        [ChunkingStrategy::SizeBased, ChunkingStrategy::ParagraphBased];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategy::SizeBased => "size_based",
            ChunkingStrategy::ParagraphBased => "paragraph_based",
        }
    }

    pub fn profile(&self) -> StrategyProfile {
        match self {
            ChunkingStrategy::SizeBased => StrategyProfile {
                chunk_size: 512,
                chunk_overlap: 50,
                separators: &["\n\n", "\n", ". ", " ", ""],
                description: "Fixed-size chunks with standard separators",
            },
            ChunkingStrategy::ParagraphBased => StrategyProfile {
                chunk_size: 1000,
                chunk_overlap: 100,
                separators: &["\n\n\n", "\n\n", ".\n", "\n", ". ", " "],
                description: "Larger chunks respecting paragraph boundaries",
            },
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingStrategy {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "size_based" | "semantic" => Ok(ChunkingStrategy::SizeBased),
            "paragraph_based" | "paragraph" => Ok(ChunkingStrategy::ParagraphBased),
            other => Err(ChunkError::UnknownStrategy {
                name: other.to_string(),
                available: ChunkingStrategy::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Splits page text into [`TextChunk`]s
#[derive(Clone)]
pub struct Chunker {
    length_fn: LengthFn,
}

impl Chunker {
    /// Chunker sized by the named tiktoken encoding
    pub fn new(encoding: &str) -> Result<Self, ChunkError> {
        let counter = TokenCounter::new(encoding)?;
        Ok(Self::with_length_fn(move |text: &str| counter.count(text)))
    }

    /// Chunker sized by an arbitrary length function
    pub fn with_length_fn<F>(length_fn: F) -> Self
    where
        F: Fn(&str) -> usize + Send + Sync + 'static,
    {
        Self {
            length_fn: Arc::new(length_fn),
        }
    }

    /// Split `pages` of document `doc_id` under `strategy`.
    ///
    /// An empty page list yields no chunks.
    pub fn chunk(
        &self,
        doc_id: &str,
        pages: &[PageText],
        strategy: ChunkingStrategy,
    ) -> Result<Vec<TextChunk>, ChunkError> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let profile = strategy.profile();
        let splitter =
            RecursiveSplitter::new(profile.chunk_size, profile.chunk_overlap, profile.separators)?
                .with_shared_length_fn(Arc::clone(&self.length_fn));

        let buffer = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR);

        let chunks: Vec<TextChunk> = splitter
            .split(&buffer)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| {
                let text = span.slice(&buffer);
                let content_start = text
                    .find(|c: char| !c.is_whitespace())
                    .map(|i| span.start + i)
                    .unwrap_or(span.start);

                TextChunk {
                    id: format!("{}_{}_{}", doc_id, strategy, chunk_index),
                    text: text.to_string(),
                    page: page_for_offset(pages, content_start),
                    chunk_index,
                    token_count: (self.length_fn)(text),
                    start_char: Some(span.start),
                    end_char: Some(span.end),
                }
            })
            .collect();

        tracing::debug!(
            "Chunked document {} into {} chunks ({}, {} pages)",
            doc_id,
            chunks.len(),
            strategy,
            pages.len()
        );

        Ok(chunks)
    }

    /// Like [`Chunker::chunk`] with the strategy given by name
    pub fn chunk_named(
        &self,
        doc_id: &str,
        pages: &[PageText],
        strategy: &str,
    ) -> Result<Vec<TextChunk>, ChunkError> {
        self.chunk(doc_id, pages, strategy.parse()?)
    }
}

impl fmt::Debug for Chunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunker").finish_non_exhaustive()
    }
}

/// Page whose text contains `offset` of the joined buffer; offsets inside a
/// separator or past the end fall back to the first page.
fn page_for_offset(pages: &[PageText], offset: usize) -> u32 {
    let mut cursor = 0;
    for page in pages {
        let len = page.text.len();
        if offset >= cursor && offset < cursor + len {
            return page.page;
        }
        cursor += len + PAGE_SEPARATOR.len();
    }
    pages.first().map(|p| p.page).unwrap_or(1)
}

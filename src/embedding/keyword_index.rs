/// Tantivy keyword index for BM25 scoring over one document
use crate::chunking::TextChunk;
use std::collections::HashMap;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexicalIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),
}

/// Ephemeral in-RAM BM25 index over the chunks of one document
///
/// Built per query and dropped afterwards. Documents are written by a single
/// indexing thread so the whole corpus lands in one segment and BM25
/// statistics cover every chunk.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    position_field: Field,
    text_field: Field,
    chunk_ids: Vec<String>,
}

impl LexicalIndex {
    /// Build an index over `chunks`
    pub fn build(chunks: &[TextChunk]) -> Result<Self, LexicalIndexError> {
        let mut schema_builder = Schema::builder();
        let position_field = schema_builder.add_u64_field("position", STORED);
        let text_field = schema_builder.add_text_field("text", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, 50_000_000)
            .map_err(|e| LexicalIndexError::InitializationError(e.to_string()))?;

        for (position, chunk) in chunks.iter().enumerate() {
            writer
                .add_document(doc!(
                    position_field => position as u64,
                    text_field => chunk.text.as_str(),
                ))
                .map_err(|e| LexicalIndexError::InsertError(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| LexicalIndexError::InsertError(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: TantivyError| LexicalIndexError::InitializationError(e.to_string()))?;
        reader.reload()?;

        Ok(Self {
            index,
            reader,
            position_field,
            text_field,
            chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
        })
    }

    /// Raw BM25 score of every chunk against `query`.
    ///
    /// Every chunk id is present; chunks sharing no term with the query
    /// score 0. Query syntax errors are ignored rather than reported.
    pub fn score_all(&self, query: &str) -> Result<HashMap<String, f32>, LexicalIndexError> {
        let mut scores: HashMap<String, f32> =
            self.chunk_ids.iter().map(|id| (id.clone(), 0.0)).collect();

        if self.chunk_ids.is_empty() {
            return Ok(scores);
        }

        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (parsed, errors) = query_parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!("Ignored {} query syntax errors in lexical search", errors.len());
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(self.chunk_ids.len()))
            .map_err(|e| LexicalIndexError::SearchError(e.to_string()))?;

        for (score, doc_address) in top_docs {
            let retrieved: tantivy::TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| LexicalIndexError::SearchError(e.to_string()))?;

            let position = retrieved
                .get_first(self.position_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    LexicalIndexError::SearchError("Missing or invalid position field".to_string())
                })?;

            if let Some(id) = self.chunk_ids.get(position as usize) {
                scores.insert(id.clone(), score);
            }
        }

        Ok(scores)
    }

    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }
}

mod batch;
mod keyword_index;
mod local;
mod openai;
/// Embedding & Indexing
///
/// Architecture:
/// - EmbeddingProvider trait for abstraction
/// - OpenAiEmbedder for the hosted embedding service (`online` mode)
/// - FastEmbedProvider for local embedding (`offline` mode)
/// - Exact cosine VectorIndex with one collection per document
/// - Tantivy for per-query BM25 scoring
mod provider;
mod vector_index;

pub use batch::embed_in_batches;
pub use keyword_index::{LexicalIndex, LexicalIndexError};
pub use local::FastEmbedProvider;
pub use openai::OpenAiEmbedder;
pub use provider::{embedding_dimension, EmbeddingError, EmbeddingProvider, MODEL_DIMENSIONS};
pub use vector_index::{
    cosine_similarity, CollectionInfo, VectorIndex, VectorIndexError, VectorRecord,
};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Build the embedder selected by `config.mode`
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.mode.as_str() {
        "online" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "offline" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        other => Err(EmbeddingError::Initialization(format!(
            "Unknown embedding mode '{}'. Use 'online' or 'offline'",
            other
        ))),
    }
}

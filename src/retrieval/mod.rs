//! Retrieval & Reranking
//!
//! Three per-request strategies over a document's vector collection:
//! semantic search, weighted BM25 + semantic fusion, and cross-encoder
//! reranking of semantic candidates.

mod fusion;
mod orchestrator;
mod reranker;
mod scored;

pub use fusion::{normalize_by_max, weighted_fusion, FusionConfig, FusionError};
pub use orchestrator::{RetrievalStrategy, Retriever, SearchError};
pub use reranker::{
    reranker_from_config, CohereReranker, FastEmbedReranker, RerankError, RerankHit, Reranker,
};
pub use scored::{Citation, SearchResult, SNIPPET_CHARS};

//! Strategy selection and execution for document retrieval

use crate::config::RetrievalConfig;
use crate::embedding::{LexicalIndex, LexicalIndexError, VectorIndex, VectorIndexError};
use crate::retrieval::{
    normalize_by_max, weighted_fusion, FusionConfig, FusionError, RerankError, Reranker,
    SearchResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown retrieval strategy '{name}'. Available: {available}")]
    UnknownStrategy { name: String, available: String },

    #[error("Rerank strategy requested but no reranker is configured")]
    RerankerUnavailable,

    #[error(transparent)]
    VectorIndex(#[from] VectorIndexError),

    #[error("Keyword search failed: {0}")]
    Lexical(#[from] LexicalIndexError),

    #[error("Reranking failed: {0}")]
    Rerank(#[from] RerankError),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error("Search task failed: {0}")]
    TaskFailed(String),
}

/// Retrieval strategy, chosen per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Cosine search only
    Semantic,
    /// Weighted fusion of BM25 and cosine scores
    Hybrid,
    /// Cosine candidates reordered by a cross-encoder
    Rerank,
}

impl RetrievalStrategy {
    pub const ALL: [RetrievalStrategy; 3] = [
        RetrievalStrategy::Semantic,
        RetrievalStrategy::Hybrid,
        RetrievalStrategy::Rerank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStrategy::Semantic => "semantic",
            RetrievalStrategy::Hybrid => "hybrid",
            RetrievalStrategy::Rerank => "rerank",
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RetrievalStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| SearchError::UnknownStrategy {
                name: s.to_string(),
                available: RetrievalStrategy::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Runs one retrieval strategy against a document's collection
pub struct Retriever {
    index: Arc<VectorIndex>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(index: Arc<VectorIndex>, config: RetrievalConfig) -> Self {
        Self {
            index,
            reranker: None,
            config,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Retrieve up to `limit` results for `query` from document `doc_id`.
    ///
    /// `None` uses the configured `max_results`. Results are sorted by score
    /// descending. Every strategy returns an empty list when the semantic
    /// search finds nothing.
    pub async fn retrieve(
        &self,
        doc_id: &str,
        query: &str,
        strategy: RetrievalStrategy,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let fusion = FusionConfig::new(self.config.bm25_weight)?;
        self.run(doc_id, query, strategy, limit, &fusion).await
    }

    /// Hybrid retrieval with a per-call fusion weight
    pub async fn retrieve_with_fusion(
        &self,
        doc_id: &str,
        query: &str,
        limit: Option<usize>,
        fusion: &FusionConfig,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.run(doc_id, query, RetrievalStrategy::Hybrid, limit, fusion)
            .await
    }

    async fn run(
        &self,
        doc_id: &str,
        query: &str,
        strategy: RetrievalStrategy,
        limit: Option<usize>,
        fusion: &FusionConfig,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        if strategy == RetrievalStrategy::Rerank && self.reranker.is_none() {
            return Err(SearchError::RerankerUnavailable);
        }

        let limit = limit.unwrap_or(self.index.config().max_results);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let results = match strategy {
            RetrievalStrategy::Semantic => self.semantic(doc_id, query, limit).await?,
            RetrievalStrategy::Hybrid => self.hybrid(doc_id, query, limit, fusion).await?,
            RetrievalStrategy::Rerank => self.rerank(doc_id, query, limit).await?,
        };

        tracing::info!(
            "{} retrieval on {}: {} results in {}ms",
            strategy,
            doc_id,
            results.len(),
            start.elapsed().as_millis()
        );

        Ok(results)
    }

    async fn semantic(
        &self,
        doc_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        Ok(self.index.search(doc_id, query, limit).await?)
    }

    async fn hybrid(
        &self,
        doc_id: &str,
        query: &str,
        limit: usize,
        fusion: &FusionConfig,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let fetch = limit.saturating_mul(self.config.semantic_overfetch.max(1));
        let semantic_results = self.index.search(doc_id, query, fetch).await?;
        if semantic_results.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.index.all_chunks(doc_id).await;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let semantic: HashMap<String, f32> = semantic_results
            .iter()
            .map(|r| (r.chunk.id.clone(), r.score))
            .collect();

        // BM25 over the whole document, off the async workers
        let lexical_chunks = chunks.clone();
        let lexical_query = query.to_string();
        let bm25 = tokio::task::spawn_blocking(move || {
            LexicalIndex::build(&lexical_chunks)?.score_all(&lexical_query)
        })
        .await
        .map_err(|e| SearchError::TaskFailed(e.to_string()))??;

        let bm25_normalized = normalize_by_max(&bm25);
        let threshold = self.index.config().similarity_threshold;

        let mut results = weighted_fusion(&chunks, &semantic, &bm25_normalized, fusion);
        let fused = results.len();
        results.retain(|r| r.score >= threshold);
        results.truncate(limit);

        tracing::debug!(
            "Hybrid fusion (w={:.2}): {} semantic candidates, {} chunks fused, {} kept",
            fusion.bm25_weight,
            semantic_results.len(),
            fused,
            results.len()
        );

        Ok(results)
    }

    async fn rerank(
        &self,
        doc_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let reranker = self
            .reranker
            .as_ref()
            .ok_or(SearchError::RerankerUnavailable)?;

        let candidates = self
            .index
            .search(doc_id, query, self.config.rerank_top_k)
            .await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
        let hits = reranker.rerank(query, &texts, limit).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let candidate = candidates.get(hit.index).ok_or_else(|| {
                RerankError::InvalidResponse(format!(
                    "hit index {} outside {} candidates",
                    hit.index,
                    candidates.len()
                ))
            })?;
            results.push(SearchResult::new(candidate.chunk.clone(), hit.score));
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);

        tracing::debug!(
            "Reranked {} candidates with {}, kept {}",
            candidates.len(),
            reranker.model_name(),
            results.len()
        );

        Ok(results)
    }
}

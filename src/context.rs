//! Service context: every pipeline component, built once and shared

use crate::agent::{GeneralAnswerer, PolicyAgent, QuestionClassifier};
use crate::answer::{Answer, AnswerAssembler, AnswerGenerator};
use crate::chunking::{Chunker, ChunkingStrategy, PageText, TextChunk};
use crate::config::Config;
use crate::embedding::{provider_from_config, EmbeddingProvider, VectorIndex};
use crate::error::{LensError, Result};
use crate::retrieval::{reranker_from_config, RetrievalStrategy, Reranker, Retriever, SearchResult};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of ingesting one document
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub collection: String,
    pub strategy: ChunkingStrategy,
    pub chunks: usize,
    pub pages: usize,
}

/// Owns the pipeline components and wires them together.
///
/// Construct once at startup and pass it (or clones of its `Arc`s) to
/// whatever serves requests.
pub struct ServiceContext {
    config: Config,
    chunker: Chunker,
    index: Arc<VectorIndex>,
    retriever: Arc<Retriever>,
    assembler: Option<AnswerAssembler>,
}

impl ServiceContext {
    /// Build every component from configuration.
    ///
    /// A reranker that cannot be initialized is logged and left out; the
    /// `rerank` strategy then fails with `RerankerUnavailable`.
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = provider_from_config(&config.embedding)?;

        let reranker = match reranker_from_config(&config.reranker) {
            Ok(reranker) => reranker,
            Err(e) => {
                tracing::warn!("Reranker disabled: {}", e);
                None
            }
        };

        Self::new(config, provider, reranker)
    }

    /// Build from explicit components
    pub fn new(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Result<Self> {
        let chunker = Chunker::new(&config.chunking.encoding)?;
        Self::with_chunker(config, chunker, provider, reranker)
    }

    /// Build with a custom chunker (e.g. a character-counting one)
    pub fn with_chunker(
        config: Config,
        chunker: Chunker,
        provider: Arc<dyn EmbeddingProvider>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Result<Self> {
        let index = Arc::new(VectorIndex::new(
            provider,
            config.vector_store.clone(),
            config.embedding.batch_size,
        )?);

        let mut retriever = Retriever::new(Arc::clone(&index), config.retrieval.clone());
        if let Some(reranker) = reranker {
            retriever = retriever.with_reranker(reranker);
        }

        tracing::info!(
            "Service context ready (embedding: {}, reranker: {})",
            index.provider().model_name(),
            if retriever.has_reranker() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            chunker,
            index,
            retriever: Arc::new(retriever),
            assembler: None,
        })
    }

    /// Attach the language model used by [`ServiceContext::ask`]
    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.assembler = Some(AnswerAssembler::new(generator));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    /// Chunk `pages` and store them in a fresh collection for `doc_id`.
    ///
    /// Any previous collection of the document is replaced.
    pub async fn ingest(
        &self,
        doc_id: &str,
        pages: &[PageText],
        strategy: Option<ChunkingStrategy>,
    ) -> Result<IngestReport> {
        let strategy = strategy.unwrap_or(self.config.chunking.strategy);
        let chunks: Vec<TextChunk> = self.chunker.chunk(doc_id, pages, strategy)?;

        let collection = self.index.create_collection(doc_id).await;
        let stored = self.index.store(doc_id, &chunks).await?;

        tracing::info!(
            "Ingested {} ({} pages, {} chunks, {})",
            doc_id,
            pages.len(),
            stored,
            strategy
        );

        Ok(IngestReport {
            doc_id: doc_id.to_string(),
            collection,
            strategy,
            chunks: stored,
            pages: pages.len(),
        })
    }

    /// Retrieve with the configured default strategy unless one is given
    pub async fn retrieve(
        &self,
        doc_id: &str,
        query: &str,
        strategy: Option<RetrievalStrategy>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let strategy = strategy.unwrap_or(self.config.retrieval.default_strategy);
        Ok(self.retriever.retrieve(doc_id, query, strategy, limit).await?)
    }

    /// Retrieve, then answer from the results
    pub async fn ask(
        &self,
        doc_id: &str,
        question: &str,
        strategy: Option<RetrievalStrategy>,
        limit: Option<usize>,
    ) -> Result<Answer> {
        let assembler = self.assembler()?;
        let results = self.retrieve(doc_id, question, strategy, limit).await?;
        Ok(assembler.answer(question, Some(doc_id), &results).await?)
    }

    /// Agent routing questions between the document and a general answerer
    pub fn agent(
        &self,
        classifier: Arc<dyn QuestionClassifier>,
        general: Arc<dyn GeneralAnswerer>,
    ) -> Result<PolicyAgent> {
        Ok(PolicyAgent::new(
            Arc::clone(&self.retriever),
            self.assembler()?.clone(),
            classifier,
            general,
        ))
    }

    /// Drop the document's collection; returns whether it existed
    pub async fn delete_document(&self, doc_id: &str) -> bool {
        self.index.delete(doc_id).await
    }

    fn assembler(&self) -> Result<&AnswerAssembler> {
        self.assembler
            .as_ref()
            .ok_or_else(|| LensError::Config("No answer generator configured".to_string()))
    }
}

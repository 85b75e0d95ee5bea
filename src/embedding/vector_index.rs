/// Exact per-document vector index
use super::batch::embed_in_batches;
use super::provider::{EmbeddingError, EmbeddingProvider};
use crate::chunking::TextChunk;
use crate::config::VectorStoreConfig;
use crate::retrieval::SearchResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Got {vectors} vectors for {chunks} chunks")]
    CountMismatch { chunks: usize, vectors: usize },

    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// A chunk with its embedding, owned by one document collection
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub point_id: Uuid,
    pub doc_id: String,
    pub chunk: TextChunk,
    pub vector: Vec<f32>,
}

/// Summary of a collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub doc_id: String,
    pub points: usize,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Collection {
    doc_id: String,
    records: Vec<VectorRecord>,
    created_at: DateTime<Utc>,
}

impl Collection {
    fn new(doc_id: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            records: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Cosine similarity of two vectors, in `[-1, 1]`.
///
/// Zero vectors and vectors of differing length score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 || !norm_a.is_finite() || !norm_b.is_finite() {
        return 0.0;
    }

    let dot: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x / norm_a) * (y / norm_b))
        .sum();

    dot.clamp(-1.0, 1.0)
}

/// Vector index holding one collection per document.
///
/// Search is exhaustive: every record of the collection is scored. Readers
/// and writers share the collections map through an async `RwLock`; a
/// search racing a re-upload may observe the old collection or none.
pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    collections: RwLock<HashMap<String, Collection>>,
    config: VectorStoreConfig,
    batch_size: usize,
}

impl VectorIndex {
    /// Create a new vector index
    ///
    /// # Arguments
    /// * `provider` - Embedder for chunk and query text
    /// * `config` - Collection naming, result limit and threshold
    /// * `batch_size` - Maximum texts per embedding call
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        config: VectorStoreConfig,
        batch_size: usize,
    ) -> Result<Self, VectorIndexError> {
        if provider.dimension() == 0 {
            return Err(VectorIndexError::InitializationError(format!(
                "Embedding model {} reports zero dimension",
                provider.model_name()
            )));
        }

        Ok(Self {
            provider,
            collections: RwLock::new(HashMap::new()),
            config,
            batch_size,
        })
    }

    /// Deterministic collection name for a document
    pub fn collection_name(&self, doc_id: &str) -> String {
        format!("{}{}", self.config.collection_prefix, doc_id)
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Create an empty collection for `doc_id`, replacing any existing one
    pub async fn create_collection(&self, doc_id: &str) -> String {
        let name = self.collection_name(doc_id);
        let mut collections = self.collections.write().await;

        if collections.remove(&name).is_some() {
            tracing::info!("Dropped existing collection {}", name);
        }
        collections.insert(name.clone(), Collection::new(doc_id));

        tracing::info!("Created collection {}", name);
        name
    }

    /// Embed and store `chunks` in the document's collection.
    ///
    /// The collection is created if missing. Returns the number of records
    /// written. Nothing is written if embedding fails.
    pub async fn store(&self, doc_id: &str, chunks: &[TextChunk]) -> Result<usize, VectorIndexError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let start = std::time::Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_in_batches(self.provider.as_ref(), &texts, self.batch_size).await?;

        if vectors.len() != chunks.len() {
            return Err(VectorIndexError::CountMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let dimension = self.provider.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(VectorIndexError::InvalidDimension {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let name = self.collection_name(doc_id);
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.clone())
            .or_insert_with(|| Collection::new(doc_id));

        collection
            .records
            .extend(chunks.iter().zip(vectors).map(|(chunk, vector)| VectorRecord {
                point_id: Uuid::new_v4(),
                doc_id: doc_id.to_string(),
                chunk: chunk.clone(),
                vector,
            }));

        tracing::info!(
            "Stored {} chunks in {} ({}ms)",
            chunks.len(),
            name,
            start.elapsed().as_millis()
        );

        Ok(chunks.len())
    }

    /// Top `limit` chunks of the document by cosine similarity to `query`.
    ///
    /// Results below the configured similarity threshold are dropped, so
    /// fewer than `limit` may be returned. A missing collection yields an
    /// empty list.
    pub async fn search(
        &self,
        doc_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        let name = self.collection_name(doc_id);
        if limit == 0 || !self.collections.read().await.contains_key(&name) {
            tracing::debug!("Search skipped for {} (missing collection or zero limit)", name);
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed_one(query).await?;

        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&name) else {
            return Ok(Vec::new());
        };

        let threshold = self.config.similarity_threshold;
        let mut scored: Vec<(f32, &VectorRecord)> = collection
            .records
            .iter()
            .map(|r| (cosine_similarity(&query_vector, &r.vector), r))
            .filter(|(score, _)| *score >= threshold)
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(limit);

        tracing::debug!(
            "Vector search in {}: {} of {} records above {:.2}",
            name,
            scored.len(),
            collection.records.len(),
            threshold
        );

        Ok(scored
            .into_iter()
            .map(|(score, r)| SearchResult::with_distance(r.chunk.clone(), score, 1.0 - score))
            .collect())
    }

    /// Every chunk of the document in insertion order; empty if missing
    pub async fn all_chunks(&self, doc_id: &str) -> Vec<TextChunk> {
        let collections = self.collections.read().await;
        collections
            .get(&self.collection_name(doc_id))
            .map(|c| c.records.iter().map(|r| r.chunk.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of records in the document's collection
    pub async fn count(&self, doc_id: &str) -> Result<usize, VectorIndexError> {
        let name = self.collection_name(doc_id);
        let collections = self.collections.read().await;
        collections
            .get(&name)
            .map(|c| c.records.len())
            .ok_or(VectorIndexError::CollectionNotFound { name })
    }

    pub async fn exists(&self, doc_id: &str) -> bool {
        self.collections
            .read()
            .await
            .contains_key(&self.collection_name(doc_id))
    }

    pub async fn info(&self, doc_id: &str) -> Result<CollectionInfo, VectorIndexError> {
        let name = self.collection_name(doc_id);
        let collections = self.collections.read().await;
        let collection = collections
            .get(&name)
            .ok_or_else(|| VectorIndexError::CollectionNotFound { name: name.clone() })?;

        Ok(CollectionInfo {
            name,
            doc_id: collection.doc_id.clone(),
            points: collection.records.len(),
            dimension: self.provider.dimension(),
            created_at: collection.created_at,
        })
    }

    /// Drop the document's collection; returns whether one existed
    pub async fn delete(&self, doc_id: &str) -> bool {
        let name = self.collection_name(doc_id);
        let removed = self.collections.write().await.remove(&name).is_some();
        if removed {
            tracing::info!("Deleted collection {}", name);
        } else {
            tracing::debug!("Delete of missing collection {}", name);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Maps each letter a-d to one axis
    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; 4];
                    for c in t.chars() {
                        if let Some(i) = "abcd".find(c) {
                            v[i] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "axis"
        }
    }

    fn chunk(i: usize, text: &str) -> TextChunk {
        TextChunk {
            id: format!("doc_size_based_{}", i),
            text: text.to_string(),
            page: 1,
            chunk_index: i,
            token_count: text.len(),
            start_char: None,
            end_char: None,
        }
    }

    fn index(threshold: f32) -> VectorIndex {
        let config = VectorStoreConfig {
            similarity_threshold: threshold,
            ..VectorStoreConfig::default()
        };
        VectorIndex::new(Arc::new(AxisEmbedder), config, 2).unwrap()
    }

    #[test]
    fn test_cosine_properties() {
        let a = [1.0, 2.0, 3.0];
        let b = [-2.0, 0.5, 4.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &b), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_store_creates_collection() {
        let index = index(0.0);
        let stored = index
            .store("p1", &[chunk(0, "a"), chunk(1, "b"), chunk(2, "c")])
            .await
            .unwrap();

        assert_eq!(stored, 3);
        assert!(index.exists("p1").await);
        assert_eq!(index.count("p1").await.unwrap(), 3);
        assert_eq!(index.collection_name("p1"), "policy_p1");
    }

    #[tokio::test]
    async fn test_search_ranks_and_thresholds() {
        let index = index(0.5);
        index
            .store("p1", &[chunk(0, "a"), chunk(1, "ab"), chunk(2, "c")])
            .await
            .unwrap();

        let results = index.search("p1", "a", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "doc_size_based_0");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[0].distance.unwrap()).abs() < 1e-6);
        assert_eq!(results[1].chunk.id, "doc_size_based_1");
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let index = index(0.0);
        assert!(index.search("nope", "a", 3).await.unwrap().is_empty());
        assert!(index.all_chunks("nope").await.is_empty());
        assert!(matches!(
            index.count("nope").await,
            Err(VectorIndexError::CollectionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_collection_replaces() {
        let index = index(0.0);
        index.store("p1", &[chunk(0, "a")]).await.unwrap();

        index.create_collection("p1").await;
        assert_eq!(index.count("p1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let index = index(0.0);
        index.store("p1", &[chunk(0, "a")]).await.unwrap();

        assert!(index.delete("p1").await);
        assert!(!index.delete("p1").await);
        assert!(!index.exists("p1").await);
    }
}

//! Retrieval strategies over an in-memory policy collection

mod common;

use common::*;
use lensrag::config::{RetrievalConfig, VectorStoreConfig};
use lensrag::embedding::{
    EmbeddingError, EmbeddingProvider, LexicalIndex, VectorIndex, VectorIndexError,
};
use lensrag::retrieval::{
    normalize_by_max, FusionConfig, RerankError, RetrievalStrategy, Retriever, SearchError,
};
use std::sync::Arc;

const QUESTION: &str = "How high is the deductible for dental treatment?";

fn store_config(threshold: f32) -> VectorStoreConfig {
    VectorStoreConfig {
        similarity_threshold: threshold,
        ..VectorStoreConfig::default()
    }
}

async fn keyword_index(doc_id: &str) -> Arc<VectorIndex> {
    let index = VectorIndex::new(Arc::new(KeywordEmbedder::new()), store_config(0.3), 2).unwrap();
    index.store(doc_id, &policy_chunks(doc_id)).await.unwrap();
    Arc::new(index)
}

fn ids(results: &[lensrag::retrieval::SearchResult]) -> Vec<String> {
    results.iter().map(|r| r.chunk.id.clone()).collect()
}

#[tokio::test]
async fn test_semantic_top_hit() {
    let texts = ["chunk one", "chunk two", "chunk three", "chunk four", "chunk five"];
    let mut fixtures: Vec<(&str, Vec<f32>)> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let mut v = vec![0.0; 5];
            v[i] = 1.0;
            (*t, v)
        })
        .collect();
    fixtures.push(("what is in three", vec![0.05, 0.05, 1.0, 0.05, 0.05]));

    let index = VectorIndex::new(Arc::new(FixtureEmbedder::new(fixtures)), store_config(0.0), 16)
        .unwrap();
    let chunks: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| chunk("p1", i, t))
        .collect();
    assert_eq!(index.store("p1", &chunks).await.unwrap(), 5);

    let results = index.search("p1", "what is in three", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.id, "p1_size_based_2");
    assert!((results[0].score - 1.0).abs() < 0.01);
    assert!(results[0].score >= results[1].score);

    // A larger k only extends the list
    let mut previous: Vec<String> = Vec::new();
    for k in 1..=5 {
        let current = ids(&index.search("p1", "what is in three", k).await.unwrap());
        assert_eq!(current.len(), k);
        assert_eq!(&current[..previous.len()], previous.as_slice());
        previous = current;
    }
}

#[tokio::test]
async fn test_threshold_filters_results() {
    let index = keyword_index("p1").await;
    let results = index.search("p1", QUESTION, 5).await.unwrap();

    assert_eq!(ids(&results), vec!["p1_size_based_1", "p1_size_based_0"]);
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert!(results.iter().all(|r| r.score >= 0.3));
    assert_eq!(results[0].distance, Some(1.0 - results[0].score));
}

#[tokio::test]
async fn test_missing_collection_is_empty() {
    let index = keyword_index("p1").await;
    let retriever = Retriever::new(Arc::clone(&index), RetrievalConfig::default())
        .with_reranker(Arc::new(ReverseReranker::new()));

    for strategy in RetrievalStrategy::ALL {
        let results = retriever
            .retrieve("unknown", QUESTION, strategy, Some(3))
            .await
            .unwrap();
        assert!(results.is_empty(), "{} should find nothing", strategy);
    }

    assert!(matches!(
        index.count("unknown").await,
        Err(VectorIndexError::CollectionNotFound { .. })
    ));
}

#[tokio::test]
async fn test_hybrid_weight_extremes() {
    let index = keyword_index("p1").await;
    let retriever = Retriever::new(Arc::clone(&index), RetrievalConfig::default());

    // Pure lexical: the BM25 ranking normalized by its maximum
    let bm25 = LexicalIndex::build(&policy_chunks("p1"))
        .unwrap()
        .score_all(QUESTION)
        .unwrap();
    let normalized = normalize_by_max(&bm25);
    let mut expected: Vec<(String, f32)> = policy_chunks("p1")
        .into_iter()
        .map(|c| {
            let score = normalized[&c.id];
            (c.id, score)
        })
        .collect();
    expected.sort_by(|a, b| b.1.total_cmp(&a.1));
    expected.retain(|(_, score)| *score >= 0.3);
    expected.truncate(3);

    let lexical = retriever
        .retrieve_with_fusion("p1", QUESTION, Some(3), &FusionConfig::new(1.0).unwrap())
        .await
        .unwrap();
    assert_eq!(lexical.len(), expected.len());
    for (result, (id, score)) in lexical.iter().zip(&expected) {
        assert_eq!(&result.chunk.id, id);
        assert!((result.score - score).abs() < 1e-6);
    }

    // Pure semantic: identical to the vector search
    let semantic = index.search("p1", QUESTION, 3).await.unwrap();
    let fused = retriever
        .retrieve_with_fusion("p1", QUESTION, Some(3), &FusionConfig::new(0.0).unwrap())
        .await
        .unwrap();
    assert_eq!(ids(&fused), ids(&semantic));
    for (a, b) in fused.iter().zip(&semantic) {
        assert!((a.score - b.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_hybrid_default_weight() {
    let index = keyword_index("p1").await;
    let retriever = Retriever::new(index, RetrievalConfig::default());

    let results = retriever
        .retrieve("p1", QUESTION, RetrievalStrategy::Hybrid, Some(3))
        .await
        .unwrap();

    assert!(!results.is_empty() && results.len() <= 3);
    assert_eq!(results[0].chunk.id, "p1_size_based_1");
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(results.iter().all(|r| (0.3..=1.0).contains(&r.score)));
}

#[tokio::test]
async fn test_hybrid_needs_semantic_candidates() {
    let index = keyword_index("p1").await;
    let retriever = Retriever::new(index, RetrievalConfig::default());

    // "room" matches lexically but shares no embedding axis with any chunk
    let results = retriever
        .retrieve("p1", "shared room", RetrievalStrategy::Hybrid, Some(3))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_rerank_reorders_candidates() {
    let index = keyword_index("p1").await;
    let reranker = Arc::new(ReverseReranker::new());
    let retriever = Retriever::new(index, RetrievalConfig::default()).with_reranker(reranker.clone());

    let results = retriever
        .retrieve("p1", QUESTION, RetrievalStrategy::Rerank, Some(2))
        .await
        .unwrap();

    // Semantic order is [1, 0]; the reranker prefers the last candidate
    assert_eq!(ids(&results), vec!["p1_size_based_0", "p1_size_based_1"]);
    assert!((results[0].score - 1.0).abs() < 1e-6);
    assert!((results[1].score - 0.5).abs() < 1e-6);

    let truncated = retriever
        .retrieve("p1", QUESTION, RetrievalStrategy::Rerank, Some(1))
        .await
        .unwrap();
    assert_eq!(ids(&truncated), vec!["p1_size_based_0"]);
}

#[tokio::test]
async fn test_rerank_candidate_pool() {
    let index = VectorIndex::new(Arc::new(KeywordEmbedder::new()), store_config(0.0), 8).unwrap();
    index.store("p1", &policy_chunks("p1")).await.unwrap();

    let reranker = Arc::new(ReverseReranker::new());
    let config = RetrievalConfig {
        rerank_top_k: 2,
        ..RetrievalConfig::default()
    };
    let retriever = Retriever::new(Arc::new(index), config).with_reranker(reranker.clone());

    let one = retriever
        .retrieve("p1", QUESTION, RetrievalStrategy::Rerank, Some(1))
        .await
        .unwrap();
    assert_eq!(one.len(), 1);

    // A limit above the pool size never widens the pool
    let four = retriever
        .retrieve("p1", QUESTION, RetrievalStrategy::Rerank, Some(4))
        .await
        .unwrap();
    assert_eq!(four.len(), 2);

    assert_eq!(*reranker.seen.lock().unwrap(), vec![2, 2]);
}

#[tokio::test]
async fn test_rerank_failures() {
    let index = keyword_index("p1").await;

    let without = Retriever::new(Arc::clone(&index), RetrievalConfig::default());
    let err = without
        .retrieve("p1", QUESTION, RetrievalStrategy::Rerank, Some(3))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::RerankerUnavailable));

    let failing = Retriever::new(Arc::clone(&index), RetrievalConfig::default())
        .with_reranker(Arc::new(FailingReranker));
    let err = failing
        .retrieve("p1", QUESTION, RetrievalStrategy::Rerank, Some(3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Rerank(RerankError::Upstream { status: 503, .. })
    ));

    let broken = Retriever::new(index, RetrievalConfig::default())
        .with_reranker(Arc::new(OutOfRangeReranker));
    let err = broken
        .retrieve("p1", QUESTION, RetrievalStrategy::Rerank, Some(3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Rerank(RerankError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let index = keyword_index("p1").await;
    let retriever = Retriever::new(index, RetrievalConfig::default());

    for strategy in RetrievalStrategy::ALL {
        let err = retriever
            .retrieve("p1", "   ", strategy, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }
}

#[tokio::test]
async fn test_embedding_failure_propagates() {
    let index = VectorIndex::new(Arc::new(FailingEmbedder), store_config(0.3), 4).unwrap();

    let err = index.store("p1", &policy_chunks("p1")).await.unwrap_err();
    assert!(matches!(
        err,
        VectorIndexError::Embedding(EmbeddingError::Upstream { status: 429, .. })
    ));
    assert!(!index.exists("p1").await || index.count("p1").await.unwrap() == 0);
}

#[tokio::test]
async fn test_delete_twice() {
    let index = keyword_index("p1").await;

    assert!(index.delete("p1").await);
    assert!(!index.delete("p1").await);
    assert!(index.search("p1", QUESTION, 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reupload_replaces_collection() {
    let index = keyword_index("p1").await;
    assert_eq!(index.count("p1").await.unwrap(), 5);

    index.create_collection("p1").await;
    let fresh = vec![chunk("p1", 0, "Premium adjustments happen once a year.")];
    index.store("p1", &fresh).await.unwrap();

    assert_eq!(index.count("p1").await.unwrap(), 1);
    let info = index.info("p1").await.unwrap();
    assert_eq!(info.name, "policy_p1");
    assert_eq!(info.dimension, index.provider().dimension());
}

#[tokio::test]
async fn test_concurrent_searches() {
    let index = keyword_index("p1").await;

    let searches = (0..8).map(|_| {
        let index = Arc::clone(&index);
        tokio::spawn(async move { index.search("p1", QUESTION, 2).await })
    });

    for handle in searches {
        let results = handle.await.unwrap().unwrap();
        assert_eq!(results[0].chunk.id, "p1_size_based_1");
    }
}
